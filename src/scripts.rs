//! Atomic routines on the term index.
//!
//! Locating, replacing and checking a composite member by its document key
//! must not race with other writers. When the connection can run scripts,
//! each routine executes server-side as one [`Script`]. Otherwise it falls
//! back to `WATCH` on the term set and an optimistic transaction that is
//! retried when another writer gets there first.
//!
//! The scripts are registered once per engine in a [`ScriptTable`] and
//! shared by every operation.

use log::{trace, warn};

use crate::error::{AutocompleteError, Result};
use crate::keys::member_has_key;
use crate::storage::{Script, ScriptContext, StoreConnection, Transaction, Value};

/// Routines available in a [`ScriptTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Find the member carrying a document key.
    LocateMember,
    /// Swap the member carrying a document key for a new one.
    ReplaceMember,
    /// Whether a member carries a document key.
    MemberExists,
    /// Insert a member and its payload, dropping any older member with the
    /// same document key.
    IndexTerm,
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 4] = [
        ScriptKind::LocateMember,
        ScriptKind::ReplaceMember,
        ScriptKind::MemberExists,
        ScriptKind::IndexTerm,
    ];
}

/// Prefix a routine body with the Lua helpers shared by every routine.
macro_rules! lua_routine {
    ($body:literal) => {
        concat!(
            r#"
local function carries(member, key)
  local suffix = "::" .. key
  local head = #member - #suffix
  if head < 18 or string.sub(member, head + 1) ~= suffix then
    return false
  end
  return string.find(string.sub(member, head - 17, head), "^::%x+$") ~= nil
end

local function locate(set, key)
  for _, member in ipairs(redis.call("ZRANGE", set, 0, -1)) do
    if carries(member, key) then
      return member
    end
  end
  return false
end
"#,
            $body
        )
    };
}

const LOCATE_MEMBER_LUA: &str = lua_routine!(
    r#"
-- KEYS[1] term set, ARGV[1] document key
return locate(KEYS[1], ARGV[1])
"#
);

const REPLACE_MEMBER_LUA: &str = lua_routine!(
    r#"
-- KEYS[1] term set, ARGV[1] document key, ARGV[2] new member
local current = locate(KEYS[1], ARGV[1])
if not current then
  return redis.error_reply("key not found in zset: " .. ARGV[1])
end
redis.call("ZREM", KEYS[1], current)
redis.call("ZADD", KEYS[1], 0, ARGV[2])
return current
"#
);

const MEMBER_EXISTS_LUA: &str = lua_routine!(
    r#"
-- KEYS[1] term set, ARGV[1] document key
if locate(KEYS[1], ARGV[1]) then
  return 1
end
return 0
"#
);

const INDEX_TERM_LUA: &str = lua_routine!(
    r#"
-- KEYS[1] term set, KEYS[2] document hash
-- ARGV[1] document key, ARGV[2] member, ARGV[3] payload
local current = locate(KEYS[1], ARGV[1])
if current and current ~= ARGV[2] then
  redis.call("ZREM", KEYS[1], current)
end
redis.call("ZADD", KEYS[1], 0, ARGV[2])
redis.call("HSET", KEYS[2], ARGV[1], ARGV[3])
if current then
  return 0
end
return 1
"#
);

fn arg(args: &[Vec<u8>], position: usize) -> Result<&str> {
    let bytes = args.get(position).ok_or_else(|| {
        AutocompleteError::storage(format!("script argument {} is missing", position + 1))
    })?;
    std::str::from_utf8(bytes)
        .map_err(|e| AutocompleteError::decode(format!("script argument is not UTF-8: {e}")))
}

fn key(keys: &[String], position: usize) -> Result<&str> {
    keys.get(position)
        .map(String::as_str)
        .ok_or_else(|| AutocompleteError::storage(format!("script key {} is missing", position + 1)))
}

fn locate(ctx: &mut dyn ScriptContext, set: &str, document_key: &str) -> Result<Option<String>> {
    Ok(ctx
        .zrange(set, 0, -1)?
        .into_iter()
        .find(|member| member_has_key(member, document_key)))
}

fn locate_member_body(ctx: &mut dyn ScriptContext, keys: &[String], args: &[Vec<u8>]) -> Result<Value> {
    Ok(match locate(ctx, key(keys, 0)?, arg(args, 0)?)? {
        Some(member) => Value::Data(member.into_bytes()),
        None => Value::Nil,
    })
}

fn replace_member_body(ctx: &mut dyn ScriptContext, keys: &[String], args: &[Vec<u8>]) -> Result<Value> {
    let set = key(keys, 0)?;
    let document_key = arg(args, 0)?;
    let Some(current) = locate(ctx, set, document_key)? else {
        return Err(AutocompleteError::member_not_found(set, document_key));
    };
    ctx.zrem(set, &current)?;
    ctx.zadd(set, 0.0, arg(args, 1)?)?;
    Ok(Value::Data(current.into_bytes()))
}

fn member_exists_body(ctx: &mut dyn ScriptContext, keys: &[String], args: &[Vec<u8>]) -> Result<Value> {
    let found = locate(ctx, key(keys, 0)?, arg(args, 0)?)?.is_some();
    Ok(Value::Int(found as i64))
}

fn index_term_body(ctx: &mut dyn ScriptContext, keys: &[String], args: &[Vec<u8>]) -> Result<Value> {
    let set = key(keys, 0)?;
    let hash = key(keys, 1)?;
    let document_key = arg(args, 0)?;
    let member = arg(args, 1)?;
    let payload = args
        .get(2)
        .ok_or_else(|| AutocompleteError::storage("script argument 3 is missing"))?;

    let current = locate(ctx, set, document_key)?;
    if let Some(stale) = current.as_deref().filter(|current| *current != member) {
        ctx.zrem(set, stale)?;
    }
    ctx.zadd(set, 0.0, member)?;
    ctx.hset(hash, document_key, payload)?;
    Ok(Value::Int(current.is_none() as i64))
}

/// The routines used by the term index, registered once.
#[derive(Debug, Clone)]
pub struct ScriptTable {
    locate_member: Script,
    replace_member: Script,
    member_exists: Script,
    index_term: Script,
}

impl ScriptTable {
    /// Register every routine.
    pub fn new() -> Self {
        ScriptTable {
            locate_member: Script::new(
                "locate_member",
                LOCATE_MEMBER_LUA,
                locate_member_body,
            ),
            replace_member: Script::new(
                "replace_member",
                REPLACE_MEMBER_LUA,
                replace_member_body,
            ),
            member_exists: Script::new(
                "member_exists",
                MEMBER_EXISTS_LUA,
                member_exists_body,
            ),
            index_term: Script::new("index_term", INDEX_TERM_LUA, index_term_body),
        }
    }

    /// The script registered for a routine.
    pub fn get(&self, kind: ScriptKind) -> &Script {
        match kind {
            ScriptKind::LocateMember => &self.locate_member,
            ScriptKind::ReplaceMember => &self.replace_member,
            ScriptKind::MemberExists => &self.member_exists,
            ScriptKind::IndexTerm => &self.index_term,
        }
    }

    /// Every registered script.
    pub fn iter(&self) -> impl Iterator<Item = &Script> {
        ScriptKind::ALL.into_iter().map(|kind| self.get(kind))
    }
}

impl Default for ScriptTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the member of `set` carrying `document_key`.
pub async fn locate_member(
    scripts: &ScriptTable,
    conn: &mut dyn StoreConnection,
    set: &str,
    document_key: &str,
) -> Result<Option<String>> {
    if conn.supports_scripting() {
        return conn
            .eval(
                scripts.get(ScriptKind::LocateMember),
                &[set.to_string()],
                &[document_key.as_bytes().to_vec()],
            )
            .await?
            .into_optional_string();
    }

    Ok(conn
        .zrange(set, 0, -1)
        .await?
        .into_iter()
        .find(|member| member_has_key(member, document_key)))
}

/// Whether some member of `set` carries `document_key`.
pub async fn member_exists(
    scripts: &ScriptTable,
    conn: &mut dyn StoreConnection,
    set: &str,
    document_key: &str,
) -> Result<bool> {
    if conn.supports_scripting() {
        return conn
            .eval(
                scripts.get(ScriptKind::MemberExists),
                &[set.to_string()],
                &[document_key.as_bytes().to_vec()],
            )
            .await?
            .into_bool();
    }

    Ok(locate_member(scripts, conn, set, document_key).await?.is_some())
}

/// Replace the member of `set` carrying `document_key` with `member`.
///
/// Fails with [`AutocompleteError::MemberNotFound`] when no member carries
/// the key.
pub async fn replace_member(
    scripts: &ScriptTable,
    conn: &mut dyn StoreConnection,
    set: &str,
    document_key: &str,
    member: &str,
    max_retries: usize,
) -> Result<()> {
    if conn.supports_scripting() {
        let replaced = conn
            .eval(
                scripts.get(ScriptKind::ReplaceMember),
                &[set.to_string()],
                &[document_key.as_bytes().to_vec(), member.as_bytes().to_vec()],
            )
            .await?;
        trace!("replaced {replaced:?} with {member} in {set}");
        return Ok(());
    }

    let watched = [set.to_string()];
    for attempt in 0..=max_retries {
        conn.watch(&watched).await?;
        let Some(current) = locate_member(scripts, conn, set, document_key).await? else {
            conn.unwatch().await?;
            return Err(AutocompleteError::member_not_found(set, document_key));
        };

        let mut tx = Transaction::new();
        tx.zrem(set, current).zadd(set, 0.0, member);
        if conn.exec(tx).await?.is_some() {
            return Ok(());
        }
        warn!("{set} changed while replacing {document_key}, retrying (attempt {attempt})");
    }

    Err(AutocompleteError::conflict(format!(
        "replacing {document_key} in {set} failed after {max_retries} retries"
    )))
}

/// Add `member` to `set` and store `payload` under `document_key` in `hash`,
/// removing any older member carrying the same document key.
#[allow(clippy::too_many_arguments)]
pub async fn index_term(
    scripts: &ScriptTable,
    conn: &mut dyn StoreConnection,
    set: &str,
    hash: &str,
    document_key: &str,
    member: &str,
    payload: Vec<u8>,
    max_retries: usize,
) -> Result<()> {
    if conn.supports_scripting() {
        conn.eval(
            scripts.get(ScriptKind::IndexTerm),
            &[set.to_string(), hash.to_string()],
            &[
                document_key.as_bytes().to_vec(),
                member.as_bytes().to_vec(),
                payload,
            ],
        )
        .await?;
        return Ok(());
    }

    let watched = [set.to_string()];
    for attempt in 0..=max_retries {
        conn.watch(&watched).await?;
        let current = locate_member(scripts, conn, set, document_key).await?;

        let mut tx = Transaction::new();
        if let Some(current) = current.filter(|current| current != member) {
            tx.zrem(set, current);
        }
        tx.zadd(set, 0.0, member).hset(hash, document_key, payload.clone());
        if conn.exec(tx).await?.is_some() {
            return Ok(());
        }
        warn!("{set} changed while indexing {document_key}, retrying (attempt {attempt})");
    }

    Err(AutocompleteError::conflict(format!(
        "indexing {document_key} in {set} failed after {max_retries} retries"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, MemoryStoreConfig, StorePool};

    fn stores() -> Vec<MemoryStore> {
        vec![
            MemoryStore::new_default(),
            MemoryStore::new(MemoryStoreConfig {
                max_connections: 4,
                scripting: false,
            }),
        ]
    }

    async fn seed(conn: &mut dyn StoreConnection) {
        let mut tx = Transaction::new();
        tx.zadd("ac:$$cars", 0.0, "mercedes s500::0000000000000001::mercedes_s500_1")
            .zadd("ac:$$cars", 0.0, "toyota prius::0000000000000002::toyota_prius_2");
        conn.exec(tx).await.unwrap();
    }

    #[test]
    fn test_script_table_registers_every_routine() {
        let table = ScriptTable::new();
        let names: Vec<&str> = table.iter().map(Script::name).collect();
        assert_eq!(
            names,
            vec!["locate_member", "replace_member", "member_exists", "index_term"]
        );
        for script in table.iter() {
            assert!(script.source().contains("local function carries"));
        }
    }

    #[tokio::test]
    async fn test_locate_and_exists() {
        let table = ScriptTable::new();
        for store in stores() {
            let mut conn = store.get().await.unwrap();
            seed(conn.as_mut()).await;

            let found = locate_member(&table, conn.as_mut(), "ac:$$cars", "toyota_prius_2")
                .await
                .unwrap();
            assert_eq!(
                found.as_deref(),
                Some("toyota prius::0000000000000002::toyota_prius_2")
            );

            assert!(
                locate_member(&table, conn.as_mut(), "ac:$$cars", "toyota_prius")
                    .await
                    .unwrap()
                    .is_none()
            );
            assert!(member_exists(&table, conn.as_mut(), "ac:$$cars", "mercedes_s500_1")
                .await
                .unwrap());
            assert!(!member_exists(&table, conn.as_mut(), "ac:$$missing", "mercedes_s500_1")
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_replace_member() {
        let table = ScriptTable::new();
        for store in stores() {
            let mut conn = store.get().await.unwrap();
            seed(conn.as_mut()).await;

            replace_member(
                &table,
                conn.as_mut(),
                "ac:$$cars",
                "mercedes_s500_1",
                "mercedes s500::0000000000000009::mercedes_s500_1",
                3,
            )
            .await
            .unwrap();

            assert_eq!(store.zcard("ac:$$cars"), 2);
            assert!(store
                .zscore("ac:$$cars", "mercedes s500::0000000000000009::mercedes_s500_1")
                .is_some());

            let err = replace_member(&table, conn.as_mut(), "ac:$$cars", "nope_1", "x::0::nope_1", 3)
                .await
                .unwrap_err();
            assert!(matches!(err, AutocompleteError::MemberNotFound { .. }));
        }
    }

    #[tokio::test]
    async fn test_index_term_replaces_older_member() {
        let table = ScriptTable::new();
        for store in stores() {
            let mut conn = store.get().await.unwrap();
            seed(conn.as_mut()).await;

            index_term(
                &table,
                conn.as_mut(),
                "ac:$$cars",
                "ac:$cars",
                "toyota_prius_2",
                "toyota prius::0000000000000005::toyota_prius_2",
                b"{}".to_vec(),
                3,
            )
            .await
            .unwrap();

            assert_eq!(store.zcard("ac:$$cars"), 2);
            assert!(store
                .zscore("ac:$$cars", "toyota prius::0000000000000002::toyota_prius_2")
                .is_none());
            assert_eq!(store.hlen("ac:$cars"), 1);
        }
    }
}
