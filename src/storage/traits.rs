//! Store abstraction traits and common types.
//!
//! The engine never talks to a concrete client. It acquires connections
//! from a [`StorePool`] and issues sorted-set, hash, transaction and script
//! commands through [`StoreConnection`]. The command set mirrors the subset
//! of Redis the engine needs, so a Redis client wraps it one-to-one.

use std::fmt;

use async_trait::async_trait;

use crate::error::{AutocompleteError, Result};
use crate::storage::script::Script;

/// A reply returned by transactions and scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Nil,
    /// Integer reply.
    Int(i64),
    /// Binary-safe string reply.
    Data(Vec<u8>),
    /// Array reply.
    Bulk(Vec<Value>),
    /// Status reply.
    Okay,
}

impl Value {
    /// Interpret the reply as an optional string.
    pub fn into_optional_string(self) -> Result<Option<String>> {
        match self {
            Value::Nil => Ok(None),
            Value::Data(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AutocompleteError::decode(format!("reply is not UTF-8: {e}"))),
            other => Err(AutocompleteError::decode(format!(
                "expected a string reply, got {other:?}"
            ))),
        }
    }

    /// Interpret the reply as a boolean integer.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            Value::Int(n) => Ok(n != 0),
            Value::Nil => Ok(false),
            other => Err(AutocompleteError::decode(format!(
                "expected an integer reply, got {other:?}"
            ))),
        }
    }
}

/// Bound of a range-by-score query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// `-inf`
    NegInf,
    /// `+inf`
    PosInf,
    /// Score included in the range.
    Inclusive(f64),
    /// Score excluded from the range, `(score`.
    Exclusive(f64),
}

impl ScoreBound {
    /// Whether `score` is at or above this lower bound.
    pub fn admits_from_below(&self, score: f64) -> bool {
        match *self {
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
            ScoreBound::Inclusive(bound) => score >= bound,
            ScoreBound::Exclusive(bound) => score > bound,
        }
    }

    /// Whether `score` is at or below this upper bound.
    pub fn admits_from_above(&self, score: f64) -> bool {
        match *self {
            ScoreBound::NegInf => false,
            ScoreBound::PosInf => true,
            ScoreBound::Inclusive(bound) => score <= bound,
            ScoreBound::Exclusive(bound) => score < bound,
        }
    }
}

/// Bound of a range-by-lex query, compared byte-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    /// `-`
    NegInf,
    /// `+`
    PosInf,
    /// `[value`
    Inclusive(Vec<u8>),
    /// `(value`
    Exclusive(Vec<u8>),
}

impl LexBound {
    /// Whether `member` is at or above this lower bound.
    pub fn admits_from_below(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Inclusive(bound) => member >= bound.as_slice(),
            LexBound::Exclusive(bound) => member > bound.as_slice(),
        }
    }

    /// Whether `member` is at or below this upper bound.
    pub fn admits_from_above(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Inclusive(bound) => member <= bound.as_slice(),
            LexBound::Exclusive(bound) => member < bound.as_slice(),
        }
    }
}

/// How scores combine when intersecting sorted sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    /// Combine two scores.
    pub fn combine(&self, a: f64, b: f64) -> f64 {
        match self {
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

/// A write command queued in a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    ZRem {
        key: String,
        member: String,
    },
    ZInterStore {
        destination: String,
        keys: Vec<String>,
        aggregate: Aggregate,
    },
    HSet {
        key: String,
        field: String,
        value: Vec<u8>,
    },
    HDel {
        key: String,
        field: String,
    },
    Expire {
        key: String,
        seconds: u64,
    },
}

/// An ordered batch of commands executed atomically (`MULTI`/`EXEC`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    /// Create an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `ZADD`.
    pub fn zadd(&mut self, key: impl Into<String>, score: f64, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::ZAdd {
            key: key.into(),
            score,
            member: member.into(),
        });
        self
    }

    /// Queue a `ZREM`.
    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::ZRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Queue a `ZINTERSTORE destination numkeys key... AGGREGATE aggregate`.
    pub fn zinterstore(
        &mut self,
        destination: impl Into<String>,
        keys: Vec<String>,
        aggregate: Aggregate,
    ) -> &mut Self {
        self.commands.push(Command::ZInterStore {
            destination: destination.into(),
            keys,
            aggregate,
        });
        self
    }

    /// Queue an `HSET`.
    pub fn hset(&mut self, key: impl Into<String>, field: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.commands.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value,
        });
        self
    }

    /// Queue an `HDEL`.
    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.commands.push(Command::HDel {
            key: key.into(),
            field: field.into(),
        });
        self
    }

    /// Queue an `EXPIRE`.
    pub fn expire(&mut self, key: impl Into<String>, seconds: u64) -> &mut Self {
        self.commands.push(Command::Expire {
            key: key.into(),
            seconds,
        });
        self
    }

    /// The queued commands, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Take the queued commands.
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// A pool handing out store connections.
///
/// Each concurrent task acquires its own connection; the connection is
/// returned to the pool when dropped.
#[async_trait]
pub trait StorePool: Send + Sync + fmt::Debug {
    /// Acquire a connection.
    async fn get(&self) -> Result<Box<dyn StoreConnection>>;
}

/// A single connection to the backing store.
#[async_trait]
pub trait StoreConnection: Send {
    /// `ZRANGE key start stop`
    async fn zrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// `ZREVRANGE key start stop`
    async fn zrevrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// `ZRANGEBYSCORE key min max`
    async fn zrangebyscore(&mut self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<String>>;

    /// `ZREVRANGEBYSCORE key max min`
    async fn zrevrangebyscore(&mut self, key: &str, max: ScoreBound, min: ScoreBound) -> Result<Vec<String>>;

    /// `ZRANGEBYLEX key min max`
    async fn zrangebylex(&mut self, key: &str, min: LexBound, max: LexBound) -> Result<Vec<String>>;

    /// `ZREVRANGEBYLEX key max min`
    async fn zrevrangebylex(&mut self, key: &str, max: LexBound, min: LexBound) -> Result<Vec<String>>;

    /// `HMGET key field...`
    async fn hmget(&mut self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// `HEXISTS key field`
    async fn hexists(&mut self, key: &str, field: &str) -> Result<bool>;

    /// `WATCH key...`, making the next [`exec`](Self::exec) conditional.
    async fn watch(&mut self, keys: &[String]) -> Result<()>;

    /// `UNWATCH`
    async fn unwatch(&mut self) -> Result<()>;

    /// Execute a transaction atomically.
    ///
    /// Returns `None` without applying anything when a watched key changed
    /// since it was watched. Watches are cleared either way.
    async fn exec(&mut self, transaction: Transaction) -> Result<Option<Vec<Value>>>;

    /// Whether [`eval`](Self::eval) is available on this connection.
    fn supports_scripting(&self) -> bool;

    /// Run a script atomically on the server.
    async fn eval(&mut self, script: &Script, keys: &[String], args: &[Vec<u8>]) -> Result<Value>;
}

/// Error types specific to store operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// The store was closed.
    StorageClosed,

    /// Connection-level failure.
    ConnectionFailed(String),

    /// A command targeted a key holding another kind of value.
    WrongType(String),

    /// The backend cannot run scripts.
    ScriptingUnsupported(String),

    /// A script returned an error reply.
    ScriptFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::StorageClosed => write!(f, "Storage is closed"),
            StorageError::ConnectionFailed(msg) => write!(f, "Connection failed: {msg}"),
            StorageError::WrongType(key) => write!(
                f,
                "WRONGTYPE Operation against a key holding the wrong kind of value: {key}"
            ),
            StorageError::ScriptingUnsupported(name) => {
                write!(f, "Scripting is not supported (script {name})")
            }
            StorageError::ScriptFailed(msg) => write!(f, "Script failed: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for AutocompleteError {
    fn from(err: StorageError) -> Self {
        AutocompleteError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::StorageClosed;
        assert_eq!(err.to_string(), "Storage is closed");

        let err = StorageError::WrongType("ac:$cars".to_string());
        assert_eq!(
            err.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value: ac:$cars"
        );

        let err: AutocompleteError = StorageError::ConnectionFailed("reset".to_string()).into();
        assert_eq!(err.to_string(), "Storage error: Connection failed: reset");
    }

    #[test]
    fn test_transaction_builder() {
        let mut tx = Transaction::new();
        assert!(tx.is_empty());

        tx.zadd("ac:cars:m", 1.0, "mercedes_1")
            .hset("ac:$cars", "mercedes_1", b"{}".to_vec())
            .expire("ac:cars:m", 60);

        assert_eq!(tx.len(), 3);
        assert_eq!(
            tx.commands()[0],
            Command::ZAdd {
                key: "ac:cars:m".to_string(),
                score: 1.0,
                member: "mercedes_1".to_string(),
            }
        );
    }

    #[test]
    fn test_bounds() {
        assert!(ScoreBound::NegInf.admits_from_below(f64::MIN));
        assert!(ScoreBound::Exclusive(1.0).admits_from_below(1.5));
        assert!(!ScoreBound::Exclusive(1.0).admits_from_below(1.0));
        assert!(ScoreBound::Inclusive(2.0).admits_from_above(2.0));

        let mut upper = b"mer".to_vec();
        upper.push(0xff);
        let upper = LexBound::Inclusive(upper);
        let lower = LexBound::Inclusive(b"mer".to_vec());

        assert!(lower.admits_from_below(b"mercedes"));
        assert!(upper.admits_from_above(b"mercedes"));
        assert!(!lower.admits_from_below(b"me"));
        assert!(!upper.admits_from_above(b"mes"));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Nil.into_optional_string().unwrap(), None);
        assert_eq!(
            Value::Data(b"abc".to_vec()).into_optional_string().unwrap(),
            Some("abc".to_string())
        );
        assert!(Value::Int(1).into_optional_string().is_err());
        assert!(Value::Int(1).into_bool().unwrap());
        assert!(!Value::Int(0).into_bool().unwrap());
        assert!(Value::Okay.into_bool().is_err());
        assert_eq!(Aggregate::Max.combine(1.0, 3.0), 3.0);
    }
}
