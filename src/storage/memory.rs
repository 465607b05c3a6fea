//! In-memory store implementation for testing and embedding.
//!
//! [`MemoryStore`] implements the full store boundary inside the process:
//! sorted sets, hashes, key expiry, `WATCH`-style optimistic transactions
//! and atomic script execution. Connections are limited by a semaphore and
//! released when dropped, like a pooled network client.

use std::collections::BTreeSet;
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;
use crate::storage::script::{Script, ScriptContext};
use crate::storage::traits::{
    Aggregate, Command, LexBound, ScoreBound, StorageError, StoreConnection, StorePool, Transaction,
    Value,
};

/// Configuration for [`MemoryStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Maximum number of connections checked out at once.
    pub max_connections: usize,

    /// Whether connections execute scripts. When disabled, callers fall
    /// back to optimistic transactions.
    pub scripting: bool,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        MemoryStoreConfig {
            max_connections: 16,
            scripting: true,
        }
    }
}

/// An in-memory sorted-set/hash store.
#[derive(Debug)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    permits: Arc<Semaphore>,
    open: Arc<AtomicUsize>,
    config: MemoryStoreConfig,
}

impl MemoryStore {
    /// Create a new memory store.
    pub fn new(config: MemoryStoreConfig) -> Self {
        MemoryStore {
            state: Arc::new(Mutex::new(MemoryState::default())),
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
            open: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Create a new memory store with default configuration.
    pub fn new_default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }

    /// The store configuration.
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Close the store. Later acquisitions and commands fail.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.permits.close();
    }

    /// Number of connections currently checked out.
    pub fn open_connections(&self) -> usize {
        self.open.load(AtomicOrdering::SeqCst)
    }

    /// Whether a key exists.
    pub fn exists(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.purge_if_expired(key);
        state.entries.contains_key(key)
    }

    /// Remaining time to live of a key, if it has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut state = self.state.lock();
        state.purge_if_expired(key);
        state
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Cardinality of a sorted set, 0 when missing.
    pub fn zcard(&self, key: &str) -> usize {
        let mut state = self.state.lock();
        match state.sorted_set(key) {
            Ok(Some(set)) => set.len(),
            _ => 0,
        }
    }

    /// Score of a sorted-set member.
    pub fn zscore(&self, key: &str, member: &str) -> Option<f64> {
        let mut state = self.state.lock();
        match state.sorted_set(key) {
            Ok(Some(set)) => set.score(member),
            _ => None,
        }
    }

    /// Number of fields in a hash, 0 when missing.
    pub fn hlen(&self, key: &str) -> usize {
        let mut state = self.state.lock();
        match state.hash(key) {
            Ok(Some(hash)) => hash.len(),
            _ => 0,
        }
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut state = self.state.lock();
        state.purge_all_expired();
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new_default()
    }
}

#[async_trait]
impl StorePool for MemoryStore {
    async fn get(&self) -> Result<Box<dyn StoreConnection>> {
        if self.state.lock().closed {
            return Err(StorageError::StorageClosed.into());
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StorageError::StorageClosed)?;

        self.open.fetch_add(1, AtomicOrdering::SeqCst);

        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            watched: Vec::new(),
            scripting: self.config.scripting,
            open: Arc::clone(&self.open),
            _permit: permit,
        }))
    }
}

/// A connection checked out of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    /// Watched keys with the version they had when watched.
    watched: Vec<(String, u64)>,
    scripting: bool,
    open: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.open.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

impl MemoryConnection {
    fn read_set<T>(
        &self,
        key: &str,
        read: impl FnOnce(&SortedSet) -> Vec<T>,
    ) -> Result<Vec<T>> {
        let mut state = self.state.lock();
        state.check_open()?;
        Ok(state.sorted_set(key)?.map(read).unwrap_or_default())
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn zrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.read_set(key, |set| set.range(start, stop, false))
    }

    async fn zrevrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.read_set(key, |set| set.range(start, stop, true))
    }

    async fn zrangebyscore(&mut self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<String>> {
        self.read_set(key, |set| {
            set.iter()
                .filter(|m| min.admits_from_below(m.score) && max.admits_from_above(m.score))
                .map(|m| m.member.clone())
                .collect()
        })
    }

    async fn zrevrangebyscore(&mut self, key: &str, max: ScoreBound, min: ScoreBound) -> Result<Vec<String>> {
        self.read_set(key, |set| {
            set.iter()
                .rev()
                .filter(|m| min.admits_from_below(m.score) && max.admits_from_above(m.score))
                .map(|m| m.member.clone())
                .collect()
        })
    }

    async fn zrangebylex(&mut self, key: &str, min: LexBound, max: LexBound) -> Result<Vec<String>> {
        self.read_set(key, |set| {
            set.iter()
                .filter(|m| {
                    let bytes = m.member.as_bytes();
                    min.admits_from_below(bytes) && max.admits_from_above(bytes)
                })
                .map(|m| m.member.clone())
                .collect()
        })
    }

    async fn zrevrangebylex(&mut self, key: &str, max: LexBound, min: LexBound) -> Result<Vec<String>> {
        self.read_set(key, |set| {
            set.iter()
                .rev()
                .filter(|m| {
                    let bytes = m.member.as_bytes();
                    min.admits_from_below(bytes) && max.admits_from_above(bytes)
                })
                .map(|m| m.member.clone())
                .collect()
        })
    }

    async fn hmget(&mut self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut state = self.state.lock();
        state.check_open()?;
        let hash = state.hash(key)?;
        Ok(fields
            .iter()
            .map(|field| hash.and_then(|h| h.get(field).cloned()))
            .collect())
    }

    async fn hexists(&mut self, key: &str, field: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.check_open()?;
        Ok(state.hash(key)?.is_some_and(|h| h.contains_key(field)))
    }

    async fn watch(&mut self, keys: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        for key in keys {
            state.purge_if_expired(key);
            let version = state.version(key);
            self.watched.push((key.clone(), version));
        }
        Ok(())
    }

    async fn unwatch(&mut self) -> Result<()> {
        self.watched.clear();
        Ok(())
    }

    async fn exec(&mut self, transaction: Transaction) -> Result<Option<Vec<Value>>> {
        let watched = std::mem::take(&mut self.watched);
        let mut state = self.state.lock();
        state.check_open()?;

        for (key, version) in &watched {
            state.purge_if_expired(key);
            if state.version(key) != *version {
                return Ok(None);
            }
        }

        state.validate(transaction.commands())?;

        let replies = transaction
            .into_commands()
            .into_iter()
            .map(|command| state.apply(command))
            .collect::<Result<Vec<Value>>>()?;

        Ok(Some(replies))
    }

    fn supports_scripting(&self) -> bool {
        self.scripting
    }

    async fn eval(&mut self, script: &Script, keys: &[String], args: &[Vec<u8>]) -> Result<Value> {
        if !self.scripting {
            return Err(StorageError::ScriptingUnsupported(script.name().to_string()).into());
        }

        let mut state = self.state.lock();
        state.check_open()?;
        script.invoke(&mut *state, keys, args)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ScoredMember {
    score: f64,
    member: String,
}

impl Eq for ScoredMember {}

impl PartialOrd for ScoredMember {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredMember {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.as_bytes().cmp(other.member.as_bytes()))
    }
}

/// Members ordered by (score, member bytes).
#[derive(Debug, Clone, Default)]
struct SortedSet {
    scores: AHashMap<String, f64>,
    ordered: BTreeSet<ScoredMember>,
}

impl SortedSet {
    fn len(&self) -> usize {
        self.scores.len()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = &ScoredMember> {
        self.ordered.iter()
    }

    /// Insert or rescore a member. Returns whether it was new.
    fn add(&mut self, member: &str, score: f64) -> bool {
        match self.scores.insert(member.to_string(), score) {
            Some(previous) => {
                self.ordered.remove(&ScoredMember {
                    score: previous,
                    member: member.to_string(),
                });
                self.ordered.insert(ScoredMember {
                    score,
                    member: member.to_string(),
                });
                false
            }
            None => {
                self.ordered.insert(ScoredMember {
                    score,
                    member: member.to_string(),
                });
                true
            }
        }
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&ScoredMember {
                    score,
                    member: member.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Members between two rank indexes, negative indexes counting from the end.
    fn range(&self, start: isize, stop: isize, reverse: bool) -> Vec<String> {
        let len = self.len() as isize;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Vec::new();
        }

        let take = (stop - start + 1) as usize;
        let members: Box<dyn Iterator<Item = &ScoredMember> + '_> = if reverse {
            Box::new(self.ordered.iter().rev())
        } else {
            Box::new(self.ordered.iter())
        };

        members
            .skip(start as usize)
            .take(take)
            .map(|m| m.member.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
enum EntryValue {
    SortedSet(SortedSet),
    Hash(AHashMap<String, Vec<u8>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    SortedSet,
    Hash,
}

#[derive(Debug, Clone)]
struct Entry {
    value: EntryValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn kind(&self) -> EntryKind {
        match self.value {
            EntryValue::SortedSet(_) => EntryKind::SortedSet,
            EntryValue::Hash(_) => EntryKind::Hash,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: AHashMap<String, Entry>,
    /// Version of each live key, bumped on every modification.
    versions: AHashMap<String, u64>,
    /// Version shared by every absent key. Bumped whenever a key goes away,
    /// so the per-key entry can be forgotten.
    absent_version: u64,
    clock: u64,
    closed: bool,
}

impl MemoryState {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(StorageError::StorageClosed.into())
        } else {
            Ok(())
        }
    }

    fn version(&self, key: &str) -> u64 {
        self.versions
            .get(key)
            .copied()
            .unwrap_or(self.absent_version)
    }

    fn touch(&mut self, key: &str) {
        self.clock += 1;
        if self.entries.contains_key(key) {
            self.versions.insert(key.to_string(), self.clock);
        } else {
            self.versions.remove(key);
            self.absent_version = self.clock;
        }
    }

    fn purge_if_expired(&mut self, key: &str) {
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|at| at <= Instant::now());

        if expired {
            self.entries.remove(key);
            self.touch(key);
        }
    }

    fn purge_all_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at.is_some_and(|at| at <= now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.entries.remove(&key);
            self.touch(&key);
        }
    }

    fn kind(&mut self, key: &str) -> Option<EntryKind> {
        self.purge_if_expired(key);
        self.entries.get(key).map(Entry::kind)
    }

    fn sorted_set(&mut self, key: &str) -> Result<Option<&SortedSet>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: EntryValue::SortedSet(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(StorageError::WrongType(key.to_string()).into()),
        }
    }

    fn hash(&mut self, key: &str) -> Result<Option<&AHashMap<String, Vec<u8>>>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: EntryValue::Hash(hash),
                ..
            }) => Ok(Some(hash)),
            Some(_) => Err(StorageError::WrongType(key.to_string()).into()),
        }
    }

    /// Check that every command in a transaction targets keys of the right
    /// kind, so the transaction applies entirely or not at all.
    fn validate(&mut self, commands: &[Command]) -> Result<()> {
        let mut kinds: AHashMap<&str, EntryKind> = AHashMap::new();

        for command in commands {
            match command {
                Command::ZAdd { key, .. } | Command::ZRem { key, .. } => {
                    self.check_kind(&kinds, key, EntryKind::SortedSet)?;
                    kinds.insert(key.as_str(), EntryKind::SortedSet);
                }
                Command::HSet { key, .. } | Command::HDel { key, .. } => {
                    self.check_kind(&kinds, key, EntryKind::Hash)?;
                    kinds.insert(key.as_str(), EntryKind::Hash);
                }
                Command::ZInterStore {
                    destination, keys, ..
                } => {
                    for key in keys {
                        self.check_kind(&kinds, key, EntryKind::SortedSet)?;
                    }
                    kinds.insert(destination.as_str(), EntryKind::SortedSet);
                }
                Command::Expire { .. } => {}
            }
        }

        Ok(())
    }

    fn check_kind(
        &mut self,
        pending: &AHashMap<&str, EntryKind>,
        key: &str,
        expected: EntryKind,
    ) -> Result<()> {
        let current = match pending.get(key) {
            Some(kind) => Some(*kind),
            None => self.kind(key),
        };

        match current {
            Some(kind) if kind != expected => Err(StorageError::WrongType(key.to_string()).into()),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, command: Command) -> Result<Value> {
        match command {
            Command::ZAdd { key, score, member } => Ok(Value::Int(self.zadd(&key, score, &member)? as i64)),
            Command::ZRem { key, member } => Ok(Value::Int(self.zrem(&key, &member)? as i64)),
            Command::ZInterStore {
                destination,
                keys,
                aggregate,
            } => Ok(Value::Int(self.zinterstore(&destination, &keys, aggregate)? as i64)),
            Command::HSet { key, field, value } => Ok(Value::Int(self.hset(&key, &field, &value)? as i64)),
            Command::HDel { key, field } => Ok(Value::Int(self.hdel(&key, &field)? as i64)),
            Command::Expire { key, seconds } => Ok(Value::Int(self.expire(&key, seconds) as i64)),
        }
    }

    fn sorted_set_mut(&mut self, key: &str) -> Result<&mut SortedSet> {
        self.purge_if_expired(key);
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: EntryValue::SortedSet(SortedSet::default()),
            expires_at: None,
        });
        match &mut entry.value {
            EntryValue::SortedSet(set) => Ok(set),
            EntryValue::Hash(_) => Err(StorageError::WrongType(key.to_string()).into()),
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut AHashMap<String, Vec<u8>>> {
        self.purge_if_expired(key);
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: EntryValue::Hash(AHashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            EntryValue::Hash(hash) => Ok(hash),
            EntryValue::SortedSet(_) => Err(StorageError::WrongType(key.to_string()).into()),
        }
    }

    /// Drop a key whose collection became empty.
    fn drop_if_empty(&mut self, key: &str) {
        let empty = match self.entries.get(key).map(|entry| &entry.value) {
            Some(EntryValue::SortedSet(set)) => set.is_empty(),
            Some(EntryValue::Hash(hash)) => hash.is_empty(),
            None => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }

    fn zadd(&mut self, key: &str, score: f64, member: &str) -> Result<bool> {
        let added = self.sorted_set_mut(key)?.add(member, score);
        self.touch(key);
        Ok(added)
    }

    fn zrem(&mut self, key: &str, member: &str) -> Result<bool> {
        if self.sorted_set(key)?.is_none() {
            return Ok(false);
        }
        let removed = self.sorted_set_mut(key)?.remove(member);
        if removed {
            self.drop_if_empty(key);
            self.touch(key);
        }
        Ok(removed)
    }

    fn zinterstore(&mut self, destination: &str, keys: &[String], aggregate: Aggregate) -> Result<usize> {
        let mut result: Option<AHashMap<String, f64>> = None;

        for key in keys {
            let scores = match self.sorted_set(key)? {
                Some(set) => set.scores.clone(),
                None => AHashMap::new(),
            };

            result = Some(match result {
                None => scores,
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(member, score)| {
                        scores
                            .get(&member)
                            .map(|other| (member, aggregate.combine(score, *other)))
                    })
                    .collect(),
            });
        }

        self.entries.remove(destination);

        let members = result.unwrap_or_default();
        let cardinality = members.len();
        if cardinality > 0 {
            let set = self.sorted_set_mut(destination)?;
            for (member, score) in members {
                set.add(&member, score);
            }
        }
        self.touch(destination);

        Ok(cardinality)
    }

    fn hset(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool> {
        let added = self
            .hash_mut(key)?
            .insert(field.to_string(), value.to_vec())
            .is_none();
        self.touch(key);
        Ok(added)
    }

    fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        if self.hash(key)?.is_none() {
            return Ok(false);
        }
        let removed = self.hash_mut(key)?.remove(field).is_some();
        if removed {
            self.drop_if_empty(key);
            self.touch(key);
        }
        Ok(removed)
    }

    fn expire(&mut self, key: &str, seconds: u64) -> bool {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                self.touch(key);
                true
            }
            None => false,
        }
    }
}

impl ScriptContext for MemoryState {
    fn zrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        Ok(self
            .sorted_set(key)?
            .map(|set| set.range(start, stop, false))
            .unwrap_or_default())
    }

    fn zadd(&mut self, key: &str, score: f64, member: &str) -> Result<bool> {
        MemoryState::zadd(self, key, score, member)
    }

    fn zrem(&mut self, key: &str, member: &str) -> Result<bool> {
        MemoryState::zrem(self, key, member)
    }

    fn hset(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool> {
        MemoryState::hset(self, key, field, value)
    }

    fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        MemoryState::hdel(self, key, field)
    }
}
