//! Server-side scripts.
//!
//! A [`Script`] carries two renditions of the same routine: the Lua source a
//! Redis-protocol backend sends with `EVAL`, and a native body that backends
//! executing scripts in-process (such as [`MemoryStore`](super::MemoryStore))
//! run under their own lock through a [`ScriptContext`].

use std::fmt;

use crate::error::Result;
use crate::storage::traits::Value;

/// Native rendition of a script: `(context, KEYS, ARGV) -> reply`.
pub type ScriptBody = fn(&mut dyn ScriptContext, &[String], &[Vec<u8>]) -> Result<Value>;

/// The commands available to a native script body.
///
/// Everything done through the context happens inside the same atomic
/// server-side execution.
pub trait ScriptContext {
    /// `ZRANGE key start stop`
    fn zrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// `ZADD key score member`, returning whether the member is new.
    fn zadd(&mut self, key: &str, score: f64, member: &str) -> Result<bool>;

    /// `ZREM key member`, returning whether the member existed.
    fn zrem(&mut self, key: &str, member: &str) -> Result<bool>;

    /// `HSET key field value`, returning whether the field is new.
    fn hset(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool>;

    /// `HDEL key field`, returning whether the field existed.
    fn hdel(&mut self, key: &str, field: &str) -> Result<bool>;
}

/// A named server-side script.
#[derive(Clone, Copy)]
pub struct Script {
    name: &'static str,
    source: &'static str,
    body: ScriptBody,
}

impl Script {
    /// Create a script from its Lua source and native body.
    pub const fn new(name: &'static str, source: &'static str, body: ScriptBody) -> Self {
        Script { name, source, body }
    }

    /// Script name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Lua source for `EVAL`.
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Run the native body against a context.
    pub fn invoke(&self, context: &mut dyn ScriptContext, keys: &[String], args: &[Vec<u8>]) -> Result<Value> {
        (self.body)(context, keys, args)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("name", &self.name)
            .field("source_len", &self.source.len())
            .finish()
    }
}
