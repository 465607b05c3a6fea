//! Store boundary.
//!
//! The engine reaches its sorted sets and hashes through the
//! [`StorePool`]/[`StoreConnection`] traits. [`MemoryStore`] implements them
//! in-process; a Redis client can implement them by forwarding each method
//! to the command of the same name.

pub mod memory;
pub mod script;
pub mod traits;

// Re-export commonly used types
pub use memory::*;
pub use script::*;
pub use traits::*;
