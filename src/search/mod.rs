//! Searching an index.
//!
//! A search runs in three steps:
//!
//! 1. [`planner`] turns the query into the structure to read;
//! 2. [`executor`] reads the matching document keys in the requested order;
//! 3. [`hydrator`] fetches the payloads of those keys in concurrent batches.

pub mod executor;
pub mod hydrator;
pub mod planner;

pub use self::hydrator::hydrate;
pub use self::planner::{QueryPlan, SortOrder};
