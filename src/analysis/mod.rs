//! Text analysis for autocomplete.
//!
//! Indexing and querying share the same analysis: words are separated by
//! single spaces and compared lowercased. Nothing else (stemming, stop words,
//! punctuation stripping) is applied, so `term!` and `term` are different
//! words.

pub mod prefix;
pub mod query;

// Re-export commonly used functions
pub use prefix::prefixes;
pub use query::query_terms;
