//! Index maintenance.
//!
//! Writing a document touches two structures: the strategy-specific sorted
//! sets that make the document findable, and the document hash that stores
//! its payload under the document key. Both are updated in one atomic step.

pub mod writer;
