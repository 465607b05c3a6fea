//! Query planning.
//!
//! A query is turned into a [`QueryPlan`] naming the structure to read
//! before any connection is acquired, so empty queries never touch the
//! store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::query::{query_phrase, query_terms};
use crate::config::IndexType;
use crate::error::{AutocompleteError, Result};
use crate::keys::KeySpace;

/// Order of search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending by document key (prefix indexing) or by member (term
    /// indexing).
    #[default]
    Lexicographical,
    /// Descending by document key or member.
    ReverseLexicographical,
    /// Ascending by score.
    Score,
    /// Descending by score.
    ReverseScore,
}

impl TryFrom<i32> for SortOrder {
    type Error = AutocompleteError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(SortOrder::Lexicographical),
            1 => Ok(SortOrder::ReverseLexicographical),
            2 => Ok(SortOrder::Score),
            3 => Ok(SortOrder::ReverseScore),
            other => Err(AutocompleteError::invalid_sort_order(other.to_string())),
        }
    }
}

impl FromStr for SortOrder {
    type Err = AutocompleteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lex" | "lexicographical" => Ok(SortOrder::Lexicographical),
            "rev_lex" | "reverse_lexicographical" => Ok(SortOrder::ReverseLexicographical),
            "score" => Ok(SortOrder::Score),
            "rev_score" | "reverse_score" => Ok(SortOrder::ReverseScore),
            _ => Err(AutocompleteError::invalid_sort_order(s)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::Lexicographical => "lexicographical",
            SortOrder::ReverseLexicographical => "reverse_lexicographical",
            SortOrder::Score => "score",
            SortOrder::ReverseScore => "reverse_score",
        };
        write!(f, "{name}")
    }
}

/// Where the document keys matching a query come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// The query has no terms; nothing matches.
    Empty,

    /// Read a single prefix set.
    PrefixSet { key: String },

    /// Intersect several prefix sets into `destination`, then read it.
    Intersection {
        destination: String,
        sources: Vec<String>,
    },

    /// Range over the members of a term set starting with `phrase`.
    TermRange { set: String, phrase: String },
}

impl QueryPlan {
    /// Plan a query against `index`.
    pub fn new(keys: &KeySpace, index_type: IndexType, index: &str, query: &str) -> Self {
        let terms = query_terms(query);
        if terms.is_empty() {
            return QueryPlan::Empty;
        }

        match index_type {
            IndexType::Prefixes if terms.len() == 1 => QueryPlan::PrefixSet {
                key: keys.prefix_set(index, &terms[0]),
            },
            IndexType::Prefixes => QueryPlan::Intersection {
                destination: keys.intersection_set(index, &terms),
                sources: terms.iter().map(|term| keys.prefix_set(index, term)).collect(),
            },
            IndexType::Terms => QueryPlan::TermRange {
                set: keys.term_set(index),
                phrase: query_phrase(query),
            },
        }
    }
}
