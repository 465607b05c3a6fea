//! Storage key layout.
//!
//! Every structure the engine touches is named here, so writers and readers
//! can never disagree on where a document lives:
//!
//! | structure                    | key                              |
//! |------------------------------|----------------------------------|
//! | prefix set (prefix indexing) | `{prefix}:{index}:{word-prefix}` |
//! | term set (term indexing)     | `{prefix}:$${index}`             |
//! | document hash                | `{prefix}:${index}`              |
//! | transient intersection       | `{prefix}:{index}:{t1}\|{t2}...` |
//!
//! Term-index members are [`CompositeMember`]s packing the lowercased term,
//! the encoded score and the document key into one string.
//!
//! Intersection sets share the namespace of prefix sets. A multi-term query
//! `se term!` caches into `{prefix}:{index}:se|term!`, which is also the
//! prefix set of the single word `se|term!`. Indexing words that contain
//! `|` next to multi-term searches can therefore clobber that prefix set
//! and put a short expiry on it.

use std::fmt;

use crate::document::Document;
use crate::error::{AutocompleteError, Result};
use crate::score::{SCORE_TOKEN_WIDTH, decode_score, encode_score};

/// Separator between the parts of a composite member.
pub const MEMBER_DELIMITER: &str = "::";

/// Derive the document key from a term and an identifier.
///
/// The key is the lowercased term with spaces replaced by underscores,
/// followed by `_` and the identifier.
///
/// ```
/// use autocomplete::keys::document_key_from;
///
/// assert_eq!(document_key_from("Test SEARCH term!", "123"), "test_search_term!_123");
/// ```
pub fn document_key_from(term: &str, id: &str) -> String {
    let mut key = term.to_lowercase().replace(' ', "_");
    key.push('_');
    key.push_str(id);
    key
}

/// Derive the document key of a document.
pub fn document_key<D: Document + ?Sized>(document: &D) -> String {
    document_key_from(document.term(), document.id())
}

/// Key names for one global prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space under the given global prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        KeySpace {
            prefix: prefix.into(),
        }
    }

    /// The global prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sorted set holding the documents with a word starting with `word_prefix`.
    pub fn prefix_set(&self, index: &str, word_prefix: &str) -> String {
        format!("{}:{}:{}", self.prefix, index, word_prefix)
    }

    /// Sorted set holding the composite members of an index.
    pub fn term_set(&self, index: &str) -> String {
        format!("{}:$${}", self.prefix, index)
    }

    /// Hash mapping document keys to payloads.
    pub fn document_hash(&self, index: &str) -> String {
        format!("{}:${}", self.prefix, index)
    }

    /// Sorted set caching the intersection of several query terms.
    pub fn intersection_set(&self, index: &str, terms: &[String]) -> String {
        format!("{}:{}:{}", self.prefix, index, terms.join("|"))
    }
}

/// A term-index member: `lowercase(term)::encoded-score::document-key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeMember {
    pub term: String,
    pub score: u64,
    pub document_key: String,
}

impl CompositeMember {
    /// Build the member for a document at the given score.
    pub fn new<D: Document + ?Sized>(document: &D, score: u64) -> Self {
        CompositeMember {
            term: document.term().to_lowercase(),
            score,
            document_key: document_key(document),
        }
    }

    /// Split a stored member back into its parts.
    ///
    /// The term may itself contain the delimiter, so the split happens at
    /// the first delimiter followed by a full score token and a document
    /// key derived from the term before it.
    pub fn parse(member: &str) -> Result<Self> {
        let Some((term, score, document_key)) = split_member(member) else {
            return Err(AutocompleteError::decode(format!(
                "malformed term index member: {member}"
            )));
        };

        Ok(CompositeMember {
            term: term.to_string(),
            score: decode_score(score)?,
            document_key: document_key.to_string(),
        })
    }
}

fn is_score_token(token: &[u8]) -> bool {
    token.len() == SCORE_TOKEN_WIDTH && token.iter().all(u8::is_ascii_hexdigit)
}

/// Term, score token and document key of a stored member.
fn split_member(member: &str) -> Option<(&str, &str, &str)> {
    let bytes = member.as_bytes();
    let delimiter = MEMBER_DELIMITER.as_bytes();
    let score_end = |at: usize| at + delimiter.len() + SCORE_TOKEN_WIDTH;

    (0..bytes.len())
        .filter(|&at| bytes[at..].starts_with(delimiter))
        .find_map(|at| {
            let score = bytes.get(at + delimiter.len()..score_end(at))?;
            if !is_score_token(score) || !bytes[score_end(at)..].starts_with(delimiter) {
                return None;
            }

            let term = &member[..at];
            let document_key = &member[score_end(at) + delimiter.len()..];
            document_key
                .starts_with(&term.replace(' ', "_"))
                .then(|| (term, &member[at + delimiter.len()..score_end(at)], document_key))
        })
}

impl fmt::Display for CompositeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{MEMBER_DELIMITER}{}{MEMBER_DELIMITER}{}",
            self.term,
            encode_score(self.score),
            self.document_key
        )
    }
}

/// The document key embedded in a stored member.
///
/// Falls back to the last `::` segment for members that do not parse.
pub fn member_document_key(member: &str) -> &str {
    match split_member(member) {
        Some((_, _, document_key)) => document_key,
        None => member.rsplit(MEMBER_DELIMITER).next().unwrap_or(member),
    }
}

/// The encoded score token embedded in a stored member.
///
/// Returns an empty string for members without a score segment.
pub fn member_score_token(member: &str) -> &str {
    split_member(member).map_or("", |(_, score, _)| score)
}

/// Whether a stored member belongs to `document_key`: it must end with the
/// key, preceded by a delimiter, a score token and another delimiter.
pub fn member_has_key(member: &str, document_key: &str) -> bool {
    let Some(head) = member
        .strip_suffix(document_key)
        .and_then(|head| head.strip_suffix(MEMBER_DELIMITER))
    else {
        return false;
    };

    let head = head.as_bytes();
    let Some(start) = head.len().checked_sub(SCORE_TOKEN_WIDTH + MEMBER_DELIMITER.len()) else {
        return false;
    };
    let (delimiter, score) = head[start..].split_at(MEMBER_DELIMITER.len());
    delimiter == MEMBER_DELIMITER.as_bytes() && is_score_token(score)
}
