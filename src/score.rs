//! Fixed-width score tokens for term-index members.
//!
//! Scores are written as 16 lowercase hexadecimal digits. The digit
//! alphabet `0-9a-f` is in ascending ASCII order, so comparing two tokens
//! byte by byte gives the same answer as comparing the scores they encode.
//!
//! ```
//! use autocomplete::score::{decode_score, encode_score};
//!
//! assert_eq!(encode_score(200), "00000000000000c8");
//! assert!(encode_score(9) < encode_score(10));
//! assert_eq!(decode_score("00000000000000c8").unwrap(), 200);
//! ```

use crate::error::{AutocompleteError, Result};

/// Number of characters in an encoded score.
pub const SCORE_TOKEN_WIDTH: usize = 16;

/// Encode a score into its fixed-width, order-preserving token.
pub fn encode_score(score: u64) -> String {
    format!("{score:016x}")
}

/// Decode a token produced by [`encode_score`].
pub fn decode_score(token: &str) -> Result<u64> {
    if token.len() != SCORE_TOKEN_WIDTH || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AutocompleteError::decode(format!(
            "score token must be {SCORE_TOKEN_WIDTH} hex digits, got {:?}",
            token
        )));
    }

    u64::from_str_radix(token, 16)
        .map_err(|e| AutocompleteError::decode(format!("invalid score token {token:?}: {e}")))
}
