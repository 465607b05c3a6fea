//! Query term extraction.

/// Split a query into its lowercased terms.
///
/// Empty segments produced by leading, trailing or repeated spaces are
/// dropped, so a blank query has no terms.
///
/// ```
/// use autocomplete::analysis::query_terms;
///
/// assert_eq!(query_terms("SE term!"), vec!["se", "term!"]);
/// assert!(query_terms("   ").is_empty());
/// ```
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(' ')
        .filter(|term| !term.is_empty())
        .map(|term| term.to_string())
        .collect()
}

/// The lowercased query as one phrase, used by term indexing.
///
/// Spacing is kept verbatim, so a trailing space only matches terms where
/// the last word is complete.
pub fn query_phrase(query: &str) -> String {
    query.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_terms() {
        assert_eq!(query_terms("se"), vec!["se"]);
        assert_eq!(query_terms("Se TERM!"), vec!["se", "term!"]);
        assert_eq!(query_terms(" se  term! "), vec!["se", "term!"]);
        assert!(query_terms("").is_empty());
    }

    #[test]
    fn test_query_terms_keep_order_and_duplicates() {
        assert_eq!(query_terms("b a b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn test_query_phrase() {
        assert_eq!(query_phrase("Mercedes S"), "mercedes s");
        assert_eq!(query_phrase("Mercedes  S500"), "mercedes  s500");
        assert_eq!(query_phrase("test "), "test ");
        assert_eq!(query_phrase(" Test"), " test");
    }
}
