//! Prefix generation for prefix indexing.

/// Expand a term into the distinct prefixes of its words.
///
/// The term is split on single spaces and every word is lowercased. Each
/// non-empty prefix of each word is emitted once, in order of first
/// occurrence. Prefixes end on character boundaries.
///
/// # Examples
///
/// ```
/// use autocomplete::analysis::prefixes;
///
/// let prefixes = prefixes("Test SEARCH term!");
/// assert_eq!(
///     prefixes,
///     vec![
///         "t", "te", "tes", "test", "s", "se", "sea", "sear", "searc", "search",
///         "ter", "term", "term!",
///     ]
/// );
/// ```
pub fn prefixes(term: &str) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for word in term.split(' ') {
        let word = word.to_lowercase();

        for (offset, c) in word.char_indices() {
            let prefix = &word[..offset + c.len_utf8()];
            append_unique(&mut result, prefix);
        }
    }

    result
}

fn append_unique(prefixes: &mut Vec<String>, prefix: &str) {
    if !prefixes.iter().any(|existing| existing == prefix) {
        prefixes.push(prefix.to_string());
    }
}
