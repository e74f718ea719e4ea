/// Canonical form of a provider id ("tt0110912").
///
/// Watched entries are keyed per user on this form, so "TT0110912 " and
/// "tt0110912" refer to the same movie.
pub fn normalize_external_id(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

/// Compare two provider ids after normalization
pub fn same_external_id(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
