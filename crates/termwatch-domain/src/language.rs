//! Language code handling for the matching filter

/// Check whether a language code is well formed (2 or 3 ASCII letters)
pub fn is_valid(code: &str) -> bool {
    (2..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Check whether an optional code satisfies an active filter
///
/// Missing or malformed codes never satisfy a filter; comparison is ASCII
/// case-insensitive.
pub fn matches_filter(code: Option<&str>, filter: &str) -> bool {
    match code {
        Some(code) => is_valid(code) && is_valid(filter) && code.eq_ignore_ascii_case(filter),
        None => false,
    }
}
