//! URL-safe identifiers derived from issue titles.

/// Derive a lower-case, hyphen-separated slug from a title.
///
/// Every run of characters outside `[a-z0-9]` (after lower-casing) becomes a
/// single `-`, and leading/trailing hyphens are removed. Total and
/// idempotent: `slugify(&slugify(x)) == slugify(x)`.
///
/// ```rust
/// use magazine_ingest::slugify;
///
/// assert_eq!(slugify("Tada Todays Edisi Januari 2025"), "tada-todays-edisi-januari-2025");
/// assert_eq!(slugify("!!!"), "");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
