//! Completion accounting.
//!
//! Counters are always re-derived from record state, never incremented, so a
//! crash between writing an annotation and updating a counter heals itself on
//! the next write.

/// Whether an annotation payload counts as a completed record.
///
/// `None`, empty and blank payloads do not count. Blank means Unicode
/// whitespace plus the byte order mark, the same set a browser's `trim()`
/// strips. `labelhub-db` mirrors this set in SQL.
pub fn is_completed(payload: Option<&str>) -> bool {
    payload.is_some_and(|p| p.chars().any(|c| !is_blank_char(c)))
}

fn is_blank_char(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Completion percentage `completed / total * 100`. Defined as `0.0` for an
/// empty dataset.
pub fn completion_percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Count completed payloads in an iterator of annotation payloads.
pub fn count_completed<'a, I>(payloads: I) -> u64
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    payloads.into_iter().filter(|p| is_completed(*p)).count() as u64
}
