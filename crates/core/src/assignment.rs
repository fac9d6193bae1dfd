//! Round-robin annotator assignment over a persisted cursor.
//!
//! The cursor is owned by the caller (read once before a batch, written once
//! after). [`RoundRobin`] only advances an in-memory copy of it, one record at
//! a time, so the distribution stays balanced across batches and restarts.

/// Round-robin iterator over an ordered annotator list.
#[derive(Debug)]
pub struct RoundRobin<'a, T> {
    annotators: &'a [T],
    cursor: u64,
}

impl<'a, T> RoundRobin<'a, T> {
    /// Start from a persisted cursor.
    ///
    /// A cursor past the end of the list (an annotator was removed since it
    /// was stored) wraps modulo the current length.
    pub fn new(annotators: &'a [T], persisted_cursor: u64) -> Self {
        let cursor = match annotators.len() as u64 {
            0 => persisted_cursor,
            n => persisted_cursor % n,
        };
        Self { annotators, cursor }
    }

    /// Assign the next record. Returns `None` when there are no annotators,
    /// in which case the cursor does not move.
    pub fn next_assignee(&mut self) -> Option<&'a T> {
        let n = self.annotators.len() as u64;
        if n == 0 {
            return None;
        }
        let assignee = &self.annotators[self.cursor as usize];
        self.cursor = (self.cursor + 1) % n;
        Some(assignee)
    }

    /// Cursor value to persist after the batch.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}
