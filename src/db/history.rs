//! Fixed-capacity poll history.

use super::models::PollResult;

/// Maximum number of poll results retained per target.
pub const HISTORY_CAPACITY: usize = 100;

/// Ring buffer of the most recent poll results, oldest evicted first.
///
/// Appends never reallocate once the buffer is full: the slot holding the
/// oldest entry is overwritten in place. Iteration yields entries in
/// chronological order (oldest first), matching insertion order.
#[derive(Debug, Clone, Default)]
pub struct PollHistory {
    slots: Vec<PollResult>,
    /// Index of the oldest entry once the buffer has wrapped. Always 0 while
    /// the buffer is still filling.
    head: usize,
}

impl PollHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from stored rows, oldest first. Rows beyond the
    /// capacity fall out exactly as live appends would.
    pub fn from_rows(rows: Vec<PollResult>) -> Self {
        let mut history = Self::new();
        for row in rows {
            history.push(row);
        }
        history
    }

    /// Append a result, evicting the oldest entry once at capacity.
    pub fn push(&mut self, result: PollResult) {
        if self.slots.len() < HISTORY_CAPACITY {
            self.slots.push(result);
        } else {
            self.slots[self.head] = result;
            self.head = (self.head + 1) % HISTORY_CAPACITY;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PollResult> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// The most recently appended entry.
    pub fn newest(&self) -> Option<&PollResult> {
        if self.slots.is_empty() {
            return None;
        }
        if self.slots.len() < HISTORY_CAPACITY {
            return self.slots.last();
        }
        let idx = (self.head + HISTORY_CAPACITY - 1) % HISTORY_CAPACITY;
        self.slots.get(idx)
    }

    /// The newest `n` entries, in chronological order.
    pub fn recent(&self, n: usize) -> Vec<PollResult> {
        let skip = self.len().saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PollOutcome;
    use chrono::Utc;

    fn result(n: i64) -> PollResult {
        PollResult {
            timestamp: Utc::now(),
            outcome: if n % 2 == 0 { PollOutcome::Online } else { PollOutcome::Offline },
            response_time_ms: n,
            status_code: 200,
            error: None,
        }
    }

    fn times(history: &PollHistory) -> Vec<i64> {
        history.iter().map(|r| r.response_time_ms).collect()
    }

    #[test]
    fn test_push_preserves_order() {
        let mut history = PollHistory::new();
        for n in 0..5 {
            history.push(result(n));
        }
        assert_eq!(history.len(), 5);
        assert_eq!(times(&history), vec![0, 1, 2, 3, 4]);
        assert_eq!(history.newest().unwrap().response_time_ms, 4);
    }

    #[test]
    fn test_push_evicts_oldest_at_capacity() {
        let mut history = PollHistory::new();
        for n in 0..(HISTORY_CAPACITY as i64) {
            history.push(result(n));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        history.push(result(100));
        assert_eq!(history.len(), HISTORY_CAPACITY);
        let ordered = times(&history);
        assert_eq!(ordered.first(), Some(&1));
        assert_eq!(ordered.last(), Some(&100));
    }

    #[test]
    fn test_wraparound_stays_chronological() {
        let mut history = PollHistory::new();
        for n in 0..105 {
            history.push(result(n));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        let ordered = times(&history);
        assert_eq!(ordered, (5..105).collect::<Vec<i64>>());
        assert_eq!(history.newest().unwrap().response_time_ms, 104);
    }

    #[test]
    fn test_recent_returns_newest_entries() {
        let mut history = PollHistory::new();
        for n in 0..30 {
            history.push(result(n));
        }
        let recent = history.recent(20);
        assert_eq!(recent.len(), 20);
        assert_eq!(recent.first().unwrap().response_time_ms, 10);
        assert_eq!(recent.last().unwrap().response_time_ms, 29);

        // Asking for more than we have returns everything.
        assert_eq!(history.recent(500).len(), 30);
    }

    #[test]
    fn test_from_rows_caps_at_capacity() {
        let rows: Vec<PollResult> = (0..150).map(result).collect();
        let history = PollHistory::from_rows(rows);
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().response_time_ms, 50);
        assert_eq!(history.newest().unwrap().response_time_ms, 149);
    }

    #[test]
    fn test_empty_history() {
        let history = PollHistory::new();
        assert!(history.is_empty());
        assert!(history.newest().is_none());
        assert!(history.recent(20).is_empty());
    }
}
