use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
    pub status: bool,
    pub message: String,
}

/// Bounded history of raw check outcomes plus a saturating run-length counter.
///
/// `status_count` counts how many consecutive raw results equal
/// `current_status`, capped at `max_len`. The reported status of a prober
/// only flips once this count reaches the configured threshold.
///
/// `Clone` is a deep copy; a clone never shares the history with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounter {
    pub status_history: VecDeque<StatusHistory>,
    max_len: usize,
    pub current_status: bool,
    pub status_count: usize,
}

impl Default for StatusCounter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl StatusCounter {
    pub fn new(max_len: usize) -> Self {
        Self {
            status_history: VecDeque::with_capacity(max_len),
            max_len,
            current_status: true,
            status_count: 0,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn append_status(&mut self, status: bool, message: String) {
        if status != self.current_status {
            self.status_count = 0;
            self.current_status = status;
        }

        if self.status_count < self.max_len {
            self.status_count += 1;
        }

        self.status_history
            .push_back(StatusHistory { status, message });

        while self.status_history.len() > self.max_len {
            self.status_history.pop_front();
        }
    }

    /// Changes the history bound, keeping only the newest `max_len` entries.
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;

        if self.status_history.len() > self.max_len {
            let excess = self.status_history.len() - self.max_len;
            self.status_history.drain(..excess);
        }
        self.status_count = self.status_count.min(self.max_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counter() {
        const LEN: usize = 3;
        let mut s = StatusCounter::new(LEN);
        assert_eq!(s.max_len(), LEN);
        assert!(s.current_status);

        for i in 1..=LEN + 2 {
            s.append_status(false, "failure".to_string());
            assert!(!s.current_status);
            assert_eq!(s.status_count, i.min(LEN));
            assert!(s.status_history.len() <= LEN);
        }

        for i in 1..=LEN + 2 {
            s.append_status(true, "success".to_string());
            assert!(s.current_status);
            assert_eq!(s.status_count, i.min(LEN));
        }

        let mut s1 = s.clone();
        assert_eq!(s, s1);

        s1.set_max_len(2);
        assert_eq!(s1.max_len(), 2);
        assert_eq!(s1.status_history.len(), 2);
        assert_eq!(s.status_history.len(), LEN);
    }

    #[test]
    fn test_saturation_and_eviction() {
        let mut s = StatusCounter::new(3);
        let mut counts = vec![];
        for i in 0..4 {
            s.append_status(false, format!("failure {}", i));
            counts.push(s.status_count);
        }
        assert_eq!(counts, vec![1, 2, 3, 3]);
        assert_eq!(s.status_history.len(), 3);
        assert_eq!(s.status_history.front().unwrap().message, "failure 1");
        assert_eq!(s.status_history.back().unwrap().message, "failure 3");
    }

    #[test]
    fn test_flip_resets_count() {
        let mut s = StatusCounter::new(5);
        s.append_status(true, "ok".to_string());
        s.append_status(true, "ok".to_string());
        assert_eq!(s.status_count, 2);

        s.append_status(false, "boom".to_string());
        assert_eq!(s.status_count, 1);
        assert!(!s.current_status);

        s.append_status(true, "ok".to_string());
        assert_eq!(s.status_count, 1);
        assert!(s.current_status);
    }

    #[test]
    fn test_clone_does_not_alias() {
        let mut s = StatusCounter::new(4);
        s.append_status(true, "ok".to_string());
        s.append_status(false, "boom".to_string());

        let snapshot = s.clone();
        assert_eq!(snapshot, s);

        s.append_status(false, "boom again".to_string());
        s.set_max_len(1);

        assert_eq!(snapshot.status_history.len(), 2);
        assert_eq!(snapshot.status_count, 1);
        assert_eq!(snapshot.max_len(), 4);
        assert_eq!(snapshot.status_history.back().unwrap().message, "boom");
        assert_ne!(snapshot, s);
    }
}
