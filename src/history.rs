use std::collections::VecDeque;

/// 状态历史记录
///
/// Bounded record of entered state names, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl StateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 记录进入的状态，超出容量时丢弃最旧的记录
    pub fn record(&mut self, state: impl Into<String>) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(state.into());
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    /// 上一个状态
    pub fn previous(&self) -> Option<&str> {
        self.recent().nth(1)
    }

    /// Newest first.
    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<&str> {
        self.entries.iter().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_ring() {
        let mut history = StateHistory::new(3);
        assert_eq!(history.previous(), None);
        for state in ["Idle", "Walk", "Run", "Jump"] {
            history.record(state);
        }
        assert_eq!(history.to_vec(), vec!["Walk", "Run", "Jump"]);
        assert_eq!(history.current(), Some("Jump"));
        assert_eq!(history.previous(), Some("Run"));
        assert_eq!(StateHistory::new(0).capacity(), 1);
    }
}
