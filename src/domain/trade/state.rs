//! Bounded per-symbol history rings for trades and fills.

use std::collections::VecDeque;

/// Rolling history buffer, newest first.
///
/// Holds at most `max_size` entries; pushing at capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct TradeHistory<T> {
    pub symbol: String,
    entries: VecDeque<T>,
    max_size: usize,
}

impl<T> TradeHistory<T> {
    pub fn new(symbol: impl Into<String>, max_size: usize) -> Self {
        Self {
            symbol: symbol.into(),
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push a new entry, evicting the oldest if at capacity.
    pub fn push(&mut self, entry: T) {
        if self.max_size == 0 {
            return;
        }
        if self.entries.len() >= self.max_size {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Push entries given oldest first, so the last one ends up newest.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = T>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn entries(&self) -> &VecDeque<T> {
        &self.entries
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl<T: Clone> TradeHistory<T> {
    /// Copy out the entries, newest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_newest_first() {
        let mut history = TradeHistory::new("BTCUSD", 10);
        history.push(1);
        history.push(2);
        assert_eq!(history.latest(), Some(&2));
        assert_eq!(history.to_vec(), vec![2, 1]);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = TradeHistory::new("BTCUSD", 3);
        history.extend([1, 2, 3, 4, 5]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec(), vec![5, 4, 3]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = TradeHistory::new("BTCUSD", 0);
        history.push(1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut history = TradeHistory::new("BTCUSD", 3);
        history.push(1);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }
}
