//! Bounded collection helpers

use std::collections::VecDeque;

/// Push onto a `VecDeque` while keeping at most `max_size` items
pub trait BoundedPush<T> {
    fn push_bounded(&mut self, value: T, max_size: usize);
}

impl<T> BoundedPush<T> for VecDeque<T> {
    /// Drops from the front once full (O(1) amortized)
    #[inline]
    fn push_bounded(&mut self, value: T, max_size: usize) {
        if max_size == 0 {
            return;
        }
        while self.len() >= max_size {
            self.pop_front();
        }
        self.push_back(value);
    }
}

/// Last `limit` items of a slice-like deque, oldest first
pub fn tail<T: Clone>(items: &VecDeque<T>, limit: usize) -> Vec<T> {
    let skip = items.len().saturating_sub(limit);
    items.iter().skip(skip).cloned().collect()
}
