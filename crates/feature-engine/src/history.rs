//! Classification History and Majority-Vote Smoothing

use classifier::ModType;
use std::collections::VecDeque;

/// Bounded FIFO of the most recent classifier outputs
#[derive(Debug, Clone)]
pub struct ModTypeHistory {
    labels: VecDeque<ModType>,
    capacity: usize,
}

impl ModTypeHistory {
    /// Create a history of at most `capacity` labels (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a label, evicting the oldest when full
    pub fn push(&mut self, label: ModType) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    /// Most frequent label; ties go to the first-declared `ModType`
    pub fn majority(&self) -> Option<ModType> {
        ModType::majority(self.labels.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.labels.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Labels oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ModType> {
        self.labels.iter()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }
}
