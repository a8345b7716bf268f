//! Feature flag evaluations attached to events and spans.

use std::collections::VecDeque;

use crate::protocol::{FlagEvaluation, FlagsContext};

/// The default number of evaluations a scope keeps.
pub const DEFAULT_MAX_FLAGS: usize = 100;

/// The number of evaluations recorded as attributes of a single span.
pub const MAX_FLAGS_PER_SPAN: usize = 10;

/// The prefix of span attributes carrying flag evaluations.
pub const SPAN_FLAG_ATTRIBUTE_PREFIX: &str = "flag.evaluation.";

/// A bounded FIFO of feature flag evaluations.
///
/// Inserting a new flag into a full buffer evicts the oldest evaluation.
/// Re-evaluating a flag that is already buffered updates its result in
/// place and keeps its position.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureFlagBuffer {
    capacity: usize,
    flags: VecDeque<FlagEvaluation>,
}

impl Default for FeatureFlagBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FLAGS)
    }
}

impl FeatureFlagBuffer {
    /// Creates an empty buffer holding at most `capacity` flags.
    pub fn new(capacity: usize) -> Self {
        FeatureFlagBuffer {
            capacity,
            flags: VecDeque::new(),
        }
    }

    /// The maximum number of flags kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, evicting the oldest flags if necessary.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.flags.len() > capacity {
            self.flags.pop_front();
        }
    }

    /// Records the result of evaluating `flag`.
    pub fn insert(&mut self, flag: &str, result: bool) {
        if let Some(existing) = self.flags.iter_mut().find(|f| f.flag == flag) {
            existing.result = result;
            return;
        }
        if self.capacity == 0 {
            return;
        }
        if self.flags.len() >= self.capacity {
            self.flags.pop_front();
        }
        self.flags.push_back(FlagEvaluation {
            flag: flag.to_owned(),
            result,
        });
    }

    /// Merges all evaluations of `other` into this buffer, oldest first.
    pub fn extend_from(&mut self, other: &FeatureFlagBuffer) {
        for flag in &other.flags {
            self.insert(&flag.flag, flag.result);
        }
    }

    /// Iterates over the evaluations, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FlagEvaluation> {
        self.flags.iter()
    }

    /// The number of buffered evaluations.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` if nothing was evaluated yet.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// The `flags` context sent with events.
    pub fn to_context(&self) -> FlagsContext {
        FlagsContext {
            values: self.flags.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(buffer: &FeatureFlagBuffer) -> Vec<(&str, bool)> {
        buffer.iter().map(|f| (f.flag.as_str(), f.result)).collect()
    }

    #[test]
    fn test_evicts_oldest() {
        let mut buffer = FeatureFlagBuffer::new(3);
        buffer.insert("a", true);
        buffer.insert("b", false);
        buffer.insert("c", true);
        buffer.insert("d", true);
        assert_eq!(names(&buffer), [("b", false), ("c", true), ("d", true)]);
    }

    #[test]
    fn test_updates_in_place() {
        let mut buffer = FeatureFlagBuffer::new(3);
        buffer.insert("a", true);
        buffer.insert("b", false);
        buffer.insert("c", true);
        buffer.insert("a", false);
        assert_eq!(names(&buffer), [("a", false), ("b", false), ("c", true)]);

        // updating does not protect from eviction
        buffer.insert("d", true);
        assert_eq!(names(&buffer), [("b", false), ("c", true), ("d", true)]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut buffer = FeatureFlagBuffer::new(0);
        buffer.insert("a", true);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_shrinking_capacity() {
        let mut buffer = FeatureFlagBuffer::new(5);
        for flag in ["a", "b", "c", "d"] {
            buffer.insert(flag, true);
        }
        buffer.set_capacity(2);
        assert_eq!(names(&buffer), [("c", true), ("d", true)]);
    }

    #[test]
    fn test_context() {
        let mut buffer = FeatureFlagBuffer::default();
        buffer.insert("new-checkout", true);
        assert_eq!(
            serde_json::to_value(buffer.to_context()).unwrap(),
            serde_json::json!({"values": [{"flag": "new-checkout", "result": true}]})
        );
    }
}
