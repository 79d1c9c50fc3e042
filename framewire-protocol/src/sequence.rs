//! Correlation id generator.

use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonically increasing sequence id source.
///
/// Ids are unique within one process lifetime only. The counter wraps
/// after `u32::MAX`.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU32,
}

impl SequenceGenerator {
    /// Creates a generator whose first id is 1.
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a generator whose first id is `first`.
    pub const fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: SequenceGenerator = SequenceGenerator::new();

/// Mints an id from the process-wide generator.
pub fn next_sequence_id() -> u32 {
    GLOBAL.next_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_increase() {
        let gen = SequenceGenerator::new();
        assert_eq!(gen.next_id(), 1);
        assert_eq!(gen.next_id(), 2);
        assert_eq!(gen.next_id(), 3);
    }

    #[test]
    fn test_wraps_at_max() {
        let gen = SequenceGenerator::starting_at(u32::MAX);
        assert_eq!(gen.next_id(), u32::MAX);
        assert_eq!(gen.next_id(), 0);
    }

    #[test]
    fn test_global_ids_are_distinct() {
        let a = next_sequence_id();
        let b = next_sequence_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let gen = Arc::new(SequenceGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..1000).map(|_| gen.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}
