//! Last-Write-Wins (LWW) Register
//!
//! The LWW Register always retains the write with the highest timestamp.
//! In case of a tie, the replica with the highest ID wins.
//!
//! Collaborative maps keep one register per key; a removed key is a
//! register holding `None` so that a stale write cannot resurrect it.

use serde::{Deserialize, Serialize};

/// A Last-Write-Wins Register.
///
/// Stores an optional value along with a Lamport timestamp and the
/// replica ID that wrote it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LWWRegister<T: Clone> {
    /// The current value (None once removed)
    value: Option<T>,
    /// The timestamp of the last write
    timestamp: u64,
    /// The replica ID that wrote this value (for tie-breaking)
    replica_id: String,
}

impl<T: Clone> LWWRegister<T> {
    /// Create a register holding a single write.
    pub fn new(value: Option<T>, timestamp: u64, replica_id: impl Into<String>) -> Self {
        Self {
            value,
            timestamp,
            replica_id: replica_id.into(),
        }
    }

    /// True if a write stamped `(timestamp, replica_id)` supersedes this one.
    pub fn is_superseded_by(&self, timestamp: u64, replica_id: &str) -> bool {
        timestamp > self.timestamp
            || (timestamp == self.timestamp && replica_id >= self.replica_id.as_str())
    }

    /// Merge another write into this register. Returns true if it won.
    pub fn merge(&mut self, other: &LWWRegister<T>) -> bool {
        if self.is_superseded_by(other.timestamp, &other.replica_id) {
            self.value = other.value.clone();
            self.timestamp = other.timestamp;
            self.replica_id = other.replica_id.clone();
            true
        } else {
            false
        }
    }

    /// Get the current value if it exists
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Get the timestamp of the current value
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Get the replica ID that wrote the current value
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Check if the register is empty (no value set)
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_timestamp_wins() {
        let mut reg = LWWRegister::new(Some(1), 1, "a");
        assert!(reg.merge(&LWWRegister::new(Some(2), 2, "a")));
        assert_eq!(reg.get(), Some(&2));

        assert!(!reg.merge(&LWWRegister::new(Some(3), 1, "z")));
        assert_eq!(reg.get(), Some(&2));
    }

    #[test]
    fn test_tie_breaks_on_replica() {
        let mut reg = LWWRegister::new(Some("a"), 5, "replica_a");
        assert!(reg.merge(&LWWRegister::new(Some("b"), 5, "replica_b")));
        assert_eq!(reg.get(), Some(&"b"));
        assert_eq!(reg.replica_id(), "replica_b");
    }

    #[test]
    fn test_tombstone_blocks_stale_write() {
        let mut reg = LWWRegister::new(None::<i32>, 4, "a");
        assert!(reg.is_empty());
        assert!(!reg.merge(&LWWRegister::new(Some(9), 3, "b")));
        assert!(reg.is_empty());
        assert_eq!(reg.timestamp(), 4);
    }
}
