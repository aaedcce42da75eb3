//! Change arguments carried by observable containers.
//!
//! Every container emits exactly one of these per logical mutation,
//! whether the mutation was made locally or arrived from a collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a vector mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorChangeType {
    Add,
    Remove,
    Set,
    Move,
}

/// A change to an ordered sequence.
///
/// `old_index` is the position the affected values occupied before the
/// change and `new_index` the position they occupy after it. Either is
/// `None` when not applicable (`Add` has no old position, `Remove` no new one).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorChange<T> {
    pub kind: VectorChangeType,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
    pub old_values: Vec<T>,
    pub new_values: Vec<T>,
}

impl<T> VectorChange<T> {
    /// Values inserted at `index`.
    pub fn add(index: usize, values: Vec<T>) -> Self {
        Self {
            kind: VectorChangeType::Add,
            old_index: None,
            new_index: Some(index),
            old_values: Vec::new(),
            new_values: values,
        }
    }

    /// Values removed starting at `index`.
    pub fn remove(index: usize, values: Vec<T>) -> Self {
        Self {
            kind: VectorChangeType::Remove,
            old_index: Some(index),
            new_index: None,
            old_values: values,
            new_values: Vec::new(),
        }
    }

    /// Values replaced in place starting at `index`.
    pub fn set(index: usize, old_values: Vec<T>, new_values: Vec<T>) -> Self {
        Self {
            kind: VectorChangeType::Set,
            old_index: Some(index),
            new_index: Some(index),
            old_values,
            new_values,
        }
    }

    /// One value relocated from `from` to `to`.
    pub fn moved(from: usize, to: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self {
            kind: VectorChangeType::Move,
            old_index: Some(from),
            new_index: Some(to),
            old_values: vec![value.clone()],
            new_values: vec![value],
        }
    }
}

/// Kind of a map mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapChangeType {
    Add,
    Remove,
    Change,
}

/// A change to one key of an associative container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapChange<T> {
    pub kind: MapChangeType,
    pub key: String,
    pub old_value: Option<T>,
    pub new_value: Option<T>,
}

impl<T> MapChange<T> {
    /// Build a change from the before/after state of `key`.
    ///
    /// Returns `None` when the key was absent both before and after.
    pub fn between(key: impl Into<String>, old_value: Option<T>, new_value: Option<T>) -> Option<Self> {
        let kind = match (&old_value, &new_value) {
            (None, None) => return None,
            (None, Some(_)) => MapChangeType::Add,
            (Some(_), None) => MapChangeType::Remove,
            (Some(_), Some(_)) => MapChangeType::Change,
        };
        Some(Self {
            kind,
            key: key.into(),
            old_value,
            new_value,
        })
    }
}

/// Kind of a text mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringChangeType {
    Insert,
    Remove,
    Set,
}

/// A change to a text buffer. Positions count chars, not bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringChange {
    pub kind: StringChangeType,
    pub start: usize,
    pub end: usize,
    /// Inserted text for `Insert`/`Set`, removed text for `Remove`.
    pub value: String,
}

impl StringChange {
    pub fn insert(start: usize, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: StringChangeType::Insert,
            start,
            end: start + value.chars().count(),
            value,
        }
    }

    pub fn remove(start: usize, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: StringChangeType::Remove,
            start,
            end: start + value.chars().count(),
            value,
        }
    }

    pub fn set(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: StringChangeType::Set,
            start: 0,
            end: value.chars().count(),
            value,
        }
    }
}

/// A change to a single-value box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub old_value: Value,
    pub new_value: Value,
}
