//! Replicated text, the storage behind [`CollaborativeString`]. Positions
//! count chars.
//!
//! [`CollaborativeString`]: crate::string::CollaborativeString

use crate::sequence::{Edit, ElementId, Sequence, SequenceDelta};
use std::fmt;

pub type TextId = ElementId;
pub type RGATextDelta = SequenceDelta<char>;
pub type TextEdit = Edit<char>;

#[derive(Clone, Debug)]
pub struct RGAText {
    chars: Sequence<char>,
}

impl RGAText {
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self {
            chars: Sequence::new(replica_id),
        }
    }

    pub fn replica_id(&self) -> &str {
        self.chars.replica_id()
    }

    /// Insert `text` so that its first char lands at `position`.
    pub fn insert(&mut self, position: usize, text: &str) {
        self.chars.insert_run(position, text.chars());
    }

    /// Delete up to `length` chars starting at `start`.
    pub fn delete(&mut self, start: usize, length: usize) {
        self.chars.remove_range(start, start.saturating_add(length));
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The chars in `start..end`, clamped to the text.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.iter().skip(start).take(end.saturating_sub(start)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.chars.iter().copied()
    }

    pub fn id_to_position(&self, id: &TextId) -> Option<usize> {
        self.chars.position(id)
    }

    pub fn take_delta(&mut self) -> Option<RGATextDelta> {
        self.chars.take_delta()
    }

    pub fn apply_delta(&mut self, delta: &RGATextDelta) {
        self.chars.integrate(delta);
    }

    /// Integrate `delta`, returning one edit per char that appeared or
    /// vanished.
    pub fn apply_delta_indexed(&mut self, delta: &RGATextDelta) -> Vec<TextEdit> {
        self.chars.integrate(delta)
    }
}

impl fmt::Display for RGAText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.iter().try_for_each(|ch| fmt::Write::write_char(f, ch))
    }
}

impl PartialEq for RGAText {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for RGAText {}

impl Default for RGAText {
    fn default() -> Self {
        Self::new("")
    }
}
