//! Replicated sequence shared by collaborative lists and strings.
//!
//! Elements are kept in a flat vector in document order, deleted ones as
//! tombstones. Every element records the element it was inserted after.
//! Concurrent inserts after the same element are ordered by descending
//! [`ElementId`], and ids follow a Lamport clock, so an element always
//! outranks the one it follows and a single left-to-right scan finds the
//! place of a new element.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Identity of one element: the replica that created it and that
/// replica's Lamport counter at the time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId {
    pub seq: u64,
    pub replica: String,
}

impl ElementId {
    pub fn new(replica: impl Into<String>, seq: u64) -> Self {
        Self {
            seq,
            replica: replica.into(),
        }
    }

    /// The virtual element every sequence starts after.
    pub fn head() -> Self {
        Self::new("", 0)
    }

    pub fn is_head(&self) -> bool {
        self.seq == 0 && self.replica.is_empty()
    }
}

impl Ord for ElementId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq
            .cmp(&other.seq)
            .then_with(|| self.replica.cmp(&other.replica))
    }
}

impl PartialOrd for ElementId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An element as it travels between replicas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element<T> {
    pub id: ElementId,
    pub after: ElementId,
    pub value: T,
}

/// Local changes not yet sent to other replicas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceDelta<T> {
    pub inserts: Vec<Element<T>>,
    pub deletes: Vec<ElementId>,
}

impl<T> SequenceDelta<T> {
    pub fn new() -> Self {
        Self {
            inserts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }
}

impl<T> Default for SequenceDelta<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A change in the visible content caused by integrating remote elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit<T> {
    /// `value` became visible at `index`.
    Inserted { index: usize, value: T },
    /// `value`, visible at `index` until now, was removed.
    Deleted { index: usize, value: T },
}

#[derive(Clone, Debug)]
struct Slot<T> {
    id: ElementId,
    /// `None` once deleted.
    value: Option<T>,
}

#[derive(Clone, Debug)]
pub struct Sequence<T> {
    replica: String,
    clock: u64,
    slots: Vec<Slot<T>>,
    visible: usize,
    /// Remote elements whose predecessor has not arrived, keyed by it.
    waiting: HashMap<ElementId, Vec<Element<T>>>,
    /// Remote deletes that arrived before the element they delete.
    doomed: HashSet<ElementId>,
    outbox: Option<SequenceDelta<T>>,
}

impl<T: Clone> Sequence<T> {
    pub fn new(replica: impl Into<String>) -> Self {
        Self {
            replica: replica.into(),
            clock: 0,
            slots: Vec::new(),
            visible: 0,
            waiting: HashMap::new(),
            doomed: HashSet::new(),
            outbox: None,
        }
    }

    pub fn replica_id(&self) -> &str {
        &self.replica
    }

    pub fn len(&self) -> usize {
        self.visible
    }

    pub fn is_empty(&self) -> bool {
        self.visible == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    /// Visible index of the element `id`, if it is present and not deleted.
    pub fn position(&self, id: &ElementId) -> Option<usize> {
        let slot = self.slot_of(id)?;
        self.slots[slot].value.as_ref()?;
        Some(self.visible_before(slot))
    }

    /// Id of the element visible at `index`.
    pub fn id_at(&self, index: usize) -> Option<&ElementId> {
        self.slots
            .iter()
            .filter(|slot| slot.value.is_some())
            .nth(index)
            .map(|slot| &slot.id)
    }

    /// The element a value inserted at `index` goes after. Indices past the
    /// end anchor at the last visible element.
    pub fn anchor(&self, index: usize) -> ElementId {
        if index == 0 {
            return ElementId::head();
        }
        self.id_at(index - 1)
            .or_else(|| self.slots.iter().rev().find(|s| s.value.is_some()).map(|s| &s.id))
            .cloned()
            .unwrap_or_else(ElementId::head)
    }

    /// Insert `value` directly after `after` and record it for replication.
    pub fn insert_after(&mut self, after: &ElementId, value: T) -> ElementId {
        self.clock += 1;
        let element = Element {
            id: ElementId::new(self.replica.clone(), self.clock),
            after: after.clone(),
            value,
        };
        let id = element.id.clone();
        self.place(element.clone(), &mut Vec::new());
        self.outbox
            .get_or_insert_with(SequenceDelta::new)
            .inserts
            .push(element);
        id
    }

    /// Insert `values` as a run starting at visible `index`.
    pub fn insert_run(&mut self, index: usize, values: impl IntoIterator<Item = T>) {
        let mut after = self.anchor(index);
        for value in values {
            after = self.insert_after(&after, value);
        }
    }

    /// Delete element `id`, returning its value if it was visible.
    pub fn remove(&mut self, id: &ElementId) -> Option<T> {
        let slot = self.slot_of(id)?;
        let value = self.slots[slot].value.take()?;
        self.visible -= 1;
        self.outbox
            .get_or_insert_with(SequenceDelta::new)
            .deletes
            .push(id.clone());
        Some(value)
    }

    /// Delete the visible elements in `start..end`.
    pub fn remove_range(&mut self, start: usize, end: usize) -> Vec<T> {
        let ids: Vec<ElementId> = self
            .slots
            .iter()
            .filter(|slot| slot.value.is_some())
            .skip(start)
            .take(end.saturating_sub(start))
            .map(|slot| slot.id.clone())
            .collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn take_delta(&mut self) -> Option<SequenceDelta<T>> {
        self.outbox.take()
    }

    /// Integrate another replica's changes and report what became visible
    /// or disappeared.
    ///
    /// Deletes are handled first, each reported at the index the value held
    /// just before its removal. Inserts follow, each reported at the index it
    /// holds right after integration. An element deleted in the same delta
    /// that inserts it never becomes visible.
    pub fn integrate(&mut self, delta: &SequenceDelta<T>) -> Vec<Edit<T>> {
        let mut edits = Vec::new();
        for id in &delta.deletes {
            self.tombstone(id, &mut edits);
        }
        for element in &delta.inserts {
            if !self.knows(&element.id) {
                self.place(element.clone(), &mut edits);
            }
        }
        edits
    }

    fn knows(&self, id: &ElementId) -> bool {
        self.slot_of(id).is_some()
            || self
                .waiting
                .values()
                .any(|elements| elements.iter().any(|e| &e.id == id))
    }

    fn slot_of(&self, id: &ElementId) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.id == id)
    }

    fn visible_before(&self, slot: usize) -> usize {
        self.slots[..slot]
            .iter()
            .filter(|s| s.value.is_some())
            .count()
    }

    fn place(&mut self, element: Element<T>, edits: &mut Vec<Edit<T>>) {
        self.clock = self.clock.max(element.id.seq);

        let mut at = if element.after.is_head() {
            0
        } else {
            match self.slot_of(&element.after) {
                Some(slot) => slot + 1,
                None => {
                    self.waiting
                        .entry(element.after.clone())
                        .or_default()
                        .push(element);
                    return;
                }
            }
        };
        // Skip newer siblings together with everything that follows them.
        while at < self.slots.len() && self.slots[at].id > element.id {
            at += 1;
        }

        let Element { id, value, .. } = element;
        let value = if self.doomed.remove(&id) {
            None
        } else {
            edits.push(Edit::Inserted {
                index: self.visible_before(at),
                value: value.clone(),
            });
            self.visible += 1;
            Some(value)
        };
        self.slots.insert(at, Slot { id: id.clone(), value });

        if let Some(followers) = self.waiting.remove(&id) {
            for follower in followers {
                self.place(follower, edits);
            }
        }
    }

    fn tombstone(&mut self, id: &ElementId, edits: &mut Vec<Edit<T>>) {
        let Some(slot) = self.slot_of(id) else {
            self.doomed.insert(id.clone());
            return;
        };
        if let Some(value) = self.slots[slot].value.take() {
            self.visible -= 1;
            edits.push(Edit::Deleted {
                index: self.visible_before(slot),
                value,
            });
        }
    }
}
