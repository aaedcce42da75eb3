//! CollaborativeList - replicated ordered list of JSON values.

use crate::model::{ModelInner, Mutation, ObjectCore};
use crate::object::{EventKind, ObjectId, Origin, RealtimeEvent};
use crate::rga_list::{ListEdit, RGAList, RGAListDelta};
use modeldb_core::ListenerId;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

struct ListInner {
    core: ObjectCore,
    list: RwLock<RGAList<Value>>,
}

/// A collaborative list of JSON values.
///
/// Mutations with an index past the end panic, like `Vec`.
#[derive(Clone)]
pub struct CollaborativeList {
    inner: Arc<ListInner>,
    origin: Option<Origin>,
}

impl CollaborativeList {
    pub(crate) fn attach(id: ObjectId, model: Weak<ModelInner>) -> Self {
        let replica_id = model
            .upgrade()
            .map(|m| m.replica_id().to_string())
            .unwrap_or_default();
        Self {
            inner: Arc::new(ListInner {
                core: ObjectCore::new(id, model),
                list: RwLock::new(RGAList::new(replica_id)),
            }),
            origin: None,
        }
    }

    pub(crate) fn seed(&self, values: Vec<Value>) -> RGAListDelta<Value> {
        let mut list = self.inner.list.write();
        list.insert_many(0, values);
        list.take_delta().unwrap_or_default()
    }

    pub(crate) fn integrate_silently(&self, delta: &RGAListDelta<Value>) {
        self.inner.list.write().apply_delta(delta);
    }

    pub(crate) fn model_ref(&self) -> &Weak<ModelInner> {
        &self.inner.core.model
    }

    /// A handle to the same list whose mutations are tagged with `origin`.
    pub fn with_origin(&self, origin: Origin) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            origin: Some(origin),
        }
    }

    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn id(&self) -> &ObjectId {
        &self.inner.core.id
    }

    pub fn same_object(&self, other: &CollaborativeList) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.list.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.list.read().get(index).cloned()
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.list.read().to_vec()
    }

    /// Index of the first element equal to `value`.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.inner.list.read().iter().position(|v| v == value)
    }

    /// Replace the element at `index`, returning the previous value.
    pub fn set(&self, index: usize, value: Value) -> Value {
        let (old, delta) = {
            let mut list = self.inner.list.write();
            check_index(index, list.len());
            let old = list.delete(index).unwrap_or(Value::Null);
            list.insert(index, value.clone());
            (old, list.take_delta())
        };
        self.commit(delta, true);
        self.inner.core.publish(
            EventKind::ValuesSet {
                index,
                old_values: vec![old.clone()],
                new_values: vec![value],
            },
            true,
            self.origin,
        );
        old
    }

    pub fn insert(&self, index: usize, value: Value) {
        self.insert_all(index, vec![value]);
    }

    /// Insert `values` starting at `index`. An empty batch does nothing.
    pub fn insert_all(&self, index: usize, values: Vec<Value>) {
        if values.is_empty() {
            return;
        }
        let delta = {
            let mut list = self.inner.list.write();
            check_insert_index(index, list.len());
            list.insert_many(index, values.iter().cloned());
            list.take_delta()
        };
        self.commit(delta, false);
        self.inner
            .core
            .publish(EventKind::ValuesAdded { index, values }, true, self.origin);
    }

    pub fn push(&self, value: Value) {
        self.push_all(vec![value]);
    }

    pub fn push_all(&self, values: Vec<Value>) {
        let len = self.len();
        self.insert_all(len, values);
    }

    /// Remove and return the element at `index`.
    pub fn remove(&self, index: usize) -> Value {
        let mut removed = self.remove_range(index, index + 1);
        removed.pop().unwrap_or(Value::Null)
    }

    /// Remove the elements in `start..end`.
    pub fn remove_range(&self, start: usize, end: usize) -> Vec<Value> {
        let (removed, delta) = {
            let mut list = self.inner.list.write();
            let len = list.len();
            if start > end || end > len {
                panic!("range {start}..{end} out of bounds for list of length {len}");
            }
            if start == end {
                return Vec::new();
            }
            let removed = list.delete_range(start, end);
            (removed, list.take_delta())
        };
        self.commit(delta, false);
        self.inner.core.publish(
            EventKind::ValuesRemoved {
                index: start,
                values: removed.clone(),
            },
            true,
            self.origin,
        );
        removed
    }

    /// Remove every element.
    pub fn clear(&self) -> Vec<Value> {
        let len = self.len();
        self.remove_range(0, len)
    }

    /// Move the element at `from` so that it lands before the element that
    /// was at `to` prior to the move.
    pub fn move_to(&self, from: usize, to: usize) {
        let (value, landed, delta) = {
            let mut list = self.inner.list.write();
            let len = list.len();
            check_index(from, len);
            if to > len {
                panic!("move target {to} out of bounds for list of length {len}");
            }
            let landed = if to > from { to - 1 } else { to };
            if landed == from {
                return;
            }
            let value = list.get(from).cloned().unwrap_or(Value::Null);
            list.move_element(from, to);
            (value, landed, list.take_delta())
        };
        self.commit(delta, false);
        self.inner.core.publish(
            EventKind::ValuesRemoved {
                index: from,
                values: vec![value.clone()],
            },
            true,
            self.origin,
        );
        self.inner.core.publish(
            EventKind::ValuesAdded {
                index: landed,
                values: vec![value],
            },
            true,
            self.origin,
        );
    }

    pub fn add_event_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.core.events.connect(listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.core.events.disconnect(id)
    }

    pub fn remove_all_event_listeners(&self) {
        self.inner.core.events.clear();
    }

    fn commit(&self, delta: Option<RGAListDelta<Value>>, replace: bool) {
        if let Some(delta) = delta {
            self.inner.core.record(Mutation::List {
                id: self.id().clone(),
                delta,
                replace,
            });
        }
    }

    pub(crate) fn apply_remote(&self, delta: &RGAListDelta<Value>, replace: bool) {
        let edits = self.inner.list.write().apply_delta_indexed(delta);
        for kind in coalesce(edits, replace) {
            self.inner.core.publish(kind, false, None);
        }
    }
}

fn check_index(index: usize, len: usize) {
    if index >= len {
        panic!("index {index} out of bounds for list of length {len}");
    }
}

fn check_insert_index(index: usize, len: usize) {
    if index > len {
        panic!("insertion index {index} out of bounds for list of length {len}");
    }
}

/// Turn per-element edits into list events. A replacement that survived
/// intact becomes a single `ValuesSet`.
fn coalesce(edits: Vec<ListEdit<Value>>, replace: bool) -> Vec<EventKind> {
    if replace {
        if let [ListEdit::Deleted { index: at, value: old }, ListEdit::Inserted { index, value }] =
            edits.as_slice()
        {
            if at == index {
                return vec![EventKind::ValuesSet {
                    index: *index,
                    old_values: vec![old.clone()],
                    new_values: vec![value.clone()],
                }];
            }
        }
    }

    let mut events: Vec<EventKind> = Vec::new();
    for edit in edits {
        let merged = match (events.last_mut(), &edit) {
            (
                Some(EventKind::ValuesRemoved { index, values }),
                ListEdit::Deleted { index: at, value },
            ) if *index == *at => {
                values.push(value.clone());
                true
            }
            (
                Some(EventKind::ValuesAdded { index, values }),
                ListEdit::Inserted { index: at, value },
            ) if *index + values.len() == *at => {
                values.push(value.clone());
                true
            }
            _ => false,
        };
        if merged {
            continue;
        }
        events.push(match edit {
            ListEdit::Deleted { index, value } => EventKind::ValuesRemoved {
                index,
                values: vec![value],
            },
            ListEdit::Inserted { index, value } => EventKind::ValuesAdded {
                index,
                values: vec![value],
            },
        });
    }
    events
}

impl fmt::Debug for CollaborativeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollaborativeList")
            .field("id", self.id())
            .field("values", &self.to_vec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Model;
    use crate::object::{EventKind, RealtimeEvent, RemoteObject};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn record(list: &super::CollaborativeList) -> Arc<Mutex<Vec<RealtimeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        list.add_event_listener(move |event| e.lock().push(event.clone()));
        events
    }

    fn replicate(a: &Model, b: &Model) {
        for m in a.take_pending() {
            b.apply_remote(&m).unwrap();
        }
    }

    fn replica_of(model: &Model, list: &super::CollaborativeList) -> super::CollaborativeList {
        match model.get_object(list.id()) {
            Some(RemoteObject::List(l)) => l,
            other => panic!("expected list, found {other:?}"),
        }
    }

    #[test]
    fn test_batch_insert_is_one_event() {
        let model = Model::new();
        let list = model.create_list(vec![json!("a")]);
        let events = record(&list);

        list.insert_all(1, vec![json!("b"), json!("c")]);
        list.insert_all(0, vec![]);

        assert_eq!(list.to_vec(), vec![json!("a"), json!("b"), json!("c")]);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::ValuesAdded {
                index: 1,
                values: vec![json!("b"), json!("c")]
            }
        );
    }

    #[test]
    fn test_move_uses_pre_removal_target() {
        let model = Model::new();
        let list = model.create_list(vec![json!("A"), json!("B"), json!("C"), json!("D")]);

        list.move_to(0, 3);
        assert_eq!(
            list.to_vec(),
            vec![json!("B"), json!("C"), json!("A"), json!("D")]
        );

        list.move_to(2, 0);
        assert_eq!(
            list.to_vec(),
            vec![json!("A"), json!("B"), json!("C"), json!("D")]
        );
    }

    #[test]
    fn test_remote_set_arrives_as_set() {
        let a = Model::new();
        let b = Model::new();
        let list = a.create_list(vec![json!(1), json!(2)]);
        replicate(&a, &b);
        let replica = replica_of(&b, &list);
        let events = record(&replica);

        list.set(1, json!(20));
        replicate(&a, &b);

        assert_eq!(replica.to_vec(), vec![json!(1), json!(20)]);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_local);
        assert_eq!(
            events[0].kind,
            EventKind::ValuesSet {
                index: 1,
                old_values: vec![json!(2)],
                new_values: vec![json!(20)]
            }
        );
    }

    #[test]
    fn test_remote_range_removal_coalesces() {
        let a = Model::new();
        let b = Model::new();
        let list = a.create_list(vec![json!(1), json!(2), json!(3), json!(4)]);
        replicate(&a, &b);
        let replica = replica_of(&b, &list);
        let events = record(&replica);

        list.remove_range(1, 3);
        replicate(&a, &b);

        assert_eq!(replica.to_vec(), vec![json!(1), json!(4)]);
        assert_eq!(
            events.lock()[0].kind,
            EventKind::ValuesRemoved {
                index: 1,
                values: vec![json!(2), json!(3)]
            }
        );
    }

    #[test]
    fn test_concurrent_front_inserts_converge() {
        let a = Model::new();
        let b = Model::new();
        let list = a.create_list(vec![]);
        replicate(&a, &b);
        let replica = replica_of(&b, &list);

        list.insert(0, json!("a"));
        replica.insert(0, json!("b"));
        replicate(&a, &b);
        replicate(&b, &a);

        assert_eq!(list.to_vec(), replica.to_vec());
        assert_eq!(list.len(), 2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_set_past_end_panics() {
        let model = Model::new();
        let list = model.create_list(vec![]);
        list.set(0, json!(1));
    }
}
