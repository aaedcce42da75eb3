//! RemoteVector - observable ordered sequence over a collaborative list.

use super::{json_eq, wrong_kind, Comparator, Synchronizable};
use crate::error::Result;
use modeldb_core::{ChangeSignal, Disposable, ListenerId, VectorChange};
use modeldb_realtime::{
    CollaborativeList, EventKind, ObjectKind, Origin, RealtimeEvent, RemoteObject,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct VectorInner {
    origin: Origin,
    list: RwLock<CollaborativeList>,
    subscription: Mutex<Option<ListenerId>>,
    changed: ChangeSignal<VectorChange<Value>>,
    comparator: RwLock<Comparator>,
    disposed: AtomicBool,
}

impl VectorInner {
    fn on_event(&self, event: &RealtimeEvent) {
        if event.is_echo_of(self.origin) {
            return;
        }
        let change = match &event.kind {
            EventKind::ValuesAdded { index, values } => VectorChange::add(*index, values.clone()),
            EventKind::ValuesRemoved { index, values } => {
                VectorChange::remove(*index, values.clone())
            }
            EventKind::ValuesSet {
                index,
                old_values,
                new_values,
            } => VectorChange::set(*index, old_values.clone(), new_values.clone()),
            _ => return,
        };
        self.changed.emit(&change);
    }
}

/// An observable vector of JSON values kept in a collaborative list.
///
/// Index arguments past the end panic, like `Vec`; reads return `None`.
#[derive(Clone)]
pub struct RemoteVector {
    inner: Arc<VectorInner>,
}

impl RemoteVector {
    /// Wrap `list`.
    pub fn new(list: CollaborativeList) -> Self {
        let origin = Origin::next();
        let inner = Arc::new(VectorInner {
            origin,
            list: RwLock::new(list.with_origin(origin)),
            subscription: Mutex::new(None),
            changed: ChangeSignal::new(),
            comparator: RwLock::new(json_eq()),
            disposed: AtomicBool::new(false),
        });
        attach(&inner);
        Self { inner }
    }

    /// Notification stream; one change per logical mutation.
    pub fn changed(&self) -> &ChangeSignal<VectorChange<Value>> {
        &self.inner.changed
    }

    /// Tag carried by mutations made through this adapter.
    pub fn origin(&self) -> Origin {
        self.inner.origin
    }

    /// Replace the item comparator.
    pub fn set_comparator<F>(&self, comparator: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        *self.inner.comparator.write() = Arc::new(comparator);
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.list().get(index)
    }

    pub fn front(&self) -> Option<Value> {
        self.get(0)
    }

    pub fn back(&self) -> Option<Value> {
        let len = self.len();
        len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Replace the value at `index`. Comparator-equal values are ignored.
    pub fn set(&self, index: usize, value: Value) {
        let list = self.list();
        let old = match list.get(index) {
            Some(old) => old,
            None => panic!("index {index} out of bounds for vector of length {}", list.len()),
        };
        if (self.comparator())(&old, &value) {
            return;
        }
        list.set(index, value.clone());
        self.inner
            .changed
            .emit(&VectorChange::set(index, vec![old], vec![value]));
    }

    pub fn push_back(&self, value: Value) {
        self.push_all(vec![value]);
    }

    pub fn insert(&self, index: usize, value: Value) {
        self.insert_all(index, vec![value]);
    }

    pub fn push_all(&self, values: Vec<Value>) {
        let len = self.len();
        self.insert_all(len, values);
    }

    /// Insert a batch at `index`, announced as a single change.
    pub fn insert_all(&self, index: usize, values: Vec<Value>) {
        if values.is_empty() {
            return;
        }
        let list = self.list();
        let len = list.len();
        if index > len {
            panic!("insertion index {index} out of bounds for vector of length {len}");
        }
        list.insert_all(index, values.clone());
        self.inner.changed.emit(&VectorChange::add(index, values));
    }

    pub fn pop_back(&self) -> Option<Value> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        Some(self.remove_at(len - 1))
    }

    pub fn remove_at(&self, index: usize) -> Value {
        let mut removed = self.remove_range(index, index + 1);
        removed.pop().unwrap_or(Value::Null)
    }

    /// Remove `start..end`, announced as a single change.
    pub fn remove_range(&self, start: usize, end: usize) -> Vec<Value> {
        let list = self.list();
        let len = list.len();
        if start > end || end > len {
            panic!("range {start}..{end} out of bounds for vector of length {len}");
        }
        if start == end {
            return Vec::new();
        }
        let removed = list.remove_range(start, end);
        self.inner
            .changed
            .emit(&VectorChange::remove(start, removed.clone()));
        removed
    }

    /// Remove the first comparator-equal value, returning its index.
    pub fn remove(&self, value: &Value) -> Option<usize> {
        let index = self.position(value)?;
        self.remove_at(index);
        Some(index)
    }

    /// Index of the first comparator-equal value.
    pub fn position(&self, value: &Value) -> Option<usize> {
        let comparator = self.comparator();
        self.to_vec().iter().position(|v| comparator(v, value))
    }

    pub fn clear(&self) {
        let list = self.list();
        if list.is_empty() {
            return;
        }
        let removed = list.clear();
        self.inner.changed.emit(&VectorChange::remove(0, removed));
    }

    /// Move the value at `from` so it ends up at `to`.
    pub fn move_item(&self, from: usize, to: usize) {
        let list = self.list();
        let len = list.len();
        if len <= 1 || from == to {
            return;
        }
        if from >= len || to >= len {
            panic!("move {from} -> {to} out of bounds for vector of length {len}");
        }
        let value = list.get(from).unwrap_or(Value::Null);
        // The list reads the target against the array before removal.
        let target = if to > from { to + 1 } else { to };
        list.move_to(from, target);
        self.inner
            .changed
            .emit(&VectorChange::moved(from, to, value));
    }

    /// Snapshot iterator over the current contents.
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.list().to_vec()
    }

    fn list(&self) -> CollaborativeList {
        self.inner.list.read().clone()
    }

    fn comparator(&self) -> Comparator {
        self.inner.comparator.read().clone()
    }
}

fn attach(inner: &Arc<VectorInner>) {
    let weak = Arc::downgrade(inner);
    let id = inner.list.read().add_event_listener(move |event| {
        if let Some(inner) = weak.upgrade() {
            inner.on_event(event);
        }
    });
    *inner.subscription.lock() = Some(id);
}

fn detach(inner: &VectorInner) {
    if let Some(id) = inner.subscription.lock().take() {
        inner.list.read().remove_event_listener(id);
    }
}

impl Synchronizable for RemoteVector {
    fn kind(&self) -> ObjectKind {
        ObjectKind::List
    }

    fn remote_object(&self) -> RemoteObject {
        RemoteObject::List(self.list())
    }

    fn rebind(&self, object: RemoteObject) -> Result<()> {
        let list = match object {
            RemoteObject::List(list) => list.with_origin(self.inner.origin),
            other => return Err(wrong_kind(ObjectKind::List, &other).into()),
        };
        if self.is_disposed() || list.same_object(&self.list()) {
            return Ok(());
        }
        let ours = self.to_vec();
        detach(&self.inner);
        let contributed = list.to_vec();
        list.push_all(ours);
        *self.inner.list.write() = list;
        attach(&self.inner);
        if !contributed.is_empty() {
            self.inner
                .changed
                .emit(&VectorChange::add(0, contributed));
        }
        Ok(())
    }
}

impl Disposable for RemoteVector {
    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        detach(&self.inner);
        self.inner.changed.clear();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl IntoIterator for &RemoteVector {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for RemoteVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteVector")
            .field("origin", &self.inner.origin)
            .field("values", &self.to_vec())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeldb_core::VectorChangeType;
    use modeldb_realtime::Model;
    use serde_json::json;

    fn recorded(vector: &RemoteVector) -> Arc<Mutex<Vec<VectorChange<Value>>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = changes.clone();
        vector.changed().connect(move |change| c.lock().push(change.clone()));
        changes
    }

    fn letters() -> (Model, RemoteVector) {
        let model = Model::new();
        let list = model.create_list(vec![json!("A"), json!("B"), json!("C"), json!("D")]);
        (model, RemoteVector::new(list))
    }

    #[test]
    fn test_local_mutation_emits_once() {
        let (_model, vector) = letters();
        let changes = recorded(&vector);

        vector.push_back(json!("E"));

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0], VectorChange::add(4, vec![json!("E")]));
    }

    #[test]
    fn test_other_handle_edits_are_translated() {
        let (model, vector) = letters();
        let changes = recorded(&vector);
        let raw = match vector.remote_object() {
            RemoteObject::List(l) => l,
            _ => unreachable!(),
        };
        let untagged = model.get_object(raw.id()).unwrap();

        if let RemoteObject::List(list) = untagged {
            list.remove(0);
        }

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, VectorChangeType::Remove);
        assert_eq!(changes[0].old_index, Some(0));
        assert_eq!(changes[0].new_index, None);
    }

    #[test]
    fn test_batch_is_one_change() {
        let (_model, vector) = letters();
        let changes = recorded(&vector);

        vector.insert_all(1, vec![json!(1), json!(2), json!(3)]);
        vector.push_all(Vec::new());

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new_index, Some(1));
        assert_eq!(changes[0].new_values.len(), 3);
        assert_eq!(vector.len(), 7);
    }

    #[test]
    fn test_move_item_forward_and_back() {
        let (_model, vector) = letters();
        vector.move_item(0, 2);
        assert_eq!(
            vector.to_vec(),
            vec![json!("B"), json!("C"), json!("A"), json!("D")]
        );

        let (_model, vector) = letters();
        let changes = recorded(&vector);
        vector.move_item(2, 0);
        assert_eq!(
            vector.to_vec(),
            vec![json!("C"), json!("A"), json!("B"), json!("D")]
        );
        assert_eq!(changes.lock()[0], VectorChange::moved(2, 0, json!("C")));
    }

    #[test]
    fn test_move_item_noops() {
        let model = Model::new();
        let vector = RemoteVector::new(model.create_list(vec![json!(1)]));
        let changes = recorded(&vector);
        vector.move_item(0, 0);
        vector.move_item(0, 5);
        assert!(changes.lock().is_empty());
    }

    #[test]
    fn test_set_equal_value_is_noop() {
        let (model, vector) = letters();
        model.take_pending();
        let changes = recorded(&vector);

        vector.set(1, json!("B"));

        assert!(changes.lock().is_empty());
        assert!(!model.has_pending());
    }

    #[test]
    fn test_clear_then_empty() {
        let (_model, vector) = letters();
        let changes = recorded(&vector);

        vector.clear();
        vector.clear();

        assert!(vector.is_empty());
        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_index, Some(0));
        assert_eq!(changes[0].old_values.len(), 4);
    }

    #[test]
    fn test_remove_by_value() {
        let (_model, vector) = letters();
        vector.push_back(json!("B"));

        assert_eq!(vector.remove(&json!("B")), Some(1));
        assert_eq!(vector.get(3), Some(json!("B")));
        assert_eq!(vector.remove(&json!("Z")), None);
    }

    #[test]
    fn test_custom_comparator() {
        let model = Model::new();
        let vector = RemoteVector::new(model.create_list(vec![json!({"id": 1, "n": "a"})]));
        vector.set_comparator(|a, b| a["id"] == b["id"]);
        let changes = recorded(&vector);

        vector.set(0, json!({"id": 1, "n": "b"}));
        assert!(changes.lock().is_empty());
        assert_eq!(vector.remove(&json!({"id": 1})), Some(0));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (_model, vector) = letters();
        let changes = recorded(&vector);

        vector.dispose();
        vector.dispose();
        vector.push_back(json!("E"));

        assert!(vector.is_disposed());
        assert!(vector.changed().is_empty());
        assert!(changes.lock().is_empty());
    }

    #[test]
    fn test_rebind_appends_and_reports_contribution() {
        let placeholder = Model::new();
        let vector = RemoteVector::new(placeholder.create_list(vec![json!("local")]));
        let changes = recorded(&vector);

        let real = Model::new();
        let server = real.create_list(vec![json!("server")]);
        vector.rebind(RemoteObject::List(server.clone())).unwrap();

        assert_eq!(server.to_vec(), vec![json!("server"), json!("local")]);
        assert_eq!(
            changes.lock().as_slice(),
            &[VectorChange::add(0, vec![json!("server")])]
        );

        server.push(json!("later"));
        assert_eq!(changes.lock().len(), 2);
    }

    #[test]
    fn test_rebind_rejects_wrong_kind() {
        let (model, vector) = letters();
        let err = vector
            .rebind(RemoteObject::Map(model.create_map()))
            .unwrap_err();
        assert!(matches!(err, crate::ModelDbError::Realtime(_)));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_set_past_end_panics() {
        let (_model, vector) = letters();
        vector.set(10, json!(1));
    }
}
