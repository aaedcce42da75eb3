//! UndoableVector - a vector adapter with a linear local undo history.
//!
//! Only mutations made through this handle are recorded; each records its
//! inverse. Operations can be grouped so a compound edit undoes at once.
//! Edits from collaborators are not recorded, and an inverse that no
//! longer fits the current contents is skipped.

use super::{RemoteVector, Synchronizable};
use crate::error::Result;
use modeldb_core::{ChangeSignal, Disposable, VectorChange};
use modeldb_realtime::{CollaborativeList, ObjectKind, RemoteObject};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

const MAX_HISTORY: usize = 100;

/// A recorded vector operation.
#[derive(Clone, Debug, PartialEq)]
pub enum VectorOperation {
    Insert {
        index: usize,
        values: Vec<Value>,
    },
    Remove {
        index: usize,
        values: Vec<Value>,
    },
    Set {
        index: usize,
        old: Value,
        new: Value,
    },
    Move {
        from: usize,
        to: usize,
    },
}

impl VectorOperation {
    /// Create the inverse operation.
    pub fn inverse(&self) -> Self {
        match self {
            VectorOperation::Insert { index, values } => VectorOperation::Remove {
                index: *index,
                values: values.clone(),
            },
            VectorOperation::Remove { index, values } => VectorOperation::Insert {
                index: *index,
                values: values.clone(),
            },
            VectorOperation::Set { index, old, new } => VectorOperation::Set {
                index: *index,
                old: new.clone(),
                new: old.clone(),
            },
            VectorOperation::Move { from, to } => VectorOperation::Move {
                from: *to,
                to: *from,
            },
        }
    }
}

#[derive(Default)]
struct History {
    undo_stack: Vec<Vec<VectorOperation>>,
    redo_stack: Vec<Vec<VectorOperation>>,
    /// Group being built.
    current_group: Option<Vec<VectorOperation>>,
    depth: usize,
}

impl History {
    fn record(&mut self, operation: VectorOperation) {
        match &mut self.current_group {
            Some(group) => group.push(operation),
            None => {
                self.undo_stack.push(vec![operation]);
                self.trim();
            }
        }
        self.redo_stack.clear();
    }

    fn trim(&mut self) {
        if self.undo_stack.len() > MAX_HISTORY {
            let excess = self.undo_stack.len() - MAX_HISTORY;
            self.undo_stack.drain(..excess);
        }
    }
}

/// A [`RemoteVector`] that can undo and redo its own edits.
#[derive(Clone, Debug)]
pub struct UndoableVector {
    vector: RemoteVector,
    history: Arc<Mutex<History>>,
}

impl UndoableVector {
    pub fn new(list: CollaborativeList) -> Self {
        Self {
            vector: RemoteVector::new(list),
            history: Arc::new(Mutex::new(History::default())),
        }
    }

    /// The underlying adapter. Edits made through it are not recorded.
    pub fn vector(&self) -> &RemoteVector {
        &self.vector
    }

    pub fn changed(&self) -> &ChangeSignal<VectorChange<Value>> {
        self.vector.changed()
    }

    pub fn set_comparator<F>(&self, comparator: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.vector.set_comparator(comparator);
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.vector.get(index)
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.vector.to_vec()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.vector.iter()
    }

    pub fn set(&self, index: usize, value: Value) {
        let old = self.vector.get(index);
        self.vector.set(index, value);
        let new = self.vector.get(index);
        if let (Some(old), Some(new)) = (old, new) {
            if old != new {
                self.record(VectorOperation::Set { index, old, new });
            }
        }
    }

    pub fn push_back(&self, value: Value) {
        self.push_all(vec![value]);
    }

    pub fn push_all(&self, values: Vec<Value>) {
        let len = self.len();
        self.insert_all(len, values);
    }

    pub fn insert(&self, index: usize, value: Value) {
        self.insert_all(index, vec![value]);
    }

    pub fn insert_all(&self, index: usize, values: Vec<Value>) {
        if values.is_empty() {
            return;
        }
        self.vector.insert_all(index, values.clone());
        self.record(VectorOperation::Insert { index, values });
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

    pub fn remove_range(&self, start: usize, end: usize) -> Vec<Value> {
        let removed = self.vector.remove_range(start, end);
        if !removed.is_empty() {
            self.record(VectorOperation::Remove {
                index: start,
                values: removed.clone(),
            });
        }
        removed
    }

    /// Remove the first value the vector's comparator matches.
    pub fn remove(&self, value: &Value) -> Option<usize> {
        let index = self.vector.position(value)?;
        self.remove_at(index);
        Some(index)
    }

    pub fn clear(&self) {
        let len = self.len();
        self.remove_range(0, len);
    }

    pub fn move_item(&self, from: usize, to: usize) {
        let len = self.len();
        if len <= 1 || from == to {
            return;
        }
        self.vector.move_item(from, to);
        self.record(VectorOperation::Move { from, to });
    }

    /// Start grouping operations into one undo step. Calls nest.
    pub fn begin_compound(&self) {
        let mut history = self.history.lock();
        history.depth += 1;
        if history.current_group.is_none() {
            history.current_group = Some(Vec::new());
        }
    }

    /// Close the innermost group; the outermost close commits it.
    pub fn end_compound(&self) {
        let mut history = self.history.lock();
        if history.depth == 0 {
            return;
        }
        history.depth -= 1;
        if history.depth == 0 {
            if let Some(group) = history.current_group.take() {
                if !group.is_empty() {
                    history.undo_stack.push(group);
                    history.trim();
                }
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.history.lock().undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.lock().redo_stack.is_empty()
    }

    /// Revert the last step. Returns false if there was nothing to undo.
    pub fn undo(&self) -> bool {
        let group = match self.history.lock().undo_stack.pop() {
            Some(group) => group,
            None => return false,
        };
        for operation in group.iter().rev() {
            self.apply(&operation.inverse());
        }
        self.history.lock().redo_stack.push(group);
        true
    }

    /// Reapply the last undone step. Returns false if there was nothing to redo.
    pub fn redo(&self) -> bool {
        let group = match self.history.lock().redo_stack.pop() {
            Some(group) => group,
            None => return false,
        };
        for operation in &group {
            self.apply(operation);
        }
        self.history.lock().undo_stack.push(group);
        true
    }

    /// Forget all history.
    pub fn clear_undo(&self) {
        let mut history = self.history.lock();
        history.undo_stack.clear();
        history.redo_stack.clear();
    }

    fn record(&self, operation: VectorOperation) {
        self.history.lock().record(operation);
    }

    fn apply(&self, operation: &VectorOperation) {
        let len = self.vector.len();
        match operation {
            VectorOperation::Insert { index, values } if *index <= len => {
                self.vector.insert_all(*index, values.clone());
            }
            VectorOperation::Remove { index, values } if index + values.len() <= len => {
                self.vector.remove_range(*index, index + values.len());
            }
            VectorOperation::Set { index, new, .. } if *index < len => {
                self.vector.set(*index, new.clone());
            }
            VectorOperation::Move { from, to } if *from < len && *to < len => {
                self.vector.move_item(*from, *to);
            }
            _ => {}
        }
    }
}

impl Synchronizable for UndoableVector {
    fn kind(&self) -> ObjectKind {
        ObjectKind::List
    }

    fn remote_object(&self) -> RemoteObject {
        self.vector.remote_object()
    }

    fn rebind(&self, object: RemoteObject) -> Result<()> {
        self.vector.rebind(object)
    }
}

impl Disposable for UndoableVector {
    fn dispose(&self) {
        self.vector.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.vector.is_disposed()
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeldb_realtime::Model;
    use serde_json::json;

    fn vector() -> UndoableVector {
        let model = Model::new();
        UndoableVector::new(model.create_list(vec![json!(1), json!(2), json!(3)]))
    }

    #[test]
    fn test_undo_redo_single_steps() {
        let v = vector();
        v.push_back(json!(4));
        v.set(0, json!(10));
        v.remove_at(1);
        assert_eq!(v.to_vec(), vec![json!(10), json!(3), json!(4)]);

        assert!(v.undo());
        assert_eq!(v.to_vec(), vec![json!(10), json!(2), json!(3), json!(4)]);
        assert!(v.undo());
        assert!(v.undo());
        assert_eq!(v.to_vec(), vec![json!(1), json!(2), json!(3)]);
        assert!(!v.undo());

        assert!(v.redo());
        assert_eq!(v.to_vec(), vec![json!(1), json!(2), json!(3), json!(4)]);
        assert!(v.can_redo());
    }

    #[test]
    fn test_move_is_undone() {
        let v = vector();
        v.move_item(0, 2);
        assert_eq!(v.to_vec(), vec![json!(2), json!(3), json!(1)]);
        v.undo();
        assert_eq!(v.to_vec(), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_compound_undoes_together() {
        let v = vector();
        v.begin_compound();
        v.push_back(json!(4));
        v.begin_compound();
        v.clear();
        v.end_compound();
        v.push_back(json!(5));
        v.end_compound();
        assert_eq!(v.to_vec(), vec![json!(5)]);

        assert!(v.undo());
        assert_eq!(v.to_vec(), vec![json!(1), json!(2), json!(3)]);
        assert!(!v.can_undo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let v = vector();
        v.push_back(json!(4));
        v.undo();
        v.push_back(json!(5));
        assert!(!v.can_redo());
        v.clear_undo();
        assert!(!v.can_undo());
    }

    #[test]
    fn test_remove_uses_comparator() {
        let model = Model::new();
        let v = UndoableVector::new(model.create_list(vec![
            json!({"id": 1, "rev": 1}),
            json!({"id": 2, "rev": 1}),
        ]));
        v.set_comparator(|a, b| a["id"] == b["id"]);

        assert_eq!(v.remove(&json!({"id": 2, "rev": 9})), Some(1));
        assert_eq!(v.to_vec(), vec![json!({"id": 1, "rev": 1})]);

        // Same identity counts as a no-op write.
        v.set(0, json!({"id": 1, "rev": 2}));
        assert_eq!(v.get(0), Some(json!({"id": 1, "rev": 1})));

        assert!(v.undo());
        assert_eq!(v.len(), 2);
        assert_eq!(v.get(1), Some(json!({"id": 2, "rev": 1})));
    }

    #[test]
    fn test_noop_set_not_recorded() {
        let v = vector();
        v.set(0, json!(1));
        assert!(!v.can_undo());
    }
}
