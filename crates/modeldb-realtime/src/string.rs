//! CollaborativeString - replicated text object.

use crate::model::{ModelInner, Mutation, ObjectCore};
use crate::object::{EventKind, ObjectId, Origin, RealtimeEvent};
use crate::rga_text::{RGAText, RGATextDelta, TextEdit};
use modeldb_core::ListenerId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

struct StringInner {
    core: ObjectCore,
    text: RwLock<RGAText>,
}

/// A collaborative text object.
///
/// Handles are cheap to clone. A handle may carry an [`Origin`] tag which
/// is attached to the events of mutations made through it.
#[derive(Clone)]
pub struct CollaborativeString {
    inner: Arc<StringInner>,
    origin: Option<Origin>,
}

impl CollaborativeString {
    pub(crate) fn attach(id: ObjectId, model: Weak<ModelInner>) -> Self {
        let replica_id = model
            .upgrade()
            .map(|m| m.replica_id().to_string())
            .unwrap_or_default();
        Self {
            inner: Arc::new(StringInner {
                core: ObjectCore::new(id, model),
                text: RwLock::new(RGAText::new(replica_id)),
            }),
            origin: None,
        }
    }

    /// Fill a freshly attached string, returning the creation delta.
    pub(crate) fn seed(&self, initial: &str) -> RGATextDelta {
        let mut text = self.inner.text.write();
        text.insert(0, initial);
        text.take_delta().unwrap_or_default()
    }

    pub(crate) fn integrate_silently(&self, delta: &RGATextDelta) {
        self.inner.text.write().apply_delta(delta);
    }

    pub(crate) fn model_ref(&self) -> &Weak<ModelInner> {
        &self.inner.core.model
    }

    /// A handle to the same object whose mutations are tagged with `origin`.
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

    /// True if both handles refer to the same object.
    pub fn same_object(&self, other: &CollaborativeString) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The current text.
    pub fn text(&self) -> String {
        self.inner.text.read().to_string()
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.inner.text.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `text` at char position `index`.
    pub fn insert_string(&self, index: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let delta = {
            let mut rga = self.inner.text.write();
            rga.insert(index, text);
            rga.take_delta()
        };
        self.commit(delta);
        self.inner.core.publish(
            EventKind::TextInserted {
                index,
                text: text.to_string(),
            },
            true,
            self.origin,
        );
    }

    /// Remove the chars in `start..end`.
    pub fn remove_range(&self, start: usize, end: usize) {
        if end <= start {
            return;
        }
        let (removed, delta) = {
            let mut rga = self.inner.text.write();
            let removed = rga.slice(start, end);
            rga.delete(start, end - start);
            (removed, rga.take_delta())
        };
        if removed.is_empty() {
            return;
        }
        self.commit(delta);
        self.inner.core.publish(
            EventKind::TextDeleted {
                index: start,
                text: removed,
            },
            true,
            self.origin,
        );
    }

    /// Replace the whole text.
    pub fn set_text(&self, text: &str) {
        let (old, delta) = {
            let mut rga = self.inner.text.write();
            let old = rga.to_string();
            if old == text {
                return;
            }
            let len = rga.len();
            rga.delete(0, len);
            rga.insert(0, text);
            (old, rga.take_delta())
        };
        self.commit(delta);
        if !old.is_empty() {
            self.inner.core.publish(
                EventKind::TextDeleted {
                    index: 0,
                    text: old,
                },
                true,
                self.origin,
            );
        }
        if !text.is_empty() {
            self.inner.core.publish(
                EventKind::TextInserted {
                    index: 0,
                    text: text.to_string(),
                },
                true,
                self.origin,
            );
        }
    }

    /// Register a listener for every event on this object.
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

    fn commit(&self, delta: Option<RGATextDelta>) {
        if let Some(delta) = delta {
            self.inner.core.record(Mutation::Text {
                id: self.id().clone(),
                delta,
            });
        }
    }

    pub(crate) fn apply_remote(&self, delta: &RGATextDelta) {
        let edits = self.inner.text.write().apply_delta_indexed(delta);
        for kind in coalesce(edits) {
            self.inner.core.publish(kind, false, None);
        }
    }
}

/// Merge per-char edits into runs: deletes at a fixed index and inserts
/// at consecutive indices.
fn coalesce(edits: Vec<TextEdit>) -> Vec<EventKind> {
    let mut events: Vec<EventKind> = Vec::new();
    for edit in edits {
        let merged = match (events.last_mut(), &edit) {
            (Some(EventKind::TextDeleted { index, text }), TextEdit::Deleted { index: at, value: ch })
                if *index == *at =>
            {
                text.push(*ch);
                true
            }
            (Some(EventKind::TextInserted { index, text }), TextEdit::Inserted { index: at, value: ch })
                if *index + text.chars().count() == *at =>
            {
                text.push(*ch);
                true
            }
            _ => false,
        };
        if merged {
            continue;
        }
        events.push(match edit {
            TextEdit::Deleted { index, value: ch } => EventKind::TextDeleted {
                index,
                text: ch.to_string(),
            },
            TextEdit::Inserted { index, value: ch } => EventKind::TextInserted {
                index,
                text: ch.to_string(),
            },
        });
    }
    events
}

impl fmt::Debug for CollaborativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollaborativeString")
            .field("id", self.id())
            .field("text", &self.text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Model;
    use crate::object::{EventKind, Origin};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_local_edits_emit_tagged_events() {
        let model = Model::new();
        let origin = Origin::next();
        let string = model.create_string("").with_origin(origin);
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        string.add_event_listener(move |event| e.lock().push(event.clone()));

        string.insert_string(0, "hello");
        string.remove_range(1, 3);

        assert_eq!(string.text(), "hlo");
        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_echo_of(origin)));
        assert_eq!(
            events[1].kind,
            EventKind::TextDeleted {
                index: 1,
                text: "el".to_string()
            }
        );
    }

    #[test]
    fn test_remote_insert_is_one_event() {
        let a = Model::new();
        let b = Model::new();
        let string = a.create_string("ab");
        for m in a.take_pending() {
            b.apply_remote(&m).unwrap();
        }
        let replica = match b.get_object(string.id()).unwrap() {
            crate::object::RemoteObject::String(s) => s,
            _ => unreachable!(),
        };
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        replica.add_event_listener(move |event| e.lock().push(event.clone()));

        string.insert_string(1, "xyz");
        for m in a.take_pending() {
            b.apply_remote(&m).unwrap();
        }

        assert_eq!(replica.text(), "axyzb");
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_local);
        assert_eq!(
            events[0].kind,
            EventKind::TextInserted {
                index: 1,
                text: "xyz".to_string()
            }
        );
    }

    #[test]
    fn test_set_text_same_is_noop() {
        let model = Model::new();
        let string = model.create_string("same");
        model.take_pending();

        string.set_text("same");
        assert!(!model.has_pending());
    }
}
