//! CollaboratorMap - observable, read-only view of who has a document open.

use modeldb_core::{ChangeSignal, Disposable, ListenerId, MapChange};
use modeldb_realtime::{Collaborator, CollaboratorEvent, Document};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct CollaboratorsInner {
    document: Document,
    entries: RwLock<BTreeMap<String, Collaborator>>,
    changed: ChangeSignal<MapChange<Collaborator>>,
    subscription: Mutex<Option<ListenerId>>,
    disposed: AtomicBool,
}

impl CollaboratorsInner {
    fn on_event(&self, event: &CollaboratorEvent) {
        let change = match event {
            CollaboratorEvent::Joined(c) => {
                let old = self
                    .entries
                    .write()
                    .insert(c.session_id.clone(), c.clone());
                MapChange::between(c.session_id.clone(), old, Some(c.clone()))
            }
            CollaboratorEvent::Left(c) => {
                let old = self.entries.write().remove(&c.session_id);
                MapChange::between(c.session_id.clone(), old, None)
            }
        };
        if let Some(change) = change {
            self.changed.emit(&change);
        }
    }
}

/// Collaborators keyed by session id.
#[derive(Clone)]
pub struct CollaboratorMap {
    inner: Arc<CollaboratorsInner>,
}

impl CollaboratorMap {
    pub fn new(document: &Document) -> Self {
        let entries = document
            .collaborators()
            .into_iter()
            .map(|c| (c.session_id.clone(), c))
            .collect();
        let inner = Arc::new(CollaboratorsInner {
            document: document.clone(),
            entries: RwLock::new(entries),
            changed: ChangeSignal::new(),
            subscription: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });
        let weak = Arc::downgrade(&inner);
        let id = document.on_collaborator_event(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_event(event);
            }
        });
        *inner.subscription.lock() = Some(id);
        Self { inner }
    }

    pub fn changed(&self) -> &ChangeSignal<MapChange<Collaborator>> {
        &self.inner.changed
    }

    pub fn get(&self, session_id: &str) -> Option<Collaborator> {
        self.inner.entries.read().get(session_id).cloned()
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.inner.entries.read().contains_key(session_id)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Collaborator> {
        self.inner.entries.read().values().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// The collaborator owning this replica.
    pub fn local(&self) -> Option<Collaborator> {
        self.inner
            .entries
            .read()
            .values()
            .find(|c| c.is_local)
            .cloned()
    }
}

impl Disposable for CollaboratorMap {
    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(id) = self.inner.subscription.lock().take() {
            self.inner.document.remove_collaborator_listener(id);
        }
        self.inner.changed.clear();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CollaboratorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorMap")
            .field("sessions", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeldb_core::MapChangeType;

    #[test]
    fn test_tracks_joins_and_leaves() {
        let doc = Document::placeholder();
        doc.add_collaborator(Collaborator::new("me", "Alice", true));
        let map = CollaboratorMap::new(&doc);
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let k = kinds.clone();
        map.changed().connect(move |c| k.lock().push(c.kind));

        doc.add_collaborator(Collaborator::new("peer", "Bob", false));
        assert_eq!(map.size(), 2);
        assert_eq!(map.local().unwrap().user_name, "Alice");

        doc.remove_collaborator("peer");
        assert!(!map.has("peer"));
        assert_eq!(*kinds.lock(), vec![MapChangeType::Add, MapChangeType::Remove]);

        map.dispose();
        doc.add_collaborator(Collaborator::new("late", "Carol", false));
        assert!(!map.has("late"));
    }
}
