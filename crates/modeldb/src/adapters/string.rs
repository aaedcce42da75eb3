//! RemoteString - observable text over a collaborative string.

use super::{wrong_kind, Synchronizable};
use crate::error::Result;
use modeldb_core::{ChangeSignal, Disposable, ListenerId, StringChange};
use modeldb_realtime::{
    CollaborativeString, EventKind, ObjectKind, Origin, RealtimeEvent, RemoteObject,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct StringInner {
    origin: Origin,
    string: RwLock<CollaborativeString>,
    subscription: Mutex<Option<ListenerId>>,
    changed: ChangeSignal<StringChange>,
    disposed: AtomicBool,
}

impl StringInner {
    fn on_event(&self, event: &RealtimeEvent) {
        if event.is_echo_of(self.origin) {
            return;
        }
        let change = match &event.kind {
            EventKind::TextInserted { index, text } => StringChange::insert(*index, text.clone()),
            EventKind::TextDeleted { index, text } => StringChange::remove(*index, text.clone()),
            _ => return,
        };
        self.changed.emit(&change);
    }
}

/// Observable text kept in a collaborative string. Positions count chars.
#[derive(Clone)]
pub struct RemoteString {
    inner: Arc<StringInner>,
}

impl RemoteString {
    pub fn new(string: CollaborativeString) -> Self {
        let origin = Origin::next();
        let inner = Arc::new(StringInner {
            origin,
            string: RwLock::new(string.with_origin(origin)),
            subscription: Mutex::new(None),
            changed: ChangeSignal::new(),
            disposed: AtomicBool::new(false),
        });
        attach(&inner);
        Self { inner }
    }

    pub fn changed(&self) -> &ChangeSignal<StringChange> {
        &self.inner.changed
    }

    pub fn origin(&self) -> Origin {
        self.inner.origin
    }

    pub fn text(&self) -> String {
        self.string().text()
    }

    pub fn len(&self) -> usize {
        self.string().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, index: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let string = self.string();
        let len = string.len();
        if index > len {
            panic!("insertion index {index} out of bounds for text of length {len}");
        }
        string.insert_string(index, text);
        self.inner
            .changed
            .emit(&StringChange::insert(index, text));
    }

    pub fn push_str(&self, text: &str) {
        let len = self.len();
        self.insert(len, text);
    }

    /// Remove the chars in `start..end`.
    pub fn remove(&self, start: usize, end: usize) {
        let string = self.string();
        let len = string.len();
        if start > end || end > len {
            panic!("range {start}..{end} out of bounds for text of length {len}");
        }
        if start == end {
            return;
        }
        let removed: String = string.text().chars().skip(start).take(end - start).collect();
        string.remove_range(start, end);
        self.inner
            .changed
            .emit(&StringChange::remove(start, removed));
    }

    /// Replace the whole text. Equal text is ignored.
    pub fn set_text(&self, text: &str) {
        let string = self.string();
        if string.text() == text {
            return;
        }
        string.set_text(text);
        self.inner.changed.emit(&StringChange::set(text));
    }

    fn string(&self) -> CollaborativeString {
        self.inner.string.read().clone()
    }
}

fn attach(inner: &Arc<StringInner>) {
    let weak = Arc::downgrade(inner);
    let id = inner.string.read().add_event_listener(move |event| {
        if let Some(inner) = weak.upgrade() {
            inner.on_event(event);
        }
    });
    *inner.subscription.lock() = Some(id);
}

fn detach(inner: &StringInner) {
    if let Some(id) = inner.subscription.lock().take() {
        inner.string.read().remove_event_listener(id);
    }
}

impl Synchronizable for RemoteString {
    fn kind(&self) -> ObjectKind {
        ObjectKind::EditableString
    }

    fn remote_object(&self) -> RemoteObject {
        RemoteObject::String(self.string())
    }

    fn rebind(&self, object: RemoteObject) -> Result<()> {
        let string = match object {
            RemoteObject::String(s) => s.with_origin(self.inner.origin),
            other => return Err(wrong_kind(ObjectKind::EditableString, &other).into()),
        };
        if self.is_disposed() || string.same_object(&self.string()) {
            return Ok(());
        }
        let ours = self.text();
        detach(&self.inner);
        let contributed = string.text();
        let end = string.len();
        string.insert_string(end, &ours);
        *self.inner.string.write() = string;
        attach(&self.inner);
        if !contributed.is_empty() {
            self.inner
                .changed
                .emit(&StringChange::insert(0, contributed));
        }
        Ok(())
    }
}

impl Disposable for RemoteString {
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

impl fmt::Debug for RemoteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteString")
            .field("origin", &self.inner.origin)
            .field("text", &self.text())
            .finish()
    }
}
