//! RemoteMap - observable string-keyed map over a collaborative map.

use super::{json_eq, wrong_kind, Comparator, Synchronizable};
use crate::error::Result;
use modeldb_core::{ChangeSignal, Disposable, ListenerId, MapChange};
use modeldb_realtime::{
    CollaborativeMap, EventKind, ObjectKind, Origin, RealtimeEvent, RemoteObject, RemoteValue,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct MapInner {
    origin: Origin,
    map: RwLock<CollaborativeMap>,
    subscription: Mutex<Option<ListenerId>>,
    changed: ChangeSignal<MapChange<Value>>,
    comparator: RwLock<Comparator>,
    disposed: AtomicBool,
}

impl MapInner {
    fn on_event(&self, event: &RealtimeEvent) {
        if event.is_echo_of(self.origin) {
            return;
        }
        if let EventKind::ValueChanged {
            key,
            old_value,
            new_value,
        } = &event.kind
        {
            let change = MapChange::between(
                key.clone(),
                old_value.as_ref().map(RemoteValue::to_json),
                new_value.as_ref().map(RemoteValue::to_json),
            );
            if let Some(change) = change {
                self.changed.emit(&change);
            }
        }
    }
}

/// An observable map of JSON values kept in a collaborative map.
///
/// Entries holding other collaborative objects read back as their JSON
/// rendering.
#[derive(Clone)]
pub struct RemoteMap {
    inner: Arc<MapInner>,
}

impl RemoteMap {
    pub fn new(map: CollaborativeMap) -> Self {
        let origin = Origin::next();
        let inner = Arc::new(MapInner {
            origin,
            map: RwLock::new(map.with_origin(origin)),
            subscription: Mutex::new(None),
            changed: ChangeSignal::new(),
            comparator: RwLock::new(json_eq()),
            disposed: AtomicBool::new(false),
        });
        attach(&inner);
        Self { inner }
    }

    pub fn changed(&self) -> &ChangeSignal<MapChange<Value>> {
        &self.inner.changed
    }

    pub fn origin(&self) -> Origin {
        self.inner.origin
    }

    pub fn set_comparator<F>(&self, comparator: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        *self.inner.comparator.write() = Arc::new(comparator);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.map().get(key).map(|v| v.to_json())
    }

    pub fn has(&self, key: &str) -> bool {
        self.map().has(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.map().keys()
    }

    pub fn size(&self) -> usize {
        self.map().size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.map()
            .entries()
            .into_iter()
            .map(|(k, v)| (k, v.to_json()))
            .collect()
    }

    /// Store `value` under `key`, returning the previous value.
    /// Comparator-equal writes are ignored.
    pub fn set(&self, key: &str, value: Value) -> Option<Value> {
        let map = self.map();
        let old = map.get(key).map(|v| v.to_json());
        if let Some(old) = &old {
            if (self.comparator())(old, &value) {
                return Some(old.clone());
            }
        }
        map.set_json(key, value.clone());
        if let Some(change) = MapChange::between(key, old.clone(), Some(value)) {
            self.inner.changed.emit(&change);
        }
        old
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        let old = self.map().delete(key).map(|v| v.to_json());
        if let Some(change) = MapChange::between(key, old.clone(), None) {
            self.inner.changed.emit(&change);
        }
        old
    }

    /// Remove every key, one change per key.
    pub fn clear(&self) {
        for key in self.keys() {
            self.delete(&key);
        }
    }

    pub fn to_json(&self) -> Value {
        self.map().to_json()
    }

    /// The tagged collaborative map, for callers storing object references.
    pub(crate) fn primitive(&self) -> CollaborativeMap {
        self.map()
    }

    fn map(&self) -> CollaborativeMap {
        self.inner.map.read().clone()
    }

    fn comparator(&self) -> Comparator {
        self.inner.comparator.read().clone()
    }
}

fn attach(inner: &Arc<MapInner>) {
    let weak = Arc::downgrade(inner);
    let id = inner.map.read().add_event_listener(move |event| {
        if let Some(inner) = weak.upgrade() {
            inner.on_event(event);
        }
    });
    *inner.subscription.lock() = Some(id);
}

fn detach(inner: &MapInner) {
    if let Some(id) = inner.subscription.lock().take() {
        inner.map.read().remove_event_listener(id);
    }
}

impl Synchronizable for RemoteMap {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Map
    }

    fn remote_object(&self) -> RemoteObject {
        RemoteObject::Map(self.map())
    }

    /// Drains by overwriting per key; one `Add` change is emitted for each
    /// key only the new map held.
    fn rebind(&self, object: RemoteObject) -> Result<()> {
        let map = match object {
            RemoteObject::Map(m) => m.with_origin(self.inner.origin),
            other => return Err(wrong_kind(ObjectKind::Map, &other).into()),
        };
        if self.is_disposed() || map.same_object(&self.map()) {
            return Ok(());
        }
        let ours = self.entries();
        detach(&self.inner);
        let held: HashSet<&str> = ours.iter().map(|(k, _)| k.as_str()).collect();
        let contributed: Vec<(String, Value)> = map
            .entries()
            .into_iter()
            .filter(|(k, _)| !held.contains(k.as_str()))
            .map(|(k, v)| (k, v.to_json()))
            .collect();
        for (key, value) in &ours {
            map.set_json(key, value.clone());
        }
        *self.inner.map.write() = map;
        attach(&self.inner);
        for (key, value) in contributed {
            if let Some(change) = MapChange::between(key, None, Some(value)) {
                self.inner.changed.emit(&change);
            }
        }
        Ok(())
    }
}

impl Disposable for RemoteMap {
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

impl fmt::Debug for RemoteMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMap")
            .field("origin", &self.inner.origin)
            .field("keys", &self.keys())
            .finish()
    }
}
