//! CollaborativeMap - replicated string-keyed map.
//!
//! Every key holds a last-writer-wins register stamped by the model's
//! Lamport clock. Values are plain JSON or references to other objects of
//! the same model.

use crate::error::{RealtimeError, Result};
use crate::lwwreg::LWWRegister;
use crate::model::{ModelInner, Mutation, ObjectCore};
use crate::object::{EventKind, ObjectId, ObjectKind, Origin, RealtimeEvent, RemoteValue};
use modeldb_core::ListenerId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// What a map register stores on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MapEntry {
    Json(Value),
    Object { id: ObjectId, kind: ObjectKind },
}

struct MapInner {
    core: ObjectCore,
    entries: RwLock<BTreeMap<String, LWWRegister<MapEntry>>>,
}

/// A collaborative map.
#[derive(Clone)]
pub struct CollaborativeMap {
    inner: Arc<MapInner>,
    origin: Option<Origin>,
}

impl CollaborativeMap {
    pub(crate) fn attach(id: ObjectId, model: Weak<ModelInner>) -> Self {
        Self {
            inner: Arc::new(MapInner {
                core: ObjectCore::new(id, model),
                entries: RwLock::new(BTreeMap::new()),
            }),
            origin: None,
        }
    }

    pub(crate) fn model_ref(&self) -> &Weak<ModelInner> {
        &self.inner.core.model
    }

    /// A handle to the same map whose mutations are tagged with `origin`.
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

    pub fn same_object(&self, other: &CollaborativeMap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<RemoteValue> {
        let entry = self.inner.entries.read().get(key)?.get().cloned()?;
        self.resolve(entry)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner
            .entries
            .read()
            .get(key)
            .map_or(false, |reg| !reg.is_empty())
    }

    /// Live keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .entries
            .read()
            .iter()
            .filter(|(_, reg)| !reg.is_empty())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.inner
            .entries
            .read()
            .values()
            .filter(|reg| !reg.is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of every live entry.
    pub fn entries(&self) -> Vec<(String, RemoteValue)> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }

    /// Render the map as a JSON object, expanding nested objects.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (key, value) in self.entries() {
            out.insert(key, value.to_json());
        }
        Value::Object(out)
    }

    /// Store `value` under `key`, returning the previous value.
    ///
    /// Objects must belong to the same model as this map.
    pub fn set(&self, key: &str, value: RemoteValue) -> Result<Option<RemoteValue>> {
        let entry = match &value {
            RemoteValue::Json(v) => MapEntry::Json(v.clone()),
            RemoteValue::Object(object) => {
                if !Weak::ptr_eq(object.model_ref(), self.model_ref()) {
                    return Err(RealtimeError::ForeignObject(object.id().to_string()));
                }
                MapEntry::Object {
                    id: object.id().clone(),
                    kind: object.kind(),
                }
            }
        };
        Ok(self.store(key, entry, value))
    }

    /// Store a plain JSON value under `key`, returning the previous value.
    pub fn set_json(&self, key: &str, value: Value) -> Option<RemoteValue> {
        self.store(key, MapEntry::Json(value.clone()), RemoteValue::Json(value))
    }

    /// Remove `key`, returning the value it held.
    pub fn delete(&self, key: &str) -> Option<RemoteValue> {
        if !self.has(key) {
            return None;
        }
        let old = self.get(key);
        self.write(key, None);
        self.inner.core.publish(
            EventKind::ValueChanged {
                key: key.to_string(),
                old_value: old.clone(),
                new_value: None,
            },
            true,
            self.origin,
        );
        old
    }

    /// Remove every key.
    pub fn clear(&self) {
        for key in self.keys() {
            self.delete(&key);
        }
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

    fn store(&self, key: &str, entry: MapEntry, value: RemoteValue) -> Option<RemoteValue> {
        let old = self.get(key);
        self.write(key, Some(entry));
        self.inner.core.publish(
            EventKind::ValueChanged {
                key: key.to_string(),
                old_value: old.clone(),
                new_value: Some(value),
            },
            true,
            self.origin,
        );
        old
    }

    fn write(&self, key: &str, entry: Option<MapEntry>) {
        let model = self.inner.core.model.upgrade();
        let (timestamp, replica_id) = match &model {
            Some(model) => (model.tick(), model.replica_id().to_string()),
            None => {
                let last = self
                    .inner
                    .entries
                    .read()
                    .get(key)
                    .map_or(0, |reg| reg.timestamp());
                (last + 1, String::new())
            }
        };
        let register = LWWRegister::new(entry, timestamp, replica_id);
        self.inner
            .entries
            .write()
            .entry(key.to_string())
            .and_modify(|reg| {
                reg.merge(&register);
            })
            .or_insert_with(|| register.clone());
        if let Some(model) = model {
            model.record(Mutation::Map {
                id: self.id().clone(),
                key: key.to_string(),
                register,
            });
        }
    }

    fn resolve(&self, entry: MapEntry) -> Option<RemoteValue> {
        match entry {
            MapEntry::Json(v) => Some(RemoteValue::Json(v)),
            MapEntry::Object { id, .. } => {
                let model = self.inner.core.model.upgrade()?;
                model.object(&id).map(RemoteValue::Object)
            }
        }
    }

    pub(crate) fn apply_remote(&self, key: &str, register: &LWWRegister<MapEntry>) {
        let old = self.get(key);
        let won = {
            let mut entries = self.inner.entries.write();
            match entries.get_mut(key) {
                Some(current) => current.merge(register),
                None => {
                    entries.insert(key.to_string(), register.clone());
                    true
                }
            }
        };
        if !won {
            return;
        }
        let new = self.get(key);
        if old == new {
            return;
        }
        self.inner.core.publish(
            EventKind::ValueChanged {
                key: key.to_string(),
                old_value: old,
                new_value: new,
            },
            false,
            None,
        );
    }
}

impl fmt::Debug for CollaborativeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollaborativeMap")
            .field("id", self.id())
            .field("keys", &self.keys())
            .finish()
    }
}
