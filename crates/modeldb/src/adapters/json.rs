//! RemoteJson - a map adapter viewed as one JSON document.

use super::{RemoteMap, Synchronizable};
use crate::error::Result;
use modeldb_core::Disposable;
use modeldb_realtime::{CollaborativeMap, ObjectKind, RemoteObject};
use serde_json::{Map, Value};
use std::ops::Deref;

/// A collaborative map whose top-level keys form a JSON object.
#[derive(Clone, Debug)]
pub struct RemoteJson {
    map: RemoteMap,
}

impl RemoteJson {
    pub fn new(map: CollaborativeMap) -> Self {
        Self {
            map: RemoteMap::new(map),
        }
    }

    /// Write every field of `object`, leaving other keys untouched.
    pub fn assign(&self, object: &Map<String, Value>) {
        for (key, value) in object {
            self.map.set(key, value.clone());
        }
    }

    /// Look up a nested value by JSON pointer, e.g. `/settings/theme`.
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        self.map.to_json().pointer(pointer).cloned()
    }
}

impl Deref for RemoteJson {
    type Target = RemoteMap;

    fn deref(&self) -> &RemoteMap {
        &self.map
    }
}

impl Synchronizable for RemoteJson {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Map
    }

    fn remote_object(&self) -> RemoteObject {
        self.map.remote_object()
    }

    fn rebind(&self, object: RemoteObject) -> Result<()> {
        self.map.rebind(object)
    }
}

impl Disposable for RemoteJson {
    fn dispose(&self) {
        self.map.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.map.is_disposed()
    }
}
