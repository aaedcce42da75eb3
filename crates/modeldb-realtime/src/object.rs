//! Identifiers, events and value types shared by collaborative objects.

use crate::list::CollaborativeList;
use crate::map::CollaborativeMap;
use crate::model::ModelInner;
use crate::string::CollaborativeString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use ulid::Ulid;

/// Unique identifier for a collaborative object within a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// The id every replica uses for the document root map.
    pub fn root() -> Self {
        Self("root".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a collaborative object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    EditableString,
    List,
    Map,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::EditableString => write!(f, "EditableString"),
            ObjectKind::List => write!(f, "List"),
            ObjectKind::Map => write!(f, "Map"),
        }
    }
}

/// Tag identifying which handle performed a local mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Origin(u64);

impl Origin {
    /// Allocate a process-unique origin tag.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// What changed on a collaborative object.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    TextInserted {
        index: usize,
        text: String,
    },
    TextDeleted {
        index: usize,
        text: String,
    },
    ValuesAdded {
        index: usize,
        values: Vec<Value>,
    },
    ValuesRemoved {
        index: usize,
        values: Vec<Value>,
    },
    ValuesSet {
        index: usize,
        old_values: Vec<Value>,
        new_values: Vec<Value>,
    },
    ValueChanged {
        key: String,
        old_value: Option<RemoteValue>,
        new_value: Option<RemoteValue>,
    },
}

/// An event delivered to object listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct RealtimeEvent {
    pub kind: EventKind,
    /// True if the mutation was made on this replica.
    pub is_local: bool,
    /// Tag of the handle that made a local mutation, if it was tagged.
    pub origin: Option<Origin>,
}

impl RealtimeEvent {
    /// True if this event was produced through a handle tagged with `origin`.
    pub fn is_echo_of(&self, origin: Origin) -> bool {
        self.is_local && self.origin == Some(origin)
    }
}

/// A handle to one collaborative object.
#[derive(Clone, Debug)]
pub enum RemoteObject {
    String(CollaborativeString),
    List(CollaborativeList),
    Map(CollaborativeMap),
}

impl RemoteObject {
    pub fn id(&self) -> &ObjectId {
        match self {
            RemoteObject::String(s) => s.id(),
            RemoteObject::List(l) => l.id(),
            RemoteObject::Map(m) => m.id(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            RemoteObject::String(_) => ObjectKind::EditableString,
            RemoteObject::List(_) => ObjectKind::List,
            RemoteObject::Map(_) => ObjectKind::Map,
        }
    }

    /// Render the object's current content as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            RemoteObject::String(s) => Value::String(s.text()),
            RemoteObject::List(l) => Value::Array(l.to_vec()),
            RemoteObject::Map(m) => m.to_json(),
        }
    }

    pub(crate) fn model_ref(&self) -> &Weak<ModelInner> {
        match self {
            RemoteObject::String(s) => s.model_ref(),
            RemoteObject::List(l) => l.model_ref(),
            RemoteObject::Map(m) => m.model_ref(),
        }
    }

    /// A handle to the same object whose mutations are tagged with `origin`.
    pub fn with_origin(&self, origin: Origin) -> RemoteObject {
        match self {
            RemoteObject::String(s) => RemoteObject::String(s.with_origin(origin)),
            RemoteObject::List(l) => RemoteObject::List(l.with_origin(origin)),
            RemoteObject::Map(m) => RemoteObject::Map(m.with_origin(origin)),
        }
    }

    /// True if both handles refer to the same object of the same replica.
    pub fn same_object(&self, other: &RemoteObject) -> bool {
        match (self, other) {
            (RemoteObject::String(a), RemoteObject::String(b)) => a.same_object(b),
            (RemoteObject::List(a), RemoteObject::List(b)) => a.same_object(b),
            (RemoteObject::Map(a), RemoteObject::Map(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl PartialEq for RemoteObject {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

/// A value stored in a collaborative map.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteValue {
    Json(Value),
    Object(RemoteObject),
}

impl RemoteValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RemoteValue::Json(v) => Some(v),
            RemoteValue::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&RemoteObject> {
        match self {
            RemoteValue::Json(_) => None,
            RemoteValue::Object(o) => Some(o),
        }
    }

    /// Render as JSON, expanding objects to their current content.
    pub fn to_json(&self) -> Value {
        match self {
            RemoteValue::Json(v) => v.clone(),
            RemoteValue::Object(o) => o.to_json(),
        }
    }
}

impl From<Value> for RemoteValue {
    fn from(value: Value) -> Self {
        RemoteValue::Json(value)
    }
}

impl From<RemoteObject> for RemoteValue {
    fn from(object: RemoteObject) -> Self {
        RemoteValue::Object(object)
    }
}

impl From<CollaborativeString> for RemoteObject {
    fn from(string: CollaborativeString) -> Self {
        RemoteObject::String(string)
    }
}

impl From<CollaborativeList> for RemoteObject {
    fn from(list: CollaborativeList) -> Self {
        RemoteObject::List(list)
    }
}

impl From<CollaborativeMap> for RemoteObject {
    fn from(map: CollaborativeMap) -> Self {
        RemoteObject::Map(map)
    }
}
