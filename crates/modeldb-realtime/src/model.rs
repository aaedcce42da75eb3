//! Model - one replica of a collaborative document's object graph.
//!
//! A model owns an object registry (every string, list and map created in
//! the document, including the root map), a Lamport clock for map writes
//! and an outbox of mutations produced by local edits. A transport drains
//! the outbox with [`Model::take_pending`] and feeds other replicas'
//! mutations through [`Model::apply_remote`].

use crate::error::{RealtimeError, Result};
use crate::list::CollaborativeList;
use crate::lwwreg::LWWRegister;
use crate::map::{CollaborativeMap, MapEntry};
use crate::object::{EventKind, ObjectId, Origin, RealtimeEvent, RemoteObject};
use crate::rga_list::RGAListDelta;
use crate::rga_text::RGATextDelta;
use crate::string::CollaborativeString;
use modeldb_core::ChangeSignal;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use ulid::Ulid;

/// A replicated change to the object graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    CreateString {
        id: ObjectId,
        delta: RGATextDelta,
    },
    CreateList {
        id: ObjectId,
        delta: RGAListDelta<Value>,
    },
    CreateMap {
        id: ObjectId,
    },
    Text {
        id: ObjectId,
        delta: RGATextDelta,
    },
    List {
        id: ObjectId,
        delta: RGAListDelta<Value>,
        /// The delta replaces values in place rather than inserting/removing.
        replace: bool,
    },
    Map {
        id: ObjectId,
        key: String,
        register: LWWRegister<MapEntry>,
    },
}

impl Mutation {
    /// The object this mutation targets.
    pub fn object_id(&self) -> &ObjectId {
        match self {
            Mutation::CreateString { id, .. }
            | Mutation::CreateList { id, .. }
            | Mutation::CreateMap { id }
            | Mutation::Text { id, .. }
            | Mutation::List { id, .. }
            | Mutation::Map { id, .. } => id,
        }
    }

    /// Encode for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub(crate) struct ModelInner {
    replica_id: String,
    clock: AtomicU64,
    objects: RwLock<HashMap<ObjectId, RemoteObject>>,
    outbox: Mutex<Vec<Mutation>>,
    root: CollaborativeMap,
}

impl ModelInner {
    pub(crate) fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Advance the Lamport clock for a local write.
    pub(crate) fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fold a remote timestamp into the Lamport clock.
    pub(crate) fn observe(&self, timestamp: u64) {
        self.clock.fetch_max(timestamp, Ordering::SeqCst);
    }

    pub(crate) fn record(&self, mutation: Mutation) {
        self.outbox.lock().push(mutation);
    }

    pub(crate) fn object(&self, id: &ObjectId) -> Option<RemoteObject> {
        self.objects.read().get(id).cloned()
    }

    fn register(&self, object: RemoteObject) {
        self.objects.write().insert(object.id().clone(), object);
    }
}

/// State shared by every collaborative object handle.
pub(crate) struct ObjectCore {
    pub(crate) id: ObjectId,
    pub(crate) model: Weak<ModelInner>,
    pub(crate) events: ChangeSignal<RealtimeEvent>,
}

impl ObjectCore {
    pub(crate) fn new(id: ObjectId, model: Weak<ModelInner>) -> Self {
        Self {
            id,
            model,
            events: ChangeSignal::new(),
        }
    }

    pub(crate) fn record(&self, mutation: Mutation) {
        if let Some(model) = self.model.upgrade() {
            model.record(mutation);
        }
    }

    pub(crate) fn publish(&self, kind: EventKind, is_local: bool, origin: Option<Origin>) {
        self.events.emit(&RealtimeEvent {
            kind,
            is_local,
            origin,
        });
    }
}

/// One replica of a document's object graph.
///
/// Cloning yields another handle to the same replica.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Create an empty replica with a fresh replica ID.
    pub fn new() -> Self {
        Self::with_replica_id(Ulid::new().to_string())
    }

    /// Create an empty replica with the given replica ID.
    pub fn with_replica_id(replica_id: impl Into<String>) -> Self {
        let replica_id = replica_id.into();
        let inner = Arc::new_cyclic(|weak: &Weak<ModelInner>| {
            let root = CollaborativeMap::attach(ObjectId::root(), weak.clone());
            let mut objects = HashMap::new();
            objects.insert(ObjectId::root(), RemoteObject::Map(root.clone()));
            ModelInner {
                replica_id,
                clock: AtomicU64::new(0),
                objects: RwLock::new(objects),
                outbox: Mutex::new(Vec::new()),
                root,
            }
        });
        Self { inner }
    }

    /// Get the replica ID.
    pub fn replica_id(&self) -> &str {
        self.inner.replica_id()
    }

    /// The document's root map.
    pub fn root(&self) -> CollaborativeMap {
        self.inner.root.clone()
    }

    /// Create a collaborative string holding `initial`.
    pub fn create_string(&self, initial: &str) -> CollaborativeString {
        let id = ObjectId::new();
        let string = CollaborativeString::attach(id.clone(), Arc::downgrade(&self.inner));
        let delta = string.seed(initial);
        self.inner.register(RemoteObject::String(string.clone()));
        self.inner.record(Mutation::CreateString { id, delta });
        string
    }

    /// Create a collaborative list holding `values`.
    pub fn create_list(&self, values: Vec<Value>) -> CollaborativeList {
        let id = ObjectId::new();
        let list = CollaborativeList::attach(id.clone(), Arc::downgrade(&self.inner));
        let delta = list.seed(values);
        self.inner.register(RemoteObject::List(list.clone()));
        self.inner.record(Mutation::CreateList { id, delta });
        list
    }

    /// Create an empty collaborative map.
    pub fn create_map(&self) -> CollaborativeMap {
        let id = ObjectId::new();
        let map = CollaborativeMap::attach(id.clone(), Arc::downgrade(&self.inner));
        self.inner.register(RemoteObject::Map(map.clone()));
        self.inner.record(Mutation::CreateMap { id });
        map
    }

    /// Look up an object by ID.
    pub fn get_object(&self, id: &ObjectId) -> Option<RemoteObject> {
        self.inner.object(id)
    }

    /// Number of objects in the registry, root included.
    pub fn object_count(&self) -> usize {
        self.inner.objects.read().len()
    }

    /// True if local edits are waiting to be relayed.
    pub fn has_pending(&self) -> bool {
        !self.inner.outbox.lock().is_empty()
    }

    /// Take the mutations produced by local edits since the last call.
    pub fn take_pending(&self) -> Vec<Mutation> {
        std::mem::take(&mut *self.inner.outbox.lock())
    }

    /// Integrate a mutation produced by another replica.
    ///
    /// Listeners of the affected object receive events with
    /// `is_local == false`. Creations are integrated silently.
    pub fn apply_remote(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::CreateString { id, delta } => {
                if self.inner.object(id).is_none() {
                    let string = CollaborativeString::attach(id.clone(), Arc::downgrade(&self.inner));
                    string.integrate_silently(delta);
                    self.inner.register(RemoteObject::String(string));
                }
                Ok(())
            }
            Mutation::CreateList { id, delta } => {
                if self.inner.object(id).is_none() {
                    let list = CollaborativeList::attach(id.clone(), Arc::downgrade(&self.inner));
                    list.integrate_silently(delta);
                    self.inner.register(RemoteObject::List(list));
                }
                Ok(())
            }
            Mutation::CreateMap { id } => {
                if self.inner.object(id).is_none() {
                    let map = CollaborativeMap::attach(id.clone(), Arc::downgrade(&self.inner));
                    self.inner.register(RemoteObject::Map(map));
                }
                Ok(())
            }
            Mutation::Text { id, delta } => match self.lookup(id)? {
                RemoteObject::String(string) => {
                    string.apply_remote(delta);
                    Ok(())
                }
                other => Err(mismatch("EditableString", &other)),
            },
            Mutation::List { id, delta, replace } => match self.lookup(id)? {
                RemoteObject::List(list) => {
                    list.apply_remote(delta, *replace);
                    Ok(())
                }
                other => Err(mismatch("List", &other)),
            },
            Mutation::Map { id, key, register } => match self.lookup(id)? {
                RemoteObject::Map(map) => {
                    self.inner.observe(register.timestamp());
                    map.apply_remote(key, register);
                    Ok(())
                }
                other => Err(mismatch("Map", &other)),
            },
        }
    }

    /// True if both handles refer to the same replica.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lookup(&self, id: &ObjectId) -> Result<RemoteObject> {
        self.inner
            .object(id)
            .ok_or_else(|| RealtimeError::ObjectNotFound(id.to_string()))
    }

    pub(crate) fn owns(&self, model: &Weak<ModelInner>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.inner), model.as_ptr())
    }
}

fn mismatch(expected: &str, found: &RemoteObject) -> RealtimeError {
    RealtimeError::TypeMismatch {
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("replica_id", &self.inner.replica_id)
            .field("objects", &self.object_count())
            .finish()
    }
}
