//! PathStore - a path-keyed observable store over a collaborative document.
//!
//! A root store owns the document binding. Until the document named by its
//! file path has been resolved and loaded it works on an in-memory
//! placeholder; once the real document arrives, every container handed
//! out so far is rebound onto it and the placeholder's state is merged in.
//!
//! A view is a store scoped to a path prefix. It forwards every read and
//! write to its base with the prefix prepended, and keeps its own index
//! and disposal set.

use crate::adapters::{
    RemoteJson, RemoteMap, RemoteString, RemoteVector, Synchronizable, UndoableVector,
};
use crate::collaborators::CollaboratorMap;
use crate::error::{ModelDbError, Result};
use crate::options::StoreOptions;
use modeldb_core::{Disposable, ListenerId, ScalarValue};
use modeldb_realtime::{
    Document, DocumentId, DocumentLoader, Model, ObjectKind, RemoteObject, RemoteValue,
    ResourceResolver,
};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle of a store's document binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Working on a placeholder; resolution not started.
    Unbound,
    /// Working on a placeholder while the document is resolved and loaded.
    Resolving,
    /// Bound to the authoritative document.
    Bound,
    /// Resolution, loading or reconciliation failed. The placeholder stays.
    Failed(ModelDbError),
    Disposed,
}

/// Something that can be stored at a path.
#[derive(Clone)]
pub enum StoreValue {
    /// A plain JSON value.
    Json(Value),
    /// A scalar kept in sync with the value at the path.
    Value(ScalarValue),
    /// A container adapter; its collaborative object is stored at the path.
    Container(Arc<dyn Synchronizable>),
}

impl fmt::Debug for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            StoreValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            StoreValue::Container(c) => f.debug_tuple("Container").field(&c.kind()).finish(),
        }
    }
}

impl StoreValue {
    /// True if both refer to the same container or scalar, or to equal JSON.
    fn same_entry(&self, other: &StoreValue) -> bool {
        match (self, other) {
            (StoreValue::Json(a), StoreValue::Json(b)) => a == b,
            (StoreValue::Value(a), StoreValue::Value(b)) => a.ptr_eq(b),
            (StoreValue::Container(a), StoreValue::Container(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn is_disposed(&self) -> bool {
        match self {
            StoreValue::Json(_) => false,
            StoreValue::Value(v) => v.is_disposed(),
            StoreValue::Container(c) => c.is_disposed(),
        }
    }
}

impl From<Value> for StoreValue {
    fn from(value: Value) -> Self {
        StoreValue::Json(value)
    }
}

impl From<ScalarValue> for StoreValue {
    fn from(value: ScalarValue) -> Self {
        StoreValue::Value(value)
    }
}

macro_rules! container_value {
    ($($adapter:ty),*) => {
        $(
            impl From<$adapter> for StoreValue {
                fn from(adapter: $adapter) -> Self {
                    StoreValue::Container(Arc::new(adapter))
                }
            }
        )*
    };
}

container_value!(RemoteString, RemoteVector, UndoableVector, RemoteMap, RemoteJson);

struct Binding {
    document: Option<Document>,
    model: Option<Model>,
    root: Option<RemoteMap>,
    collaborators: Option<CollaboratorMap>,
}

/// Keeps a scalar and the value at its path equal in both directions.
struct Bridge {
    value: ScalarValue,
    value_listener: ListenerId,
    root: RemoteMap,
    root_listener: ListenerId,
}

impl Bridge {
    fn disconnect(self) {
        self.value.changed().disconnect(self.value_listener);
        self.root.changed().disconnect(self.root_listener);
    }
}

struct RootState {
    resolver: Option<Arc<dyn ResourceResolver>>,
    loader: Option<Arc<dyn DocumentLoader>>,
    binding: RwLock<Binding>,
    state: watch::Sender<ConnectionState>,
    prepopulated: AtomicBool,
    bridges: Mutex<HashMap<String, Bridge>>,
    /// Held by binding and by every path write, so a write lands either
    /// wholly on the placeholder before the swap or wholly after it.
    exclusive: ReentrantMutex<()>,
}

impl RootState {
    fn root_adapter(&self) -> Option<RemoteMap> {
        self.binding.read().root.clone()
    }

    fn current_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    fn remove_bridge(&self, path: &str) {
        let bridge = self.bridges.lock().remove(path);
        if let Some(bridge) = bridge {
            bridge.disconnect();
        }
    }

    /// Disconnect bridges whose scalar has been disposed.
    fn prune_bridges(&self) {
        let stale: Vec<Bridge> = {
            let mut bridges = self.bridges.lock();
            let paths: Vec<String> = bridges
                .iter()
                .filter(|(_, b)| b.value.is_disposed())
                .map(|(path, _)| path.clone())
                .collect();
            paths.iter().filter_map(|p| bridges.remove(p)).collect()
        };
        for bridge in stale {
            bridge.disconnect();
        }
    }

    /// Forget `path` if it still holds `entry`.
    fn forget(&self, index: &RwLock<HashMap<String, StoreValue>>, path: &str, entry: &StoreValue) {
        remove_if_same(index, path, entry);
        let bridged = match (self.bridges.lock().get(path), entry) {
            (Some(bridge), StoreValue::Value(scalar)) => bridge.value.ptr_eq(scalar),
            _ => false,
        };
        if bridged {
            self.remove_bridge(path);
        }
    }
}

enum Role {
    Root(RootState),
    View { base: PathStore, base_path: String },
}

struct StoreInner {
    file_path: String,
    role: Role,
    /// Path to entry, relative to this store. Survives document swaps.
    index: RwLock<HashMap<String, StoreValue>>,
    disposables: Mutex<Vec<Arc<dyn Disposable>>>,
    disposed: AtomicBool,
}

/// A hierarchical, path-keyed store of observable containers.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct PathStore {
    inner: Arc<StoreInner>,
}

impl PathStore {
    /// Create a store from `options`.
    ///
    /// A root store given a resolver and loader starts resolving right away
    /// when called inside a tokio runtime; otherwise it stays `Unbound`
    /// until [`PathStore::resolve`] is awaited.
    pub fn new(options: StoreOptions) -> Result<Self> {
        let StoreOptions {
            file_path,
            model,
            base_path,
            base_db,
            resolver,
            loader,
        } = options;

        if let Some(base) = base_db {
            base.ensure_live()?;
            let base_path = base_path.unwrap_or_default();
            let file_path = if file_path.is_empty() {
                base.file_path().to_string()
            } else {
                file_path
            };
            debug!(file_path = %file_path, base_path = %base_path, "Created view");
            return Ok(Self::from_role(file_path, Role::View { base, base_path }));
        }

        if let Some(model) = model {
            let document = Document::new(DocumentId::from_string(file_path.clone()), model.clone());
            let prepopulated = !model.root().is_empty();
            let root = RootState {
                resolver,
                loader,
                binding: RwLock::new(Binding {
                    collaborators: Some(CollaboratorMap::new(&document)),
                    root: Some(RemoteMap::new(model.root())),
                    document: Some(document),
                    model: Some(model),
                }),
                state: watch::channel(ConnectionState::Bound).0,
                prepopulated: AtomicBool::new(prepopulated),
                bridges: Mutex::new(HashMap::new()),
                exclusive: ReentrantMutex::new(()),
            };
            info!(file_path = %file_path, prepopulated, "Created store on supplied model");
            return Ok(Self::from_role(file_path, Role::Root(root)));
        }

        if resolver.is_none() || loader.is_none() {
            return Err(ModelDbError::Config(
                "a root store needs a model, or both a resolver and a loader".to_string(),
            ));
        }

        let placeholder = Document::placeholder();
        let root = RootState {
            resolver,
            loader,
            binding: RwLock::new(Binding {
                root: Some(RemoteMap::new(placeholder.model().root())),
                model: Some(placeholder.model().clone()),
                document: Some(placeholder),
                collaborators: None,
            }),
            state: watch::channel(ConnectionState::Unbound).0,
            prepopulated: AtomicBool::new(false),
            bridges: Mutex::new(HashMap::new()),
            exclusive: ReentrantMutex::new(()),
        };
        let store = Self::from_role(file_path, Role::Root(root));

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            if store.begin_resolution() {
                let weak = Arc::downgrade(&store.inner);
                handle.spawn(async move {
                    if let Err(err) = run_resolution(weak).await {
                        debug!(error = %err, "Background resolution ended without binding");
                    }
                });
            }
        } else {
            debug!(file_path = %store.file_path(), "No runtime; resolution deferred");
        }
        Ok(store)
    }

    fn from_role(file_path: String, role: Role) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                file_path,
                role,
                index: RwLock::new(HashMap::new()),
                disposables: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn file_path(&self) -> &str {
        &self.inner.file_path
    }

    /// Prefix of a view relative to its base; empty for a root store.
    pub fn base_path(&self) -> &str {
        match &self.inner.role {
            Role::Root(_) => "",
            Role::View { base_path, .. } => base_path,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self.inner.role, Role::View { .. })
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_disposed() {
            return ConnectionState::Disposed;
        }
        self.root_state().current_state()
    }

    /// The bound model, or `None` while unbound, failed or disposed.
    pub fn model(&self) -> Option<Model> {
        let root = self.root_state();
        if root.current_state() != ConnectionState::Bound {
            return None;
        }
        root.binding.read().model.clone()
    }

    /// The bound document, or `None` while unbound, failed or disposed.
    pub fn document(&self) -> Option<Document> {
        let root = self.root_state();
        if root.current_state() != ConnectionState::Bound {
            return None;
        }
        root.binding.read().document.clone()
    }

    /// Collaborators of the bound document.
    pub fn collaborators(&self) -> Option<CollaboratorMap> {
        let root = self.root_state();
        if root.current_state() != ConnectionState::Bound {
            return None;
        }
        root.binding.read().collaborators.clone()
    }

    /// True if the document root already had entries when it was bound.
    pub fn is_prepopulated(&self) -> bool {
        self.root_state().prepopulated.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Wait until the store is bound to its document.
    ///
    /// Returns the failure if resolution or loading failed, and
    /// [`ModelDbError::Disposed`] if the store was disposed first.
    pub async fn connected(&self) -> Result<()> {
        let mut rx = self.root_state().state.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                ConnectionState::Bound => return Ok(()),
                ConnectionState::Failed(err) => return Err(err),
                ConnectionState::Disposed => return Err(ModelDbError::Disposed),
                ConnectionState::Unbound | ConnectionState::Resolving => {}
            }
            if rx.changed().await.is_err() {
                return Err(ModelDbError::Disposed);
            }
        }
    }

    /// Resolve and bind now. Needed when the store was created outside a
    /// tokio runtime; otherwise waits for the running resolution.
    pub async fn resolve(&self) -> Result<()> {
        let root = self.root_store();
        if root.begin_resolution() {
            run_resolution(Arc::downgrade(&root.inner)).await
        } else {
            self.connected().await
        }
    }

    // ------------------------------------------------------------------
    // Path operations
    // ------------------------------------------------------------------

    pub fn has(&self, path: &str) -> bool {
        match &self.inner.role {
            Role::View { base, base_path } => base.has(&join(base_path, path)),
            Role::Root(root) => root.root_adapter().map_or(false, |r| r.has(path)),
        }
    }

    /// JSON snapshot of the entry at `path`; containers render their contents.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.remote_value(path).map(|v| v.to_json())
    }

    /// The plain JSON value at `path`, if it holds one.
    pub fn get_value(&self, path: &str) -> Option<Value> {
        match self.remote_value(path)? {
            RemoteValue::Json(v) => Some(v),
            RemoteValue::Object(_) => None,
        }
    }

    /// Store a plain JSON value at `path`.
    pub fn set_value(&self, path: &str, value: Value) -> Result<()> {
        self.set(path, StoreValue::Json(value))
    }

    /// The collaborative object stored at `path`.
    pub(crate) fn remote_object(&self, path: &str) -> Option<RemoteObject> {
        match self.remote_value(path)? {
            RemoteValue::Object(o) => Some(o),
            RemoteValue::Json(_) => None,
        }
    }

    fn remote_value(&self, path: &str) -> Option<RemoteValue> {
        match &self.inner.role {
            Role::View { base, base_path } => base.remote_value(&join(base_path, path)),
            Role::Root(root) => root.root_adapter()?.primitive().get(path),
        }
    }

    /// Store `value` at `path` and record it in this store's index.
    ///
    /// Containers store their collaborative object. A [`ScalarValue`]
    /// stores its current value and stays bridged to the path: changes on
    /// either side are copied to the other unless already equal.
    pub fn set(&self, path: &str, value: impl Into<StoreValue>) -> Result<()> {
        let _exclusive = self.exclusive();
        self.ensure_live()?;
        let value = value.into();
        match &self.inner.role {
            Role::View { base, base_path } => base.set(&join(base_path, path), value.clone())?,
            Role::Root(root) => self.write_root(root, path, &value)?,
        }
        self.inner.index.write().insert(path.to_string(), value);
        Ok(())
    }

    fn write_root(&self, root: &RootState, path: &str, value: &StoreValue) -> Result<()> {
        let adapter = root.root_adapter().ok_or(ModelDbError::Disposed)?;
        root.prune_bridges();
        match value {
            StoreValue::Json(v) => {
                root.remove_bridge(path);
                adapter.set(path, v.clone());
            }
            StoreValue::Container(container) => {
                root.remove_bridge(path);
                let object = container.remote_object();
                let primitive = adapter.primitive();
                let already = matches!(
                    primitive.get(path),
                    Some(RemoteValue::Object(current)) if current.same_object(&object)
                );
                if !already {
                    primitive.set(path, RemoteValue::Object(object))?;
                }
            }
            StoreValue::Value(scalar) => {
                root.remove_bridge(path);
                adapter.set(path, scalar.get());
                let bridge = self.bridge(path, scalar, &adapter);
                root.bridges.lock().insert(path.to_string(), bridge);
            }
        }
        Ok(())
    }

    fn bridge(&self, path: &str, scalar: &ScalarValue, adapter: &RemoteMap) -> Bridge {
        let store = Arc::downgrade(&self.inner);
        let key = path.to_string();
        let value_listener = scalar.changed().connect(move |change| {
            let Some(inner) = store.upgrade() else {
                return;
            };
            let Role::Root(root) = &inner.role else {
                return;
            };
            let _exclusive = root.exclusive.lock();
            if let Some(current) = root.root_adapter() {
                if current.get(&key).as_ref() != Some(&change.new_value) {
                    current.set(&key, change.new_value.clone());
                }
            }
        });

        let key = path.to_string();
        let target = scalar.clone();
        let root_listener = adapter.changed().connect(move |change| {
            if change.key != key || target.is_disposed() {
                return;
            }
            if let Some(new_value) = &change.new_value {
                if *new_value != target.get() {
                    target.set(new_value.clone());
                }
            }
        });

        Bridge {
            value: scalar.clone(),
            value_listener,
            root: adapter.clone(),
            root_listener,
        }
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    /// Adopt the string at `path` or create one.
    pub fn create_string(&self, path: &str) -> Result<RemoteString> {
        let _exclusive = self.exclusive();
        let string = match self.adopt_or_create(path, ObjectKind::EditableString)? {
            RemoteObject::String(s) => s,
            other => return Err(kind_mismatch(path, ObjectKind::EditableString, &other)),
        };
        self.install(path, RemoteString::new(string))
    }

    /// Adopt the list at `path` or create one.
    pub fn create_vector(&self, path: &str) -> Result<RemoteVector> {
        let _exclusive = self.exclusive();
        let list = self.adopt_list(path)?;
        self.install(path, RemoteVector::new(list))
    }

    pub fn create_undoable_vector(&self, path: &str) -> Result<UndoableVector> {
        let _exclusive = self.exclusive();
        let list = self.adopt_list(path)?;
        self.install(path, UndoableVector::new(list))
    }

    /// Adopt the map at `path` or create one.
    pub fn create_map(&self, path: &str) -> Result<RemoteMap> {
        let _exclusive = self.exclusive();
        let map = self.adopt_map(path)?;
        self.install(path, RemoteMap::new(map))
    }

    pub fn create_json(&self, path: &str) -> Result<RemoteJson> {
        let _exclusive = self.exclusive();
        let map = self.adopt_map(path)?;
        self.install(path, RemoteJson::new(map))
    }

    /// A scalar bridged to `path`, starting from the JSON already there.
    pub fn create_value(&self, path: &str) -> Result<ScalarValue> {
        let _exclusive = self.exclusive();
        self.ensure_live()?;
        if let Some(object) = self.remote_object(path) {
            return Err(ModelDbError::KindMismatch {
                path: path.to_string(),
                expected: "Value".to_string(),
                found: object.kind().to_string(),
            });
        }
        let value = ScalarValue::new(self.get_value(path).unwrap_or(Value::Null));
        self.register(value.clone());
        self.set(path, value.clone())?;
        Ok(value)
    }

    /// A store scoped to `base_path` under this one.
    pub fn view(&self, base_path: impl Into<String>) -> Result<PathStore> {
        PathStore::new(
            StoreOptions::builder(self.file_path())
                .base(self.clone(), base_path)
                .build(),
        )
    }

    fn adopt_list(&self, path: &str) -> Result<modeldb_realtime::CollaborativeList> {
        match self.adopt_or_create(path, ObjectKind::List)? {
            RemoteObject::List(l) => Ok(l),
            other => Err(kind_mismatch(path, ObjectKind::List, &other)),
        }
    }

    fn adopt_map(&self, path: &str) -> Result<modeldb_realtime::CollaborativeMap> {
        match self.adopt_or_create(path, ObjectKind::Map)? {
            RemoteObject::Map(m) => Ok(m),
            other => Err(kind_mismatch(path, ObjectKind::Map, &other)),
        }
    }

    fn adopt_or_create(&self, path: &str, kind: ObjectKind) -> Result<RemoteObject> {
        self.ensure_live()?;
        match self.remote_value(path) {
            Some(RemoteValue::Object(object)) if object.kind() == kind => {
                debug!(path = %path, kind = %kind, "Adopting existing object");
                Ok(object)
            }
            Some(RemoteValue::Object(object)) => Err(kind_mismatch(path, kind, &object)),
            Some(RemoteValue::Json(_)) => Err(ModelDbError::KindMismatch {
                path: path.to_string(),
                expected: kind.to_string(),
                found: "Json".to_string(),
            }),
            None => Ok(create_object(&self.current_model()?, kind)),
        }
    }

    fn install<A>(&self, path: &str, adapter: A) -> Result<A>
    where
        A: Disposable + Clone + Into<StoreValue> + 'static,
    {
        self.register(adapter.clone());
        self.set(path, adapter.clone())?;
        Ok(adapter)
    }

    fn register<D: Disposable + 'static>(&self, disposable: D) {
        self.inner.disposables.lock().push(Arc::new(disposable));
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Release every container this store created. Root stores also drop
    /// their document binding. Calling again does nothing.
    pub fn dispose(&self) {
        let _exclusive = self.exclusive();
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let disposables: Vec<_> = self.inner.disposables.lock().drain(..).collect();
        for disposable in &disposables {
            disposable.dispose();
        }
        let entries: Vec<(String, StoreValue)> = self.inner.index.write().drain().collect();

        if let Role::View { base, base_path } = &self.inner.role {
            for (path, entry) in &entries {
                base.forget(&join(base_path, path), entry);
            }
        }

        if let Role::Root(root) = &self.inner.role {
            let bridges: Vec<_> = root.bridges.lock().drain().map(|(_, b)| b).collect();
            for bridge in bridges {
                bridge.disconnect();
            }
            let (adapter, collaborators) = {
                let mut binding = root.binding.write();
                binding.document = None;
                binding.model = None;
                (binding.root.take(), binding.collaborators.take())
            };
            if let Some(adapter) = adapter {
                adapter.dispose();
            }
            if let Some(collaborators) = collaborators {
                collaborators.dispose();
            }
            root.state.send_replace(ConnectionState::Disposed);
        }
        info!(
            file_path = %self.inner.file_path,
            base_path = %self.base_path(),
            containers = disposables.len(),
            "Store disposed"
        );
    }

    /// Drop `path` from this store and its bases if it still holds `entry`.
    fn forget(&self, path: &str, entry: &StoreValue) {
        match &self.inner.role {
            Role::View { base, base_path } => {
                remove_if_same(&self.inner.index, path, entry);
                base.forget(&join(base_path, path), entry);
            }
            Role::Root(root) => root.forget(&self.inner.index, path, entry),
        }
    }

    fn exclusive(&self) -> ReentrantMutexGuard<'_, ()> {
        self.root_state().exclusive.lock()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ModelDbError::Disposed);
        }
        match &self.inner.role {
            Role::View { base, .. } => base.ensure_live(),
            Role::Root(_) => Ok(()),
        }
    }

    fn root_state(&self) -> &RootState {
        match &self.inner.role {
            Role::Root(root) => root,
            Role::View { base, .. } => base.root_state(),
        }
    }

    fn root_store(&self) -> PathStore {
        match &self.inner.role {
            Role::Root(_) => self.clone(),
            Role::View { base, .. } => base.root_store(),
        }
    }

    fn current_model(&self) -> Result<Model> {
        self.root_state()
            .binding
            .read()
            .model
            .clone()
            .ok_or(ModelDbError::Disposed)
    }

    /// Move `Unbound` to `Resolving`. Returns false if resolution already
    /// started or the store is past it.
    fn begin_resolution(&self) -> bool {
        self.root_state().state.send_if_modified(|state| {
            if *state == ConnectionState::Unbound {
                *state = ConnectionState::Resolving;
                true
            } else {
                false
            }
        })
    }

    fn fail(&self, err: ModelDbError) -> ModelDbError {
        if !self.is_disposed() {
            warn!(file_path = %self.inner.file_path, error = %err, "Store failed");
            self.root_state()
                .state
                .send_replace(ConnectionState::Failed(err.clone()));
        }
        err
    }

    /// Swap the placeholder for `document` and reconcile.
    fn bind(&self, document: Document) -> Result<()> {
        let Role::Root(root) = &self.inner.role else {
            return Ok(());
        };
        let _exclusive = root.exclusive.lock();
        if self.is_disposed() {
            debug!(file_path = %self.inner.file_path, "Ignoring document loaded after disposal");
            return Err(ModelDbError::Disposed);
        }

        let model = document.model().clone();
        let authoritative = model.root();
        root.prune_bridges();
        let mut entries: Vec<(String, StoreValue)> = {
            let mut index = self.inner.index.write();
            index.retain(|_, entry| !entry.is_disposed());
            index.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, entry) in &entries {
            let StoreValue::Container(container) = entry else {
                continue;
            };
            let found = match authoritative.get(path) {
                Some(RemoteValue::Object(object)) if object.kind() != container.kind() => {
                    object.kind().to_string()
                }
                Some(RemoteValue::Json(_)) => "Json".to_string(),
                _ => continue,
            };
            return Err(self.fail(ModelDbError::KindMismatch {
                path: path.clone(),
                expected: container.kind().to_string(),
                found,
            }));
        }

        let prepopulated = !authoritative.is_empty();
        root.prepopulated.store(prepopulated, Ordering::SeqCst);
        let new_root = RemoteMap::new(authoritative);
        let (old_root, old_collaborators) = {
            let mut binding = root.binding.write();
            binding.document = Some(document.clone());
            binding.model = Some(model.clone());
            (
                binding.root.replace(new_root.clone()),
                binding.collaborators.take(),
            )
        };

        for (path, entry) in &entries {
            match entry {
                StoreValue::Container(container) => {
                    let primitive = new_root.primitive();
                    match primitive.get(path) {
                        Some(RemoteValue::Object(object)) => {
                            container.rebind(object).map_err(|e| self.fail(e))?;
                        }
                        _ => {
                            let object = create_object(&model, container.kind());
                            container.rebind(object.clone()).map_err(|e| self.fail(e))?;
                            primitive
                                .set(path, RemoteValue::Object(object))
                                .map_err(|e| self.fail(e.into()))?;
                        }
                    }
                    debug!(path = %path, kind = %container.kind(), "Reconciled container");
                }
                StoreValue::Value(scalar) => {
                    self.set(path, StoreValue::Value(scalar.clone()))?;
                    debug!(path = %path, "Reconciled value");
                }
                StoreValue::Json(value) => {
                    new_root.set(path, value.clone());
                }
            }
        }

        if let Some(old_root) = old_root {
            old_root.dispose();
        }
        if let Some(old) = old_collaborators {
            old.dispose();
        }
        root.binding.write().collaborators = Some(CollaboratorMap::new(&document));
        root.state.send_replace(ConnectionState::Bound);
        info!(
            file_path = %self.inner.file_path,
            document_id = %document.id(),
            prepopulated,
            paths = entries.len(),
            "Store bound"
        );
        Ok(())
    }
}

async fn run_resolution(store: Weak<StoreInner>) -> Result<()> {
    let (resolver, loader, file_path) = {
        let inner = store.upgrade().ok_or(ModelDbError::Disposed)?;
        let Role::Root(root) = &inner.role else {
            return Ok(());
        };
        match (&root.resolver, &root.loader) {
            (Some(resolver), Some(loader)) => {
                (resolver.clone(), loader.clone(), inner.file_path.clone())
            }
            _ => return Err(ModelDbError::Config("missing resolver or loader".to_string())),
        }
    };

    info!(file_path = %file_path, "Resolving document");
    let resolved = resolver.resolve(&file_path).await;
    let id = match resolved {
        Ok(id) => id,
        Err(err) => return Err(fail_weak(&store, ModelDbError::Resolution(err))),
    };
    debug!(file_path = %file_path, document_id = %id, "Resolved");

    let loaded = loader.load(&id).await;
    let document = match loaded {
        Ok(document) => document,
        Err(err) => return Err(fail_weak(&store, ModelDbError::Load(err))),
    };

    let inner = store.upgrade().ok_or(ModelDbError::Disposed)?;
    PathStore { inner }.bind(document)
}

fn fail_weak(store: &Weak<StoreInner>, err: ModelDbError) -> ModelDbError {
    match store.upgrade() {
        Some(inner) => PathStore { inner }.fail(err),
        None => err,
    }
}

fn create_object(model: &Model, kind: ObjectKind) -> RemoteObject {
    match kind {
        ObjectKind::EditableString => RemoteObject::String(model.create_string("")),
        ObjectKind::List => RemoteObject::List(model.create_list(Vec::new())),
        ObjectKind::Map => RemoteObject::Map(model.create_map()),
    }
}

fn kind_mismatch(path: &str, expected: ObjectKind, found: &RemoteObject) -> ModelDbError {
    ModelDbError::KindMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

fn remove_if_same(index: &RwLock<HashMap<String, StoreValue>>, path: &str, entry: &StoreValue) {
    let mut index = index.write();
    if index.get(path).map_or(false, |current| current.same_entry(entry)) {
        index.remove(path);
    }
}

fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

impl fmt::Debug for PathStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathStore")
            .field("file_path", &self.inner.file_path)
            .field("base_path", &self.base_path())
            .field("state", &self.state())
            .field("paths", &self.inner.index.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bound_store() -> PathStore {
        PathStore::new(StoreOptions::builder("doc.json").model(Model::new()).build()).unwrap()
    }

    #[test]
    fn test_supplied_model_is_bound() {
        let store = bound_store();
        assert_eq!(store.state(), ConnectionState::Bound);
        assert!(store.model().is_some());
        assert!(!store.is_prepopulated());
        assert!(futures::executor::block_on(store.connected()).is_ok());
    }

    #[test]
    fn test_missing_backend_is_config_error() {
        let err = PathStore::new(StoreOptions::builder("doc.json").build()).unwrap_err();
        assert!(matches!(err, ModelDbError::Config(_)));
    }

    #[test]
    fn test_remote_object_lookup() {
        let store = bound_store();
        let vector = store.create_vector("items").unwrap();
        let object = store.remote_object("items").unwrap();
        assert!(object.same_object(&vector.remote_object()));
        store.set_value("plain", json!(1)).unwrap();
        assert!(store.remote_object("plain").is_none());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a/b", "c"), "a/b/c");
    }
}
