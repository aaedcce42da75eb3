//! Store configuration.

use crate::store::PathStore;
use modeldb_realtime::{DocumentLoader, Model, ResourceResolver};
use std::fmt;
use std::sync::Arc;

/// Options for constructing a [`PathStore`].
///
/// Exactly one of these shapes is expected:
/// - `base_db` set: a view over another store at `base_path`
/// - `model` set: a store bound to that model right away
/// - `resolver` and `loader` set: a store that resolves `file_path`
///   in the background, working on a placeholder until it is bound
#[derive(Clone, Default)]
pub struct StoreOptions {
    /// Logical path of the backing document.
    pub file_path: String,
    /// An already loaded model.
    pub model: Option<Model>,
    /// Prefix of a view, relative to `base_db`.
    pub base_path: Option<String>,
    /// Store a view delegates to.
    pub base_db: Option<PathStore>,
    pub resolver: Option<Arc<dyn ResourceResolver>>,
    pub loader: Option<Arc<dyn DocumentLoader>>,
}

impl StoreOptions {
    pub fn builder(file_path: impl Into<String>) -> StoreOptionsBuilder {
        StoreOptionsBuilder::new(file_path)
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("file_path", &self.file_path)
            .field("model", &self.model.as_ref().map(|m| m.replica_id().to_string()))
            .field("base_path", &self.base_path)
            .field("base_db", &self.base_db.is_some())
            .field("resolver", &self.resolver.is_some())
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

/// Builder for store options.
pub struct StoreOptionsBuilder {
    options: StoreOptions,
}

impl StoreOptionsBuilder {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            options: StoreOptions {
                file_path: file_path.into(),
                ..Default::default()
            },
        }
    }

    pub fn model(mut self, model: Model) -> Self {
        self.options.model = Some(model);
        self
    }

    pub fn base(mut self, base_db: PathStore, base_path: impl Into<String>) -> Self {
        self.options.base_db = Some(base_db);
        self.options.base_path = Some(base_path.into());
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ResourceResolver>) -> Self {
        self.options.resolver = Some(resolver);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.options.loader = Some(loader);
        self
    }

    /// Use one service connection as both resolver and loader.
    pub fn backend<B>(self, backend: B) -> Self
    where
        B: ResourceResolver + DocumentLoader + Clone,
    {
        self.resolver(Arc::new(backend.clone()))
            .loader(Arc::new(backend))
    }

    pub fn build(self) -> StoreOptions {
        self.options
    }
}
