//! # modeldb
//!
//! A path-keyed observable data model that lives on top of a realtime
//! collaborative document.
//!
//! A [`PathStore`] hands out observable containers ([`RemoteVector`],
//! [`RemoteString`], [`RemoteMap`], [`RemoteJson`], [`UndoableVector`])
//! and scalar values at string paths. It is usable immediately: until the
//! document behind its file path has been resolved and loaded, everything
//! lives on an in-memory placeholder. When the document arrives, each
//! container is rebound onto the document's objects and local edits made
//! in the meantime are merged in.
//!
//! ```ignore
//! let drive = MemoryDrive::new();
//! drive.create_document("notes.json");
//! let store = PathStore::new(
//!     StoreOptions::builder("notes.json")
//!         .backend(drive.session("alice"))
//!         .build(),
//! )?;
//! let todos = store.create_vector("todos")?;
//! todos.push_back(json!("write docs"));
//! store.connected().await?;
//! ```

pub mod adapters;
pub mod collaborators;
pub mod error;
pub mod options;
pub mod store;

pub use adapters::{
    Comparator, RemoteJson, RemoteMap, RemoteString, RemoteVector, Synchronizable, UndoableVector,
};
pub use collaborators::CollaboratorMap;
pub use error::{ModelDbError, Result};
pub use options::{StoreOptions, StoreOptionsBuilder};
pub use store::{ConnectionState, PathStore, StoreValue};

pub use modeldb_core::{
    ChangeSignal, Disposable, ListenerId, MapChange, MapChangeType, ScalarValue, StringChange,
    StringChangeType, ValueChange, VectorChange, VectorChangeType,
};

/// Common imports.
pub mod prelude {
    pub use crate::adapters::{
        RemoteJson, RemoteMap, RemoteString, RemoteVector, Synchronizable, UndoableVector,
    };
    pub use crate::error::{ModelDbError, Result};
    pub use crate::options::StoreOptions;
    pub use crate::store::{ConnectionState, PathStore};
    pub use modeldb_core::{Disposable, ScalarValue};
    pub use modeldb_realtime::{MemoryDrive, Model};
}
