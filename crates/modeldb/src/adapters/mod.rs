//! Container adapters.
//!
//! An adapter pairs a local observable surface with one collaborative
//! object. Local mutations go straight to the object and are announced on
//! the adapter's `changed` signal before the call returns; events the
//! object raises for those same mutations are recognised by the adapter's
//! [`Origin`](modeldb_realtime::Origin) tag and dropped. Every other event
//! (remote edits, edits through other handles) is translated into exactly
//! one local change.

pub mod json;
pub mod map;
pub mod string;
pub mod undoable;
pub mod vector;

use crate::error::Result;
use modeldb_core::Disposable;
use modeldb_realtime::{ObjectKind, RealtimeError, RemoteObject};
use serde_json::Value;
use std::sync::Arc;

pub use json::RemoteJson;
pub use map::RemoteMap;
pub use string::RemoteString;
pub use undoable::UndoableVector;
pub use vector::RemoteVector;

/// An adapter whose wrapped object can be swapped during reconciliation.
pub trait Synchronizable: Disposable {
    /// Kind of object this adapter wraps.
    fn kind(&self) -> ObjectKind;

    /// The wrapped object.
    fn remote_object(&self) -> RemoteObject;

    /// Replace the wrapped object.
    ///
    /// The adapter's current contents are first drained into `object`;
    /// observers then receive one change describing what `object`
    /// contributed on its own.
    fn rebind(&self, object: RemoteObject) -> Result<()>;
}

/// Equality used by vectors and maps to detect no-op writes and to find
/// values for removal.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

pub(crate) fn json_eq() -> Comparator {
    Arc::new(|a: &Value, b: &Value| a == b)
}

pub(crate) fn wrong_kind(expected: ObjectKind, object: &RemoteObject) -> RealtimeError {
    RealtimeError::TypeMismatch {
        expected: expected.to_string(),
        found: object.kind().to_string(),
    }
}
