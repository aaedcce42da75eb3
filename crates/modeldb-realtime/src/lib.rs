//! # modeldb-realtime
//!
//! An in-memory realtime collaboration model. It stands in for a remote
//! collaborative document service and exposes the primitives the path
//! store binds to:
//!
//! - [`CollaborativeString`] - RGA-backed text
//! - [`CollaborativeList`] - RGA-backed list of JSON values
//! - [`CollaborativeMap`] - last-writer-wins map of JSON values and object references
//! - [`Model`] - a replica's object registry, root map and mutation outbox
//! - [`Document`] - a model plus its collaborators
//! - [`MemoryDrive`] - path resolution, loading and relay between replicas
//!
//! Every object event carries `is_local` and the [`Origin`] of the handle
//! that made the change, so adapters can tell their own echoes apart.

pub mod document;
pub mod error;
pub mod list;
pub mod lwwreg;
pub mod map;
pub mod memory;
pub mod model;
pub mod object;
pub mod resolver;
pub mod rga_list;
pub mod rga_text;
pub mod sequence;
pub mod string;

pub use document::{Collaborator, CollaboratorColors, CollaboratorEvent, Document, DocumentId};
pub use error::{RealtimeError, Result};
pub use list::CollaborativeList;
pub use lwwreg::LWWRegister;
pub use map::{CollaborativeMap, MapEntry};
pub use memory::{DriveSession, MemoryDrive};
pub use model::{Model, Mutation};
pub use object::{EventKind, ObjectId, ObjectKind, Origin, RealtimeEvent, RemoteObject, RemoteValue};
pub use resolver::{DocumentLoader, ResourceResolver};
pub use rga_list::{ListId, RGAList, RGAListDelta};
pub use rga_text::{RGAText, RGATextDelta, TextId};
pub use sequence::{Element, ElementId, SequenceDelta};
pub use string::CollaborativeString;
