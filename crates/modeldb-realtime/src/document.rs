//! Documents and their collaborators.

use crate::model::Model;
use chrono::{DateTime, Utc};
use modeldb_core::{ChangeSignal, ListenerId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Identifier of a document held by the collaboration service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Color palette for collaborators.
pub struct CollaboratorColors;

impl CollaboratorColors {
    pub const COLORS: [&'static str; 12] = [
        "#E91E63", // Pink
        "#9C27B0", // Purple
        "#3F51B5", // Indigo
        "#2196F3", // Blue
        "#00BCD4", // Cyan
        "#009688", // Teal
        "#4CAF50", // Green
        "#8BC34A", // Light Green
        "#CDDC39", // Lime
        "#FF9800", // Orange
        "#FF5722", // Deep Orange
        "#795548", // Brown
    ];

    /// Get a color for a session based on its ID.
    pub fn color_for(session_id: &str) -> &'static str {
        let hash: usize = session_id.bytes().map(|b| b as usize).sum();
        Self::COLORS[hash % Self::COLORS.len()]
    }
}

/// A participant with the document open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub session_id: String,
    pub user_name: String,
    pub color: String,
    /// True for the participant owning this replica.
    pub is_local: bool,
    pub joined_at: DateTime<Utc>,
}

impl Collaborator {
    pub fn new(session_id: impl Into<String>, user_name: impl Into<String>, is_local: bool) -> Self {
        let session_id = session_id.into();
        let color = CollaboratorColors::color_for(&session_id).to_string();
        Self {
            session_id,
            user_name: user_name.into(),
            color,
            is_local,
            joined_at: Utc::now(),
        }
    }
}

/// Events emitted when the set of collaborators changes.
#[derive(Clone, Debug, PartialEq)]
pub enum CollaboratorEvent {
    Joined(Collaborator),
    Left(Collaborator),
}

struct DocumentInner {
    id: DocumentId,
    model: Model,
    collaborators: RwLock<Vec<Collaborator>>,
    events: ChangeSignal<CollaboratorEvent>,
}

/// A loaded document: one replica of its model plus who else has it open.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    pub fn new(id: DocumentId, model: Model) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                id,
                model,
                collaborators: RwLock::new(Vec::new()),
                events: ChangeSignal::new(),
            }),
        }
    }

    /// An in-memory document with a fresh model, not backed by any service.
    pub fn placeholder() -> Self {
        Self::new(DocumentId::new(), Model::new())
    }

    pub fn id(&self) -> &DocumentId {
        &self.inner.id
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    /// Current collaborators, in join order.
    pub fn collaborators(&self) -> Vec<Collaborator> {
        self.inner.collaborators.read().clone()
    }

    pub fn collaborator(&self, session_id: &str) -> Option<Collaborator> {
        self.inner
            .collaborators
            .read()
            .iter()
            .find(|c| c.session_id == session_id)
            .cloned()
    }

    pub fn on_collaborator_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CollaboratorEvent) + Send + Sync + 'static,
    {
        self.inner.events.connect(listener)
    }

    pub fn remove_collaborator_listener(&self, id: ListenerId) -> bool {
        self.inner.events.disconnect(id)
    }

    pub fn remove_all_collaborator_listeners(&self) {
        self.inner.events.clear();
    }

    /// Record a collaborator joining. Ignored if the session is already present.
    pub fn add_collaborator(&self, collaborator: Collaborator) {
        {
            let mut list = self.inner.collaborators.write();
            if list.iter().any(|c| c.session_id == collaborator.session_id) {
                return;
            }
            list.push(collaborator.clone());
        }
        self.inner
            .events
            .emit(&CollaboratorEvent::Joined(collaborator));
    }

    /// Record a collaborator leaving.
    pub fn remove_collaborator(&self, session_id: &str) -> Option<Collaborator> {
        let removed = {
            let mut list = self.inner.collaborators.write();
            let pos = list.iter().position(|c| c.session_id == session_id)?;
            list.remove(pos)
        };
        self.inner
            .events
            .emit(&CollaboratorEvent::Left(removed.clone()));
        Some(removed)
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.inner.id)
            .field("model", &self.inner.model)
            .field("collaborators", &self.inner.collaborators.read().len())
            .finish()
    }
}
