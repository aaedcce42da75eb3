//! In-memory collaboration service.
//!
//! `MemoryDrive` plays the part of the remote service: it maps paths to
//! documents, keeps each document's operation log, hands out replicas to
//! sessions and relays mutations between them when [`MemoryDrive::sync`]
//! is called. Late joiners rebuild their replica by replaying the log.

use crate::document::{Collaborator, Document, DocumentId};
use crate::error::{RealtimeError, Result};
use crate::model::{Model, Mutation};
use crate::resolver::{DocumentLoader, ResourceResolver};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use ulid::Ulid;

#[derive(Clone)]
struct Replica {
    session_id: String,
    user_name: String,
    document: Document,
}

#[derive(Default)]
struct StoredDocument {
    /// Encoded mutations in relay order.
    log: Vec<Vec<u8>>,
    replicas: Vec<Replica>,
}

#[derive(Default)]
struct DriveInner {
    paths: RwLock<HashMap<String, DocumentId>>,
    docs: RwLock<HashMap<DocumentId, StoredDocument>>,
}

/// Shared in-memory collaboration service.
#[derive(Clone, Default)]
pub struct MemoryDrive {
    inner: Arc<DriveInner>,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document at `path`, or return the one already there.
    pub fn create_document(&self, path: impl Into<String>) -> DocumentId {
        let path = path.into();
        let mut paths = self.inner.paths.write();
        if let Some(id) = paths.get(&path) {
            return id.clone();
        }
        let id = DocumentId::new();
        self.inner
            .docs
            .write()
            .insert(id.clone(), StoredDocument::default());
        paths.insert(path.clone(), id.clone());
        debug!(path = %path, document_id = %id, "Created document");
        id
    }

    /// Open a session for `user_name`.
    pub fn session(&self, user_name: impl Into<String>) -> DriveSession {
        DriveSession {
            drive: self.clone(),
            session_id: Ulid::new().to_string(),
            user_name: user_name.into(),
        }
    }

    /// Number of mutations recorded for a document.
    pub fn log_len(&self, id: &DocumentId) -> usize {
        self.inner.docs.read().get(id).map_or(0, |d| d.log.len())
    }

    /// Number of open replicas of a document.
    pub fn replica_count(&self, id: &DocumentId) -> usize {
        self.inner.docs.read().get(id).map_or(0, |d| d.replicas.len())
    }

    fn resolve_path(&self, path: &str) -> Result<DocumentId> {
        self.inner
            .paths
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| RealtimeError::PathNotFound(path.to_string()))
    }

    fn open(&self, id: &DocumentId, session_id: &str, user_name: &str) -> Result<Document> {
        let (log, peers) = {
            let docs = self.inner.docs.read();
            let stored = docs
                .get(id)
                .ok_or_else(|| RealtimeError::DocumentNotFound(id.to_string()))?;
            (stored.log.clone(), stored.replicas.clone())
        };

        let model = Model::new();
        for bytes in &log {
            model.apply_remote(&Mutation::decode(bytes)?)?;
        }
        let document = Document::new(id.clone(), model);

        for peer in &peers {
            document.add_collaborator(Collaborator::new(
                peer.session_id.clone(),
                peer.user_name.clone(),
                false,
            ));
        }
        document.add_collaborator(Collaborator::new(session_id, user_name, true));
        for peer in &peers {
            peer.document
                .add_collaborator(Collaborator::new(session_id, user_name, false));
        }

        if let Some(stored) = self.inner.docs.write().get_mut(id) {
            stored.replicas.push(Replica {
                session_id: session_id.to_string(),
                user_name: user_name.to_string(),
                document: document.clone(),
            });
        }
        debug!(
            document_id = %id,
            session_id = %session_id,
            replayed = log.len(),
            "Opened replica"
        );
        Ok(document)
    }

    /// Relay every pending local mutation to the other replicas of its
    /// document, repeating until no replica has anything left to send.
    ///
    /// Returns the number of mutations relayed.
    pub fn sync(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let snapshot: Vec<(DocumentId, Vec<Replica>)> = self
                .inner
                .docs
                .read()
                .iter()
                .map(|(id, stored)| (id.clone(), stored.replicas.clone()))
                .collect();

            let mut round = 0;
            for (id, replicas) in snapshot {
                for (i, source) in replicas.iter().enumerate() {
                    let pending = source.document.model().take_pending();
                    if pending.is_empty() {
                        continue;
                    }
                    let mut encoded = Vec::with_capacity(pending.len());
                    for mutation in &pending {
                        encoded.push(mutation.encode()?);
                    }
                    if let Some(stored) = self.inner.docs.write().get_mut(&id) {
                        stored.log.extend(encoded.iter().cloned());
                    }
                    for (j, target) in replicas.iter().enumerate() {
                        if i == j {
                            continue;
                        }
                        for bytes in &encoded {
                            target
                                .document
                                .model()
                                .apply_remote(&Mutation::decode(bytes)?)?;
                        }
                    }
                    round += pending.len();
                }
            }

            if round == 0 {
                break;
            }
            debug!(relayed = round, "Sync round");
            total += round;
        }
        Ok(total)
    }

    /// Close every replica opened by `session_id`.
    pub fn leave(&self, session_id: &str) {
        let mut notify = Vec::new();
        {
            let mut docs = self.inner.docs.write();
            for stored in docs.values_mut() {
                let before = stored.replicas.len();
                stored.replicas.retain(|r| r.session_id != session_id);
                if stored.replicas.len() != before {
                    notify.extend(stored.replicas.iter().map(|r| r.document.clone()));
                }
            }
        }
        for document in notify {
            document.remove_collaborator(session_id);
        }
        debug!(session_id = %session_id, "Session left");
    }
}

/// One participant's connection to a [`MemoryDrive`].
#[derive(Clone)]
pub struct DriveSession {
    drive: MemoryDrive,
    session_id: String,
    user_name: String,
}

impl DriveSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn drive(&self) -> &MemoryDrive {
        &self.drive
    }

    /// Close every replica this session opened.
    pub fn leave(&self) {
        self.drive.leave(&self.session_id);
    }
}

#[async_trait]
impl ResourceResolver for DriveSession {
    async fn resolve(&self, path: &str) -> Result<DocumentId> {
        self.drive.resolve_path(path)
    }
}

#[async_trait]
impl DocumentLoader for DriveSession {
    async fn load(&self, id: &DocumentId) -> Result<Document> {
        self.drive.open(id, &self.session_id, &self.user_name)
    }
}

impl std::fmt::Debug for DriveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSession")
            .field("session_id", &self.session_id)
            .field("user_name", &self.user_name)
            .finish()
    }
}
