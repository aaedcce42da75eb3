//! Service-facing traits: locating a document by path and loading it.

use crate::document::{Document, DocumentId};
use crate::error::Result;
use async_trait::async_trait;

/// Maps a logical file path to the id of the document holding it.
#[async_trait]
pub trait ResourceResolver: Send + Sync + 'static {
    async fn resolve(&self, path: &str) -> Result<DocumentId>;
}

/// Opens a document, returning the authoritative replica.
#[async_trait]
pub trait DocumentLoader: Send + Sync + 'static {
    async fn load(&self, id: &DocumentId) -> Result<Document>;
}
