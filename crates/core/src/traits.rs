use crate::error::{IndexError, StoreError};
use crate::models::{ChatMessage, IndexEntry, RetrievedPassage};
use async_trait::async_trait;
use uuid::Uuid;

/// Stores chunk vectors partitioned by document and answers nearest-neighbor
/// queries scoped to one document.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replaces any prior entries for `document_id` before adding the new
    /// ones, so re-ingestion never leaves stale chunks queryable.
    async fn upsert(&self, document_id: Uuid, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    /// Up to `top_k` passages sorted by descending cosine similarity, ties
    /// broken by original chunk order. Unknown documents yield an empty list.
    async fn query(
        &self,
        document_id: Uuid,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, IndexError>;

    /// Removes all entries for `document_id`; a no-op when there are none.
    async fn delete(&self, document_id: Uuid) -> Result<(), IndexError>;

    async fn count(&self, document_id: Uuid) -> Result<usize, IndexError>;
}

/// Persistence seam for session history. The relational schema behind it
/// belongs to the persistence collaborator, not this crate.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The most recent `limit` messages of a session, oldest first.
    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    async fn append_message(&self, message: ChatMessage) -> Result<ChatMessage, StoreError>;
}
