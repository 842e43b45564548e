use crate::embeddings::Embedder;
use crate::error::ChatError;
use crate::models::RetrievedPassage;
use crate::traits::VectorIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Passages scoring below this are dropped. Cosine scores live in
    /// [-1, 1]; the index itself never thresholds.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_score: 0.25,
        }
    }
}

/// Embeds a question and fetches the best-matching chunks of one document.
pub struct Retriever<E, V> {
    embedder: E,
    index: V,
    config: RetrievalConfig,
}

impl<E, V> Retriever<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// An empty result means "no grounding available", not an error; the
    /// answer generator turns it into the fallback reply.
    pub async fn retrieve(
        &self,
        document_id: Uuid,
        query_text: &str,
    ) -> Result<Vec<RetrievedPassage>, ChatError> {
        let query_vector = self.embedder.embed(query_text).await?;
        let hits = self
            .index
            .query(document_id, &query_vector, self.config.top_k)
            .await?;

        let total = hits.len();
        let passages: Vec<RetrievedPassage> = hits
            .into_iter()
            .filter(|passage| passage.score >= self.config.min_score)
            .collect();

        debug!(
            document_id = %document_id,
            retrieved = total,
            kept = passages.len(),
            min_score = self.config.min_score,
            "retrieval complete"
        );
        Ok(passages)
    }
}
