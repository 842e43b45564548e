use crate::error::IndexError;
use crate::models::{IndexEntry, RetrievedPassage};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type Partition = Arc<RwLock<Vec<IndexEntry>>>;

/// In-process vector index. Each document gets its own lock, so operations
/// on different documents never contend; replacing a document's entries is
/// a single write under its lock, and readers see the old entries until the
/// swap completes. Clones share the same storage.
#[derive(Default, Clone)]
pub struct MemoryIndex {
    partitions: Arc<RwLock<HashMap<Uuid, Partition>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    async fn partition(&self, document_id: Uuid) -> Option<Partition> {
        self.partitions.read().await.get(&document_id).cloned()
    }

    async fn partition_or_insert(&self, document_id: Uuid) -> Partition {
        let mut partitions = self.partitions.write().await;
        partitions.entry(document_id).or_default().clone()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, document_id: Uuid, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        let partition = self.partition_or_insert(document_id).await;
        *partition.write().await = entries;
        Ok(())
    }

    async fn query(
        &self,
        document_id: Uuid,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, IndexError> {
        let Some(partition) = self.partition(document_id).await else {
            return Ok(Vec::new());
        };
        let entries = partition.read().await;

        let mut scored: Vec<(f32, u32, RetrievedPassage)> = entries
            .iter()
            .map(|entry| {
                let score = cosine_similarity(vector, &entry.vector);
                (
                    score,
                    entry.chunk_index,
                    RetrievedPassage {
                        text: entry.text.clone(),
                        page_number: entry.page_number,
                        score,
                    },
                )
            })
            .collect();

        scored.sort_by(|left, right| {
            right
                .0
                .total_cmp(&left.0)
                .then_with(|| left.1.cmp(&right.1))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, _, passage)| passage)
            .collect())
    }

    async fn delete(&self, document_id: Uuid) -> Result<(), IndexError> {
        self.partitions.write().await.remove(&document_id);
        Ok(())
    }

    async fn count(&self, document_id: Uuid) -> Result<usize, IndexError> {
        match self.partition(document_id).await {
            Some(partition) => Ok(partition.read().await.len()),
            None => Ok(0),
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, MemoryIndex};
    use crate::models::IndexEntry;
    use crate::traits::VectorIndex;
    use uuid::Uuid;

    fn entry(chunk_index: u32, page_number: u32, text: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            page_number,
            chunk_index,
            text: text.to_string(),
            vector,
        }
    }

    #[test]
    fn cosine_similarity_spans_known_range() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn query_returns_results_sorted_by_similarity() {
        let index = MemoryIndex::new();
        let document_id = Uuid::new_v4();

        index
            .upsert(
                document_id,
                vec![
                    entry(0, 1, "off-axis", vec![0.0, 1.0, 0.0]),
                    entry(1, 2, "aligned", vec![1.0, 0.0, 0.0]),
                    entry(2, 3, "partial", vec![0.7, 0.7, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index.query(document_id, &[1.0, 0.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "aligned");
        assert_eq!(hits[1].text, "partial");
        assert_eq!(hits[2].text, "off-axis");
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_chunk_order() {
        let index = MemoryIndex::new();
        let document_id = Uuid::new_v4();

        index
            .upsert(
                document_id,
                vec![
                    entry(2, 3, "third", vec![1.0, 0.0]),
                    entry(0, 1, "first", vec![1.0, 0.0]),
                    entry(1, 2, "second", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index.query(document_id, &[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].text, "second");
        assert_eq!(hits[2].text, "third");
    }

    #[tokio::test]
    async fn query_is_scoped_to_the_document() {
        let index = MemoryIndex::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        index
            .upsert(first, vec![entry(0, 1, "doc one", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(second, vec![entry(0, 1, "doc two", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = index.query(first, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "doc one");
    }

    #[tokio::test]
    async fn upsert_replaces_prior_entries() {
        let index = MemoryIndex::new();
        let document_id = Uuid::new_v4();

        index
            .upsert(document_id, vec![entry(0, 1, "stale", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(document_id, vec![entry(0, 1, "fresh", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = index.query(document_id, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "fresh");
    }

    #[tokio::test]
    async fn unknown_document_and_deleted_document_yield_empty() {
        let index = MemoryIndex::new();
        let document_id = Uuid::new_v4();

        assert!(index.query(document_id, &[1.0], 5).await.unwrap().is_empty());
        // Deleting a document with no entries is a no-op.
        index.delete(document_id).await.unwrap();

        index
            .upsert(document_id, vec![entry(0, 1, "text", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(index.count(document_id).await.unwrap(), 1);

        index.delete(document_id).await.unwrap();
        assert!(index.query(document_id, &[1.0], 5).await.unwrap().is_empty());
        assert_eq!(index.count(document_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_operations_on_different_documents_do_not_interfere() {
        let index = MemoryIndex::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        index
            .upsert(second, vec![entry(0, 1, "steady", vec![1.0, 0.0])])
            .await
            .unwrap();

        let writer = index.clone();
        let (write_result, hits) = tokio::join!(
            writer.upsert(first, vec![entry(0, 1, "incoming", vec![1.0, 0.0])]),
            index.query(second, &[1.0, 0.0], 5),
        );

        write_result.unwrap();
        let hits = hits.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "steady");
    }

    #[tokio::test]
    async fn query_returns_at_most_top_k() {
        let index = MemoryIndex::new();
        let document_id = Uuid::new_v4();

        let entries = (0..10)
            .map(|i| entry(i, 1, &format!("chunk {i}"), vec![1.0, i as f32]))
            .collect();
        index.upsert(document_id, entries).await.unwrap();

        let hits = index.query(document_id, &[1.0, 0.0], 4).await.unwrap();
        assert_eq!(hits.len(), 4);
    }
}
