use crate::error::IndexError;
use crate::models::{IndexEntry, RetrievedPassage};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub endpoint: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub vector_size: usize,
}

/// Vector index backed by the Qdrant REST API. All points live in one
/// collection; partitioning by document happens through a `document_id`
/// payload filter backed by a keyword index.
pub struct QdrantIndex {
    config: QdrantConfig,
    client: Client,
}

impl QdrantIndex {
    pub fn new(config: QdrantConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.collection,
            suffix
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<Value, IndexError> {
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(IndexError::Backend {
                backend: "qdrant".to_string(),
                details,
            });
        }
        Ok(response.json().await?)
    }

    /// Create the collection (cosine distance) and the `document_id` keyword
    /// payload index if they do not exist yet. Safe to call repeatedly.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        let exists = self
            .request(self.client.get(self.url("")))
            .send()
            .await?
            .status()
            .is_success();

        if !exists {
            let response = self
                .request(self.client.put(self.url("")))
                .json(&json!({
                    "vectors": {
                        "size": self.config.vector_size,
                        "distance": "Cosine",
                    }
                }))
                .send()
                .await?;
            self.check(response).await?;
            debug!(collection = %self.config.collection, "created qdrant collection");
        }

        // Keyword index on document_id keeps filtered searches fast. Qdrant
        // answers 4xx when it already exists, which is fine.
        let _ = self
            .request(self.client.put(self.url("/index")))
            .json(&json!({
                "field_name": "document_id",
                "field_schema": "keyword",
            }))
            .send()
            .await?;

        Ok(())
    }

    fn document_filter(document_id: Uuid) -> Value {
        json!({
            "must": [{
                "key": "document_id",
                "match": { "value": document_id.to_string() },
            }]
        })
    }

    async fn delete_by_filter(&self, document_id: Uuid) -> Result<(), IndexError> {
        let response = self
            .request(self.client.post(self.url("/points/delete?wait=true")))
            .json(&json!({ "filter": Self::document_filter(document_id) }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}

/// Qdrant breaks equal scores by point id, which the hashed ids below make
/// arbitrary. Re-sort so ties fall back to original chunk order, matching
/// the `VectorIndex::query` contract.
fn passages_from_hits(hits: &[Value]) -> Vec<RetrievedPassage> {
    let mut scored: Vec<(u32, RetrievedPassage)> = hits
        .iter()
        .map(|hit| {
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let page_number = hit
                .pointer("/payload/page_number")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32;
            let chunk_index = hit
                .pointer("/payload/chunk_index")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32;
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32;

            (
                chunk_index,
                RetrievedPassage {
                    text,
                    page_number,
                    score,
                },
            )
        })
        .collect();

    scored.sort_by(|left, right| {
        right
            .1
            .score
            .total_cmp(&left.1.score)
            .then_with(|| left.0.cmp(&right.0))
    });

    scored.into_iter().map(|(_, passage)| passage).collect()
}

/// Deterministic point id so re-upserting the same chunk overwrites rather
/// than duplicates.
fn point_id(document_id: Uuid, entry: &IndexEntry) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(entry.page_number.to_le_bytes());
    hasher.update(entry.chunk_index.to_le_bytes());
    hasher.update(entry.text.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, document_id: Uuid, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        // Replace semantics: drop the old partition first so a re-ingested
        // document never mixes stale and fresh chunks.
        self.delete_by_filter(document_id).await?;

        if entries.is_empty() {
            return Ok(());
        }

        let points = entries
            .iter()
            .map(|entry| {
                if entry.vector.len() != self.config.vector_size {
                    return Err(IndexError::Dimension {
                        expected: self.config.vector_size,
                        actual: entry.vector.len(),
                    });
                }

                Ok(json!({
                    "id": point_id(document_id, entry),
                    "vector": entry.vector,
                    "payload": {
                        "document_id": document_id.to_string(),
                        "page_number": entry.page_number,
                        "chunk_index": entry.chunk_index,
                        "text": entry.text,
                    },
                }))
            })
            .collect::<Result<Vec<_>, IndexError>>()?;
        let point_count = points.len();

        let response = self
            .request(self.client.put(self.url("/points?wait=true")))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        self.check(response).await?;

        debug!(
            document_id = %document_id,
            chunk_count = point_count,
            "upserted chunks into qdrant"
        );
        Ok(())
    }

    async fn query(
        &self,
        document_id: Uuid,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, IndexError> {
        if vector.len() != self.config.vector_size {
            return Err(IndexError::Dimension {
                expected: self.config.vector_size,
                actual: vector.len(),
            });
        }

        let response = self
            .request(self.client.post(self.url("/points/search")))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "filter": Self::document_filter(document_id),
                "with_payload": true,
            }))
            .send()
            .await?;
        // A collection that was never created holds nothing queryable; treat
        // it as an empty partition rather than a backend failure.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let parsed = self.check(response).await?;

        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(passages_from_hits(&hits))
    }

    async fn delete(&self, document_id: Uuid) -> Result<(), IndexError> {
        self.delete_by_filter(document_id).await
    }

    async fn count(&self, document_id: Uuid) -> Result<usize, IndexError> {
        let response = self
            .request(self.client.post(self.url("/points/count")))
            .json(&json!({ "filter": Self::document_filter(document_id) }))
            .send()
            .await?;
        let parsed = self.check(response).await?;

        Ok(parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or_default() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::{passages_from_hits, point_id};
    use crate::models::IndexEntry;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn entry(chunk_index: u32, text: &str) -> IndexEntry {
        IndexEntry {
            page_number: 1,
            chunk_index,
            text: text.to_string(),
            vector: vec![0.0; 4],
        }
    }

    fn hit(score: f64, chunk_index: u32, text: &str) -> Value {
        json!({
            "score": score,
            "payload": {
                "document_id": Uuid::nil().to_string(),
                "page_number": 1,
                "chunk_index": chunk_index,
                "text": text,
            },
        })
    }

    #[test]
    fn equal_scores_fall_back_to_chunk_order() {
        // The backend orders exact ties by point id; the wrapper must not.
        let hits = vec![
            hit(0.9, 2, "third"),
            hit(0.9, 0, "first"),
            hit(0.9, 1, "second"),
        ];

        let passages = passages_from_hits(&hits);
        assert_eq!(passages[0].text, "first");
        assert_eq!(passages[1].text, "second");
        assert_eq!(passages[2].text, "third");
    }

    #[test]
    fn higher_scores_still_come_first() {
        let hits = vec![hit(0.5, 0, "weak"), hit(0.9, 7, "strong")];

        let passages = passages_from_hits(&hits);
        assert_eq!(passages[0].text, "strong");
        assert_eq!(passages[1].text, "weak");
    }

    #[test]
    fn point_ids_are_stable_across_calls() {
        let document_id = Uuid::new_v4();
        let chunk = entry(0, "same text");
        assert_eq!(point_id(document_id, &chunk), point_id(document_id, &chunk));
    }

    #[test]
    fn point_ids_differ_across_documents_and_chunks() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let chunk = entry(0, "same text");

        assert_ne!(point_id(first, &chunk), point_id(second, &chunk));
        assert_ne!(
            point_id(first, &entry(0, "alpha")),
            point_id(first, &entry(1, "alpha"))
        );
    }
}
