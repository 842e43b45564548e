use crate::chunking::{chunk_pages, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{ExtractionError, IngestError};
use crate::extractor::PdfExtractor;
use crate::models::{IndexEntry, IngestionSummary};
use crate::traits::VectorIndex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub chunking: ChunkingConfig,
    pub max_document_bytes: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            max_document_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Extract, chunk, embed, upsert. A failure after the upsert has started
/// rolls the document's partition back, so an ingestion either completes or
/// leaves nothing queryable.
pub struct IngestionPipeline<X, E, V> {
    extractor: X,
    embedder: E,
    index: V,
    config: IngestionConfig,
}

impl<X, E, V> IngestionPipeline<X, E, V>
where
    X: PdfExtractor,
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(extractor: X, embedder: E, index: V, config: IngestionConfig) -> Self {
        Self {
            extractor,
            embedder,
            index,
            config,
        }
    }

    pub async fn ingest(
        &self,
        document_id: Uuid,
        bytes: &[u8],
    ) -> Result<IngestionSummary, IngestError> {
        if bytes.len() as u64 > self.config.max_document_bytes {
            return Err(ExtractionError::TooLarge {
                size: bytes.len() as u64,
                limit: self.config.max_document_bytes,
            }
            .into());
        }

        let pages = self.extractor.extract_pages(bytes)?;
        let page_count = pages.len() as u32;

        let chunks = chunk_pages(&pages, &self.config.chunking)?;
        info!(
            document_id = %document_id,
            page_count,
            chunk_count = chunks.len(),
            "extracted and chunked document"
        );

        // A document with no extractable text still ingests; every query
        // against it will take the fallback path.
        if chunks.is_empty() {
            self.index.upsert(document_id, Vec::new()).await?;
            return Ok(IngestionSummary {
                document_id,
                page_count,
                chunk_count: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let result = async {
            let vectors = self.embedder.embed_batch(&texts).await?;

            let entries: Vec<IndexEntry> = chunks
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(chunk_index, (chunk, vector))| IndexEntry {
                    page_number: chunk.page_number,
                    chunk_index: chunk_index as u32,
                    text: chunk.text.clone(),
                    vector,
                })
                .collect();

            self.index.upsert(document_id, entries).await?;
            Ok::<_, IngestError>(())
        }
        .await;

        if let Err(error) = result {
            warn!(document_id = %document_id, %error, "ingestion failed, rolling back");
            // Drop anything the failed upsert may have left behind.
            if let Err(rollback_error) = self.index.delete(document_id).await {
                warn!(document_id = %document_id, %rollback_error, "rollback delete failed");
            }
            return Err(error);
        }

        info!(document_id = %document_id, chunk_count = chunks.len(), "document ingested");
        Ok(IngestionSummary {
            document_id,
            page_count,
            chunk_count: chunks.len(),
        })
    }

    /// Cascade companion of document deletion.
    pub async fn delete(&self, document_id: Uuid) -> Result<(), IngestError> {
        self.index.delete(document_id).await?;
        info!(document_id = %document_id, "document chunks deleted");
        Ok(())
    }
}
