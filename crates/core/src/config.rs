use crate::chunking::ChunkingConfig;
use crate::generator::GenerationConfig;
use crate::ingest::IngestionConfig;
use crate::retriever::RetrievalConfig;
use serde::{Deserialize, Serialize};

/// Everything tunable about the pipeline in one place. The defaults are the
/// documented operating point; none of them is correctness-critical.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RagConfig {
    pub ingestion: IngestionConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

impl RagConfig {
    pub fn chunking(&self) -> &ChunkingConfig {
        &self.ingestion.chunking
    }
}

#[cfg(test)]
mod tests {
    use super::RagConfig;

    #[test]
    fn defaults_match_the_documented_operating_point() {
        let config = RagConfig::default();
        assert_eq!(config.ingestion.chunking.chunk_chars, 1_500);
        assert_eq!(config.ingestion.chunking.overlap_chars, 300);
        assert_eq!(config.ingestion.max_document_bytes, 50 * 1024 * 1024);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.generation.history_messages, 6);
    }
}
