use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::ChunkCandidate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1_500,
            overlap_chars: 300,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.chunk_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars {} must be smaller than chunk_chars {}",
                self.overlap_chars, self.chunk_chars
            )));
        }
        Ok(())
    }
}

/// Split page texts into overlapping windows. Chunks never span page
/// boundaries, so page attribution of every chunk stays exact.
pub fn chunk_pages(
    pages: &[PageText],
    config: &ChunkingConfig,
) -> Result<Vec<ChunkCandidate>, IngestError> {
    config.validate()?;

    let step = config.chunk_chars - config.overlap_chars;
    let mut chunks = Vec::new();

    for page in pages {
        let chars: Vec<char> = page.text.chars().collect();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + config.chunk_chars).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();

            if !trimmed.is_empty() {
                chunks.push(ChunkCandidate {
                    page_number: page.number,
                    text: trimmed.to_string(),
                });
            }

            if end == chars.len() {
                break;
            }
            start += step;
        }
    }

    Ok(chunks)
}
