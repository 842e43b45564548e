use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Must be element-wise equal to repeated `embed` calls.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Local deterministic embedder: character trigrams hashed into a fixed-size
/// L2-normalized vector. No model, no network; identical text always maps to
/// the identical vector.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_sync(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed_sync(text)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    /// Total attempts for transient failures (transport errors and 5xx).
    pub max_attempts: usize,
    pub retry_backoff: Duration,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: None,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            max_attempts: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Transport errors and 5xx responses are worth retrying; everything else
/// (bad request, dimension mismatch, malformed body) will not improve.
fn is_transient(error: &EmbeddingError) -> bool {
    matches!(
        error,
        EmbeddingError::Http(_) | EmbeddingError::Api { status: 500..=599, .. }
    )
}

/// Remote embedder over an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    config: HttpEmbedderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsItem {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        Url::parse(&config.base_url)
            .map_err(|error| EmbeddingError::InvalidResponse(format!("bad base url: {error}")))?;

        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.config.base_url.trim_end_matches('/')))
            .json(&json!({
                "model": self.config.model,
                "input": texts,
            }));

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::InvalidResponse(error.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The API may reorder items; restore input order by index.
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in parsed.data {
            if item.embedding.len() != self.config.dimensions {
                return Err(EmbeddingError::Dimension {
                    expected: self.config.dimensions,
                    actual: item.embedding.len(),
                });
            }
            let slot = vectors.get_mut(item.index).ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!("embedding index {} out of range", item.index))
            })?;
            *slot = Some(item.embedding);
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(index, vector)| {
                vector.ok_or_else(|| {
                    EmbeddingError::InvalidResponse(format!("missing embedding for index {index}"))
                })
            })
            .collect()
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.request_embeddings(texts).await {
                Ok(vectors) => return Ok(vectors),
                // Embedding is pure, so retrying a transient failure is safe.
                Err(error) if attempt < attempts && is_transient(&error) => {
                    tracing::warn!(attempt, %error, "embedding request failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let mut vectors = self.embed_with_retry(&[text.to_string()]).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }
        self.embed_with_retry(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::{is_transient, Embedder, HashEmbedder};
    use crate::error::EmbeddingError;

    #[test]
    fn only_server_side_failures_are_transient() {
        assert!(is_transient(&EmbeddingError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }));
        assert!(!is_transient(&EmbeddingError::Api {
            status: 400,
            message: "bad request".to_string(),
        }));
        assert!(!is_transient(&EmbeddingError::EmptyInput));
        assert!(!is_transient(&EmbeddingError::Dimension {
            expected: 384,
            actual: 768,
        }));
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::default();
        let first = embedder.embed("What color is the sky?").await.unwrap();
        let second = embedder.embed("What color is the sky?").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn hash_embedder_outputs_configured_length() {
        let embedder = HashEmbedder { dimensions: 32 };
        let vector = embedder.embed("abc").await.unwrap();
        assert_eq!(vector.len(), 32);
    }

    #[tokio::test]
    async fn hash_embedder_vectors_are_normalized() {
        let embedder = HashEmbedder::default();
        let vector = embedder.embed("the sky is blue today").await.unwrap();
        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let embedder = HashEmbedder::default();
        assert!(matches!(
            embedder.embed("   ").await,
            Err(EmbeddingError::EmptyInput)
        ));
        assert!(matches!(
            embedder.embed_batch(&["ok".to_string(), String::new()]).await,
            Err(EmbeddingError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn batch_equals_elementwise_single_calls() {
        let embedder = HashEmbedder::default();
        let texts = vec![
            "the sky is blue".to_string(),
            "grass is green".to_string(),
            "water is wet".to_string(),
        ];

        let batched = embedder.embed_batch(&texts).await.unwrap();
        for (text, from_batch) in texts.iter().zip(&batched) {
            let single = embedder.embed(text).await.unwrap();
            assert_eq!(&single, from_batch);
        }
    }
}
