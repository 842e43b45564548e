use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document exceeds the size limit: {size} bytes > {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("document is encrypted and cannot be read")]
    Encrypted,

    #[error("pdf parse error: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from embedding api: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    Backend { backend: String, details: String },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chat store error: {0}")]
    Backend(String),
}

/// Failure modes of the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Failure modes of the query-time pipeline.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
