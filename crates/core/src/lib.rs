pub mod chat;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod retriever;
pub mod sse;
pub mod stores;
pub mod traits;

pub use chat::{ChatEngine, ChatEvent, ChatStream, MemoryChatStore};
pub use chunking::{chunk_pages, ChunkingConfig};
pub use config::RagConfig;
pub use embeddings::{
    Embedder, HashEmbedder, HttpEmbedder, HttpEmbedderConfig, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ChatError, EmbeddingError, ExtractionError, GenerationError, IndexError, IngestError,
    StoreError,
};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use generator::{
    collect_answer, Answer, AnswerEvent, AnswerGenerator, AnswerStream, GenerationConfig,
    FALLBACK_ANSWER,
};
pub use ingest::{IngestionConfig, IngestionPipeline};
pub use llm::{GroqClient, GroqConfig, LanguageModel, PromptMessage, PromptRole, TokenStream};
pub use models::{
    ChatMessage, ChunkCandidate, Document, IndexEntry, IngestionSummary, RetrievedPassage, Role,
    Session,
};
pub use retriever::{RetrievalConfig, Retriever};
pub use stores::{MemoryIndex, QdrantConfig, QdrantIndex};
pub use traits::{ChatStore, VectorIndex};
