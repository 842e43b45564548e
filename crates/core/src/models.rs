use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ingested PDF as the persistence collaborator records it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub storage_url: String,
    pub byte_size: u64,
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One conversation thread scoped to a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub const DEFAULT_TITLE: &'static str = "New Chat";
    const TITLE_MAX_CHARS: usize = 50;

    /// Derive a session title from the first user message.
    pub fn title_from(first_message: &str) -> String {
        let trimmed = first_message.trim();
        if trimmed.is_empty() {
            return Self::DEFAULT_TITLE.to_string();
        }

        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() > Self::TITLE_MAX_CHARS {
            let mut title: String = chars[..Self::TITLE_MAX_CHARS - 3].iter().collect();
            title.push_str("...");
            title
        } else {
            trimmed.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a session, immutable once created. Assistant messages carry
/// the page numbers they were grounded on in `sources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<u32>>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(session_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(session_id: Uuid, content: impl Into<String>, sources: Vec<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role: Role::Assistant,
            content: content.into(),
            sources: Some(sources),
            created_at: Utc::now(),
        }
    }
}

/// A chunk candidate produced by the chunker, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCandidate {
    pub page_number: u32,
    pub text: String,
}

/// A chunk as stored in the vector index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub page_number: u32,
    /// Monotone per document; the tie-break order for equal scores.
    pub chunk_index: u32,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A transient retrieval hit. Produced per query, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub text: String,
    pub page_number: u32,
    pub score: f32,
}

/// What a successful ingestion reports back for Document record creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub document_id: Uuid,
    pub page_count: u32,
    pub chunk_count: usize,
}
