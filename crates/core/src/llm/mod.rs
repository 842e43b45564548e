mod groq;

pub use groq::{GroqClient, GroqConfig};

use crate::error::GenerationError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Streamed chat-completion seam. Implementations are selected at
/// construction time; the generator never inspects which backend it holds.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn stream_chat(&self, messages: &[PromptMessage]) -> Result<TokenStream, GenerationError>;
}
