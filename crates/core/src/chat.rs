use crate::embeddings::Embedder;
use crate::error::{ChatError, StoreError};
use crate::generator::{AnswerEvent, AnswerGenerator};
use crate::llm::LanguageModel;
use crate::models::ChatMessage;
use crate::retriever::Retriever;
use crate::traits::{ChatStore, VectorIndex};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
pub enum ChatEvent {
    Fragment(String),
    /// Carries the assistant message as persisted.
    Completed(ChatMessage),
    Failed(ChatError),
}

pub type ChatStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// The query-time pipeline: history, retrieval, generation, persistence.
///
/// Only a fully generated answer is ever written to the store. Dropping the
/// returned stream stops generation and persists nothing.
pub struct ChatEngine<E, V, M, S> {
    retriever: Retriever<E, V>,
    generator: AnswerGenerator<M>,
    store: Arc<S>,
}

impl<E, V, M, S> ChatEngine<E, V, M, S>
where
    E: Embedder,
    V: VectorIndex,
    M: LanguageModel + 'static,
    S: ChatStore + 'static,
{
    pub fn new(retriever: Retriever<E, V>, generator: AnswerGenerator<M>, store: Arc<S>) -> Self {
        Self {
            retriever,
            generator,
            store,
        }
    }

    /// Retrieval-phase errors surface as `Err` before any stream exists;
    /// generation and persistence failures travel as `Failed` events.
    pub async fn respond(
        &self,
        session_id: Uuid,
        document_id: Uuid,
        question: &str,
    ) -> Result<ChatStream, ChatError> {
        // History is loaded before the user turn is appended, so the prompt
        // window never contains the question twice.
        let history = self
            .store
            .recent_messages(session_id, self.generator.config().history_messages)
            .await?;
        self.store
            .append_message(ChatMessage::user(session_id, question))
            .await?;

        let passages = self.retriever.retrieve(document_id, question).await?;
        debug!(
            session_id = %session_id,
            document_id = %document_id,
            passage_count = passages.len(),
            "responding to question"
        );

        let answer_stream = self.generator.stream(&history, &passages, question);
        let store = Arc::clone(&self.store);

        Ok(Box::pin(stream! {
            futures::pin_mut!(answer_stream);

            while let Some(event) = answer_stream.next().await {
                match event {
                    AnswerEvent::Fragment(text) => yield ChatEvent::Fragment(text),
                    AnswerEvent::Completed(answer) => {
                        let message =
                            ChatMessage::assistant(session_id, answer.text, answer.citations);
                        match store.append_message(message).await {
                            Ok(stored) => {
                                info!(session_id = %session_id, "assistant message persisted");
                                yield ChatEvent::Completed(stored);
                            }
                            Err(error) => yield ChatEvent::Failed(error.into()),
                        }
                        return;
                    }
                    AnswerEvent::Failed(error) => {
                        yield ChatEvent::Failed(error.into());
                        return;
                    }
                }
            }
        }))
    }
}

/// In-process `ChatStore`. Clones share the same storage.
#[derive(Default, Clone)]
pub struct MemoryChatStore {
    sessions: Arc<RwLock<HashMap<Uuid, Vec<ChatMessage>>>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self, session_id: Uuid) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryChatStore {
    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let sessions = self.sessions.read().await;
        let messages = sessions.get(&session_id).map(Vec::as_slice).unwrap_or(&[]);
        let window_start = messages.len().saturating_sub(limit);
        Ok(messages[window_start..].to_vec())
    }

    async fn append_message(&self, message: ChatMessage) -> Result<ChatMessage, StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(message.session_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }
}
