use crate::error::GenerationError;
use crate::llm::{LanguageModel, PromptMessage, PromptRole};
use crate::models::{ChatMessage, RetrievedPassage, Role};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Returned when retrieval found nothing relevant. The model is never asked
/// to improvise an answer from outside the document.
pub const FALLBACK_ANSWER: &str =
    "The requested information is not available in this document.";

const SYSTEM_INSTRUCTION: &str = "You are a document assistant. Answer the user's question using \
only the document excerpts below. Each excerpt is labeled with the page it comes from. If the \
excerpts do not contain the answer, say the information is not available in this document. Do \
not use outside knowledge.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// How many of the most recent session messages accompany the prompt.
    pub history_messages: usize,
    /// Character budget for excerpts placed in the prompt.
    pub max_context_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            history_messages: 6,
            max_context_chars: 12_000,
        }
    }
}

/// The aggregate form of a generated answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Distinct page numbers of the excerpts that were actually in the
    /// prompt, ascending.
    pub citations: Vec<u32>,
}

#[derive(Debug)]
pub enum AnswerEvent {
    Fragment(String),
    Completed(Answer),
    Failed(GenerationError),
}

pub type AnswerStream = Pin<Box<dyn Stream<Item = AnswerEvent> + Send>>;

/// Builds the grounding prompt and streams the model's answer. Exactly one
/// terminal event (`Completed` or `Failed`) ends every stream.
pub struct AnswerGenerator<M> {
    model: Arc<M>,
    config: GenerationConfig,
}

/// Assemble prompt messages and the citation list from the passages that fit
/// the context budget.
fn build_prompt(
    history: &[ChatMessage],
    passages: &[RetrievedPassage],
    question: &str,
    config: &GenerationConfig,
) -> (Vec<PromptMessage>, Vec<u32>) {
    let mut context = String::new();
    let mut context_chars = 0;
    let mut citations: Vec<u32> = Vec::new();

    for passage in passages {
        let excerpt = format!("[page {}] {}", passage.page_number, passage.text);
        let excerpt_chars = excerpt.chars().count();

        // The best passage always goes in, so a single oversized chunk still
        // grounds the answer instead of leaving the prompt without excerpts.
        if !context.is_empty() && context_chars + 2 + excerpt_chars > config.max_context_chars {
            break;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
            context_chars += 2;
        }
        context.push_str(&excerpt);
        context_chars += excerpt_chars;

        if !citations.contains(&passage.page_number) {
            citations.push(passage.page_number);
        }
    }
    citations.sort_unstable();

    let mut messages = Vec::new();
    messages.push(PromptMessage::new(
        PromptRole::System,
        format!("{SYSTEM_INSTRUCTION}\n\nDocument excerpts:\n{context}"),
    ));

    let window_start = history.len().saturating_sub(config.history_messages);
    for message in &history[window_start..] {
        let role = match message.role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        };
        messages.push(PromptMessage::new(role, message.content.clone()));
    }

    messages.push(PromptMessage::new(PromptRole::User, question));
    (messages, citations)
}

impl<M> AnswerGenerator<M>
where
    M: LanguageModel + 'static,
{
    pub fn new(model: Arc<M>, config: GenerationConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn stream(
        &self,
        history: &[ChatMessage],
        passages: &[RetrievedPassage],
        question: &str,
    ) -> AnswerStream {
        if passages.is_empty() {
            debug!("no grounding passages, answering with the fallback");
            return Box::pin(stream! {
                yield AnswerEvent::Fragment(FALLBACK_ANSWER.to_string());
                yield AnswerEvent::Completed(Answer {
                    text: FALLBACK_ANSWER.to_string(),
                    citations: Vec::new(),
                });
            });
        }

        let (messages, citations) = build_prompt(history, passages, question, &self.config);
        let model = Arc::clone(&self.model);

        Box::pin(stream! {
            let tokens = match model.stream_chat(&messages).await {
                Ok(tokens) => tokens,
                Err(error) => {
                    yield AnswerEvent::Failed(error);
                    return;
                }
            };
            futures::pin_mut!(tokens);

            let mut answer_text = String::new();
            while let Some(token) = tokens.next().await {
                match token {
                    Ok(token) => {
                        answer_text.push_str(&token);
                        yield AnswerEvent::Fragment(token);
                    }
                    Err(error) => {
                        yield AnswerEvent::Failed(error);
                        return;
                    }
                }
            }

            yield AnswerEvent::Completed(Answer {
                text: answer_text,
                citations,
            });
        })
    }
}

/// Drain a stream into its aggregate answer.
pub async fn collect_answer(mut stream: AnswerStream) -> Result<Answer, GenerationError> {
    while let Some(event) = stream.next().await {
        match event {
            AnswerEvent::Fragment(_) => {}
            AnswerEvent::Completed(answer) => return Ok(answer),
            AnswerEvent::Failed(error) => return Err(error),
        }
    }
    Err(GenerationError::Stream(
        "answer stream ended without a terminal event".to_string(),
    ))
}
