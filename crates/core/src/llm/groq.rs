use super::{LanguageModel, PromptMessage, TokenStream};
use crate::error::GenerationError;
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.1,
            top_p: 0.85,
            max_tokens: 2048,
        }
    }
}

/// Streamed chat completions against Groq's OpenAI-compatible API.
pub struct GroqClient {
    config: GroqConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// What one SSE line of the completion stream carries.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.trim().strip_prefix("data: ") else {
        return SseEvent::Skip;
    };
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(parsed) => {
            let Some(choice) = parsed.choices.first() else {
                return SseEvent::Skip;
            };
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    return SseEvent::Token(content.clone());
                }
            }
            if choice.finish_reason.is_some() {
                SseEvent::Done
            } else {
                SseEvent::Skip
            }
        }
        Err(_) => SseEvent::Skip,
    }
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Result<Self, GenerationError> {
        Url::parse(&config.base_url)
            .map_err(|error| GenerationError::Stream(format!("bad base url: {error}")))?;

        Ok(Self {
            config,
            client: Client::new(),
        })
    }
}

#[async_trait]
impl LanguageModel for GroqClient {
    async fn stream_chat(&self, messages: &[PromptMessage]) -> Result<TokenStream, GenerationError> {
        let body = json!({
            "model": self.config.model,
            "messages": messages
                .iter()
                .map(|message| json!({
                    "role": message.role.as_str(),
                    "content": message.content,
                }))
                .collect::<Vec<_>>(),
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": self.config.max_tokens,
            "stream": true,
        });

        let mut request = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .json(&body);

        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let mut bytes = response.bytes_stream();

        Ok(Box::pin(stream! {
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        yield Err(GenerationError::Stream(error.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].to_string();
                    buffer = buffer[pos + 1..].to_string();

                    match parse_sse_line(&line) {
                        SseEvent::Token(token) => yield Ok(token),
                        SseEvent::Done => return,
                        SseEvent::Skip => {}
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_sse_line, SseEvent};

    #[test]
    fn content_delta_parses_to_a_token() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line), SseEvent::Token("Hello".to_string()));
    }

    #[test]
    fn done_marker_terminates_the_stream() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseEvent::Done);
    }

    #[test]
    fn finish_reason_without_content_terminates() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), SseEvent::Done);
    }

    #[test]
    fn unrelated_lines_are_skipped() {
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
        assert_eq!(parse_sse_line(": keepalive"), SseEvent::Skip);
        assert_eq!(parse_sse_line("data: not json"), SseEvent::Skip);
    }
}
