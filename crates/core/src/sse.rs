//! Wire encoding of chat events for a chunked `text/event-stream` response.
//! The HTTP transport itself belongs to the routing collaborator.

use crate::chat::ChatEvent;
use serde_json::json;

/// Encode one event as a `data:` frame terminated by a blank line.
pub fn frame(event: &ChatEvent) -> String {
    let payload = match event {
        ChatEvent::Fragment(text) => json!({ "chunk": text }),
        ChatEvent::Completed(message) => json!({ "done": true, "message": message }),
        ChatEvent::Failed(error) => json!({ "error": error.to_string() }),
    };
    format!("data: {payload}\n\n")
}

#[cfg(test)]
mod tests {
    use super::frame;
    use crate::chat::ChatEvent;
    use crate::error::{ChatError, GenerationError};
    use crate::models::ChatMessage;
    use serde_json::Value;
    use uuid::Uuid;

    fn parse(frame: &str) -> Value {
        assert!(frame.ends_with("\n\n"));
        let data = frame.strip_prefix("data: ").expect("data prefix");
        serde_json::from_str(data.trim_end()).expect("valid json payload")
    }

    #[test]
    fn fragment_frames_carry_the_chunk_text() {
        let encoded = frame(&ChatEvent::Fragment("The sky ".to_string()));
        let payload = parse(&encoded);
        assert_eq!(payload["chunk"], "The sky ");
    }

    #[test]
    fn terminal_frame_embeds_the_persisted_message() {
        let message = ChatMessage::assistant(Uuid::new_v4(), "The sky is blue.", vec![1]);
        let encoded = frame(&ChatEvent::Completed(message.clone()));
        let payload = parse(&encoded);

        assert_eq!(payload["done"], true);
        assert_eq!(payload["message"]["content"], "The sky is blue.");
        assert_eq!(payload["message"]["role"], "assistant");
        assert_eq!(payload["message"]["sources"][0], 1);
    }

    #[test]
    fn error_frame_carries_the_message() {
        let error = ChatError::Generation(GenerationError::Stream("timed out".to_string()));
        let payload = parse(&frame(&ChatEvent::Failed(error)));
        assert!(payload["error"].as_str().unwrap().contains("timed out"));
    }
}
