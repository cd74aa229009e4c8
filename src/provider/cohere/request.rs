use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{ChatMessage, Role, split_system};

/// Builds the `/v1/chat` request body.
///
/// Only the last user message is sent as `message`, with the system message as
/// `preamble`. Earlier turns, including assistant replies, are discarded.
pub(crate) fn build_cohere_body(
    messages: &[ChatMessage],
    model: &str,
    stream: bool,
) -> Result<Value, LLMError> {
    let (preamble, history) = split_system(messages);
    let message = history
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .ok_or_else(|| LLMError::validation("Cohere chat requires a user message"))?;

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert("message".to_string(), Value::String(message.content.clone()));
    if let Some(preamble) = preamble {
        body.insert("preamble".to_string(), Value::String(preamble.to_string()));
    }
    body.insert("stream".to_string(), Value::Bool(stream));
    Ok(Value::Object(body))
}
