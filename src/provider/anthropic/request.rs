use serde_json::{Map, Value, json};

use crate::error::LLMError;
use crate::types::{ChatMessage, Role, split_system};

/// Builds the Messages API request body.
///
/// The preamble goes into the top-level `system` field; the Messages API only knows
/// `user` and `assistant`, so every non-assistant turn is sent as `user`.
pub(crate) fn build_anthropic_body(
    messages: &[ChatMessage],
    model: &str,
    max_tokens: u32,
    stream: bool,
) -> Result<Value, LLMError> {
    let (system, history) = split_system(messages);
    if history.is_empty() {
        return Err(LLMError::validation(
            "Anthropic Messages request requires at least one user/assistant message",
        ));
    }

    let wire: Vec<Value> = history
        .into_iter()
        .map(|message| {
            let role = match message.role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            json!({ "role": role, "content": message.content })
        })
        .collect();

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert("max_tokens".to_string(), Value::from(max_tokens));
    if let Some(system) = system {
        body.insert("system".to_string(), Value::String(system.to_string()));
    }
    body.insert("messages".to_string(), Value::Array(wire));
    body.insert("stream".to_string(), Value::Bool(stream));
    Ok(Value::Object(body))
}
