use serde_json::{Value, json};

use crate::types::{ChatMessage, Role, split_system};

/// Builds the Chat Completions request body.
///
/// The preamble goes first as a `system` message; the history follows in order with
/// `assistant` kept and every other role sent as `user`.
pub(crate) fn build_openai_body(messages: &[ChatMessage], model: &str, stream: bool) -> Value {
    let (system, history) = split_system(messages);

    let mut wire = Vec::with_capacity(history.len() + 1);
    if let Some(system) = system {
        wire.push(json!({ "role": "system", "content": system }));
    }
    for message in history {
        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };
        wire.push(json!({ "role": role, "content": message.content }));
    }

    json!({
        "model": model,
        "messages": wire,
        "stream": stream,
    })
}
