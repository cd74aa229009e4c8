use crate::types::{ChatResponse, FinishReason, TokenUsage};

use super::types::{OpenAiChatResponse, OpenAiUsage};

pub(crate) fn map_response(resp: OpenAiChatResponse) -> ChatResponse {
    let choice = resp.choices.into_iter().next();
    let finish_reason = choice
        .as_ref()
        .and_then(|choice| choice.finish_reason.as_deref())
        .map(convert_finish_reason);
    let text = choice
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();

    ChatResponse {
        text,
        model: resp.model,
        finish_reason,
        usage: resp.usage.map(convert_usage),
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        other => FinishReason::Other(other.to_string()),
    }
}

fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}
