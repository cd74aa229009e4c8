use crate::types::{ChatResponse, FinishReason, TokenUsage};

use super::types::{AnthropicContentBlock, AnthropicMessageResponse};

pub(crate) fn map_response(resp: AnthropicMessageResponse) -> ChatResponse {
    let text = resp
        .content
        .iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::Text { text } => Some(text.as_str()),
            AnthropicContentBlock::Other => None,
        })
        .collect::<String>();

    ChatResponse {
        text,
        model: resp.model,
        finish_reason: resp.stop_reason.as_deref().map(convert_finish_reason),
        usage: resp
            .usage
            .map(|usage| TokenUsage::from_counts(usage.input_tokens, usage.output_tokens)),
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        other => FinishReason::Other(other.to_string()),
    }
}
