use crate::types::{ChatResponse, FinishReason, TokenUsage};

use super::types::CohereChatResponse;

pub(crate) fn map_response(resp: CohereChatResponse, model: String) -> ChatResponse {
    let usage = resp
        .meta
        .and_then(|meta| meta.billed_units)
        .map(|units| {
            TokenUsage::from_counts(
                units.input_tokens.and_then(billed_count),
                units.output_tokens.and_then(billed_count),
            )
        });

    ChatResponse {
        text: resp.text.unwrap_or_default(),
        model: Some(model),
        finish_reason: resp.finish_reason.as_deref().map(convert_finish_reason),
        usage,
    }
}

fn billed_count(units: f64) -> Option<u64> {
    (units.is_finite() && units >= 0.0).then(|| units.round() as u64)
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "COMPLETE" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Finish reasons that mean generation failed rather than ended.
pub(crate) fn is_error_finish(reason: &str) -> bool {
    reason.starts_with("ERROR")
}
