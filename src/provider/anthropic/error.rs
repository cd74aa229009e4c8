use std::time::Duration;

use serde::Deserialize;

use crate::error::LLMError;
use crate::provider::http_error;

use super::provider::PROVIDER;
use super::types::AnthropicErrorBody;

/// Maps a non-success Messages API response to [`LLMError::Http`].
pub(crate) fn parse_anthropic_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: Option<AnthropicErrorBody>,
    }

    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .map(|error| error.describe());
    http_error(PROVIDER, status, message, body, retry_after)
}
