use std::time::Duration;

use crate::error::LLMError;
use crate::provider::http_error;

use super::provider::PROVIDER;
use super::types::CohereErrorBody;

/// Maps a non-success Cohere response to [`LLMError::Http`].
pub(crate) fn parse_cohere_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    let message = serde_json::from_str::<CohereErrorBody>(body)
        .ok()
        .and_then(|error| error.message);
    http_error(PROVIDER, status, message, body, retry_after)
}
