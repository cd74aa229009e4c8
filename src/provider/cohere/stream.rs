use crate::error::LLMError;
use crate::stream::Frame;

use super::provider::PROVIDER;
use super::response::{convert_finish_reason, is_error_finish};
use super::types::CohereStreamEvent;

/// Converts one streamed line; `stream-end` is the terminal marker.
pub(crate) fn convert_stream_event(event: CohereStreamEvent) -> Result<Frame, LLMError> {
    match event {
        CohereStreamEvent::TextGeneration { text } => Ok(Frame::token(text)),
        CohereStreamEvent::StreamEnd { finish_reason } => match finish_reason.as_deref() {
            Some(reason) if is_error_finish(reason) => Err(LLMError::provider(
                PROVIDER,
                format!("generation ended with {reason}"),
            )),
            reason => Ok(Frame {
                finish_reason: reason.map(convert_finish_reason),
                terminal: true,
                ..Frame::default()
            }),
        },
        CohereStreamEvent::Other => Ok(Frame::skip()),
    }
}
