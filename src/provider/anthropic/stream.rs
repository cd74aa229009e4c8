use crate::error::LLMError;
use crate::stream::Frame;

use super::provider::PROVIDER;
use super::response::convert_finish_reason;
use super::types::{AnthropicDelta, AnthropicStreamEvent};

/// Converts one Messages API event; `message_stop` is the terminal marker.
pub(crate) fn convert_stream_event(event: AnthropicStreamEvent) -> Result<Frame, LLMError> {
    match event {
        AnthropicStreamEvent::ContentBlockDelta {
            delta: AnthropicDelta::TextDelta { text },
        } => Ok(Frame::token(text)),
        AnthropicStreamEvent::MessageDelta { delta } => Ok(Frame {
            finish_reason: delta
                .and_then(|delta| delta.stop_reason)
                .as_deref()
                .map(convert_finish_reason),
            ..Frame::default()
        }),
        AnthropicStreamEvent::MessageStop => Ok(Frame::terminal()),
        AnthropicStreamEvent::Error { error } => {
            Err(LLMError::provider(PROVIDER, error.describe()))
        }
        AnthropicStreamEvent::ContentBlockDelta {
            delta: AnthropicDelta::Other,
        }
        | AnthropicStreamEvent::Other => Ok(Frame::skip()),
    }
}
