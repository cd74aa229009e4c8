use crate::error::LLMError;
use crate::stream::Frame;

use super::provider::PROVIDER;
use super::response::convert_finish_reason;
use super::types::OpenAiStreamChunk;

/// Converts one streamed chunk. The terminal marker is the `[DONE]` sentinel, which
/// the decoder handles, so a chunk never ends the stream by itself.
pub(crate) fn convert_stream_chunk(chunk: OpenAiStreamChunk) -> Result<Frame, LLMError> {
    if let Some(error) = chunk.error {
        return Err(LLMError::provider(PROVIDER, error.describe()));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(Frame::skip());
    };
    Ok(Frame {
        token: choice.delta.and_then(|delta| delta.content),
        finish_reason: choice.finish_reason.as_deref().map(convert_finish_reason),
        terminal: false,
    })
}
