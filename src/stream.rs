use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::provider::ChatStream;
use crate::types::{ChatEvent, FinishReason};

/// Raw frame yielded by [`StreamDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Payload of one frame, without the `data:` prefix.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// How a streamed body is split into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `data:` lines. A line holding a complete payload is a frame on its own;
    /// partial payloads are joined until they parse or a blank line ends the event.
    ServerSentEvents,
    /// One JSON document per line; a leading `data:` is tolerated.
    JsonLines,
}

/// Splits a chunked HTTP body into [`StreamEvent`] frames.
///
/// Frames that are not valid UTF-8 are dropped. Once `[DONE]` is seen nothing after
/// it is reported.
pub struct StreamDecoder {
    body: HttpBodyStream,
    framing: Framing,
    buffer: Vec<u8>,
    data_lines: Vec<Vec<u8>>,
    pending: VecDeque<StreamEvent>,
    provider: &'static str,
    stream_closed: bool,
    done_received: bool,
}

impl StreamDecoder {
    pub fn new(body: HttpBodyStream, framing: Framing, provider: &'static str) -> Self {
        Self {
            body,
            framing,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
            done_received: false,
        }
    }

    fn handle_line(&mut self, line: Vec<u8>) {
        match self.framing {
            Framing::ServerSentEvents => {
                if line.is_empty() {
                    self.flush_event();
                } else if let Some(data) = strip_data_prefix(&line) {
                    self.push_data(data.to_vec());
                }
            }
            Framing::JsonLines => {
                let data = strip_data_prefix(&line).unwrap_or(&line[..]).to_vec();
                self.data_lines.push(data);
                self.flush_event();
            }
        }
    }

    /// A payload that already parses is a frame on its own, with or without the
    /// blank line that normally ends the event.
    fn push_data(&mut self, data: Vec<u8>) {
        if !self.data_lines.is_empty() {
            let mut joined = self.data_lines.join(&b'\n');
            joined.push(b'\n');
            joined.extend_from_slice(&data);
            if is_complete_payload(&joined) {
                self.data_lines.push(data);
                self.flush_event();
                return;
            }
        }

        if is_complete_payload(&data) {
            self.flush_event();
            self.data_lines.push(data);
            self.flush_event();
        } else {
            self.data_lines.push(data);
        }
    }

    fn flush_event(&mut self) {
        if self.data_lines.is_empty() {
            return;
        }
        let joined = self.data_lines.drain(..).collect::<Vec<_>>().join(&b'\n');
        if self.done_received {
            return;
        }

        let data = match String::from_utf8(joined) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(provider = self.provider, "dropping non UTF-8 frame: {err}");
                return;
            }
        };
        let trimmed = data.trim();
        if trimmed.is_empty() {
            return;
        }

        if trimmed == "[DONE]" {
            self.done_received = true;
            self.pending.push_back(StreamEvent::Done);
        } else {
            self.pending.push_back(StreamEvent::Data(trimmed.to_string()));
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

fn is_complete_payload(data: &[u8]) -> bool {
    let trimmed = data.trim_ascii();
    trimmed == b"[DONE]" || serde_json::from_slice::<IgnoredAny>(trimmed).is_ok()
}

fn strip_data_prefix(line: &[u8]) -> Option<&[u8]> {
    line.strip_prefix(b"data:")
        .map(|rest| rest.strip_prefix(b" ").unwrap_or(rest))
}

impl Stream for StreamDecoder {
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done_received || this.stream_closed {
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        this.handle_line(line);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.stream_closed = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.stream_closed = true;
                    if !this.buffer.is_empty() {
                        let mut line = std::mem::take(&mut this.buffer);
                        if line.last() == Some(&b'\r') {
                            line.pop();
                        }
                        this.handle_line(line);
                    }
                    this.flush_event();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// What one provider frame contributes to the token stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) token: Option<String>,
    pub(crate) finish_reason: Option<FinishReason>,
    /// The provider's terminal marker; reading stops after this frame.
    pub(crate) terminal: bool,
}

impl Frame {
    pub(crate) fn skip() -> Self {
        Self::default()
    }

    pub(crate) fn token(text: impl Into<String>) -> Self {
        Self {
            token: Some(text.into()),
            ..Self::default()
        }
    }

    pub(crate) fn terminal() -> Self {
        Self {
            terminal: true,
            ..Self::default()
        }
    }
}

/// Turns decoded frames of type `T` into [`ChatEvent`]s.
///
/// Frames that fail to deserialize are skipped. The stream ends after the first
/// `Completed` or `Err`; a body that ends without a terminal marker still yields
/// `Completed`.
struct TokenStream<T> {
    decoder: StreamDecoder,
    convert: fn(T) -> Result<Frame, LLMError>,
    provider: &'static str,
    pending: VecDeque<Result<ChatEvent, LLMError>>,
    finish_reason: Option<FinishReason>,
    finished: bool,
    _frame: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TokenStream<T> {
    fn handle_data(&mut self, data: &str) {
        tracing::trace!(provider = self.provider, frame = data, "stream frame");
        let frame = match serde_json::from_str::<T>(data) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(provider = self.provider, "skipping malformed stream frame: {err}");
                return;
            }
        };

        match (self.convert)(frame) {
            Ok(frame) => {
                if let Some(token) = frame.token.filter(|token| !token.is_empty()) {
                    self.pending.push_back(Ok(ChatEvent::Token(token)));
                }
                if frame.finish_reason.is_some() {
                    self.finish_reason = frame.finish_reason;
                }
                if frame.terminal {
                    self.complete();
                }
            }
            Err(err) => {
                self.pending.push_back(Err(err));
                self.finished = true;
            }
        }
    }

    fn complete(&mut self) {
        self.pending.push_back(Ok(ChatEvent::Completed {
            finish_reason: self.finish_reason.take(),
        }));
        self.finished = true;
    }
}

impl<T: DeserializeOwned> Stream for TokenStream<T> {
    type Item = Result<ChatEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.decoder).poll_next(cx) {
                Poll::Ready(Some(Ok(StreamEvent::Data(data)))) => this.handle_data(&data),
                Poll::Ready(Some(Ok(StreamEvent::Done))) => this.complete(),
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    tracing::debug!(
                        provider = this.provider,
                        "stream ended without terminal marker"
                    );
                    this.complete();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Builds the [`ChatStream`] for a successful streaming response.
pub(crate) fn token_stream<T: DeserializeOwned + 'static>(
    body: HttpBodyStream,
    framing: Framing,
    provider: &'static str,
    convert: fn(T) -> Result<Frame, LLMError>,
) -> ChatStream {
    Box::pin(TokenStream {
        decoder: StreamDecoder::new(body, framing, provider),
        convert,
        provider,
        pending: VecDeque::new(),
        finish_reason: None,
        finished: false,
        _frame: PhantomData,
    })
}
