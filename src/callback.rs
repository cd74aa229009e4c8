//! Push-based streaming contract.
//!
//! A streaming call reports through a [`StreamCallback`]: zero or more
//! [`on_token`](StreamCallback::on_token) calls followed by exactly one of
//! [`on_complete`](StreamCallback::on_complete) or [`on_error`](StreamCallback::on_error).

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::LLMError;
use crate::provider::ChatStream;
use crate::types::ChatEvent;

/// Receiver of incremental streaming output.
pub trait StreamCallback {
    /// Appends `token` to the logical response. Called in arrival order.
    fn on_token(&mut self, token: &str);

    /// Called once after the last token when the stream finished normally.
    fn on_complete(&mut self);

    /// Called at most once; no other method is called afterwards.
    fn on_error(&mut self, error: LLMError);
}

/// Lifecycle of one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The call was issued but no transport activity happened yet.
    Idle,
    /// The response stream is open; tokens may arrive.
    Active,
    Completed,
    Errored,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Errored)
    }
}

/// Forwards signals to a callback only while they are legal for the current state.
///
/// Terminal states absorb everything, so a callback never sees a signal after
/// `on_complete` or `on_error`.
pub(crate) struct CallbackGuard<'a, C: StreamCallback + ?Sized> {
    inner: &'a mut C,
    state: StreamState,
}

impl<'a, C: StreamCallback + ?Sized> CallbackGuard<'a, C> {
    pub(crate) fn new(inner: &'a mut C) -> Self {
        Self {
            inner,
            state: StreamState::Idle,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    pub(crate) fn activate(&mut self) {
        if self.state == StreamState::Idle {
            self.state = StreamState::Active;
        }
    }

    pub(crate) fn token(&mut self, token: &str) {
        if self.state == StreamState::Active {
            self.inner.on_token(token);
        }
    }

    pub(crate) fn complete(&mut self) {
        if self.state == StreamState::Active {
            self.state = StreamState::Completed;
            self.inner.on_complete();
        }
    }

    pub(crate) fn error(&mut self, error: LLMError) {
        if !self.state.is_terminal() {
            self.state = StreamState::Errored;
            self.inner.on_error(error);
        }
    }
}

/// Drives `stream` to its end, pushing every event into `callback`.
///
/// Returns the terminal state reached. A stream that ends without a
/// [`ChatEvent::Completed`] is treated as completed.
pub async fn drive_stream<C: StreamCallback + ?Sized>(
    stream: ChatStream,
    callback: &mut C,
) -> StreamState {
    let mut guard = CallbackGuard::new(callback);
    guard.activate();
    pump(stream, &mut guard).await;
    guard.state()
}

pub(crate) async fn pump<C: StreamCallback + ?Sized>(
    mut stream: ChatStream,
    guard: &mut CallbackGuard<'_, C>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(ChatEvent::Token(token)) => guard.token(&token),
            Ok(ChatEvent::Completed { .. }) => {
                guard.complete();
                return;
            }
            Err(err) => {
                guard.error(err);
                return;
            }
        }
    }
    guard.complete();
}

/// Callback that buffers the whole response.
///
/// # Examples
///
/// ```
/// use scholar_llm::callback::{StreamCallback, TokenCollector};
///
/// let mut collector = TokenCollector::default();
/// collector.on_token("Hel");
/// collector.on_token("lo");
/// collector.on_complete();
/// assert_eq!(collector.into_result().unwrap(), "Hello");
/// ```
#[derive(Debug, Default)]
pub struct TokenCollector {
    pub tokens: Vec<String>,
    pub completed: bool,
    pub error: Option<LLMError>,
}

impl TokenCollector {
    /// Concatenation of every token received so far.
    pub fn text(&self) -> String {
        self.tokens.concat()
    }

    /// Turns the outcome into the single-shot shape: the full text or the error.
    ///
    /// Partial text is discarded when the stream failed.
    pub fn into_result(self) -> Result<String, LLMError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.tokens.concat()),
        }
    }
}

impl StreamCallback for TokenCollector {
    fn on_token(&mut self, token: &str) {
        self.tokens.push(token.to_string());
    }

    fn on_complete(&mut self) {
        self.completed = true;
    }

    fn on_error(&mut self, error: LLMError) {
        self.error = Some(error);
    }
}

/// Signal forwarded by [`ChannelCallback`].
#[derive(Debug)]
pub enum StreamSignal {
    Token(String),
    Complete,
    Error(LLMError),
}

/// Callback that forwards every signal over an unbounded channel, for consumers
/// running on another task (for example a UI loop).
///
/// Signals sent after the receiver is dropped are discarded.
pub struct ChannelCallback {
    sender: UnboundedSender<StreamSignal>,
}

impl ChannelCallback {
    pub fn new(sender: UnboundedSender<StreamSignal>) -> Self {
        Self { sender }
    }
}

impl StreamCallback for ChannelCallback {
    fn on_token(&mut self, token: &str) {
        let _ = self.sender.send(StreamSignal::Token(token.to_string()));
    }

    fn on_complete(&mut self) {
        let _ = self.sender.send(StreamSignal::Complete);
    }

    fn on_error(&mut self, error: LLMError) {
        let _ = self.sender.send(StreamSignal::Error(error));
    }
}
