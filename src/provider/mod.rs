use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::LLMError;
use crate::http::{HttpBodyStream, collect_body_text};
use crate::types::{ChatEvent, ChatRequest, ChatResponse};

pub mod anthropic;
pub mod cohere;
pub mod openai;

/// Pull-based token stream returned by [`LLMProvider::stream_chat`].
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatEvent, LLMError>> + Send>>;

/// Adapter between the generic chat model and one backend's wire format.
///
/// Adapters hold only immutable configuration; the API key arrives with every
/// [`ChatRequest`].
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Issues exactly one request and waits for the whole completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError>;

    /// Opens a streamed completion.
    ///
    /// Errors returned here happen before any token; errors while reading surface
    /// as `Err` items of the stream.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, LLMError>;

    /// Model used when the request does not name one.
    fn default_model(&self) -> &str;

    /// Adapter name, also its canonical provider id.
    fn name(&self) -> &'static str;
}

/// Thread-safe adapter handle.
pub type DynProvider = Arc<dyn LLMProvider>;

pub(crate) fn resolve_model(request: &ChatRequest, default_model: &str) -> String {
    request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(default_model)
        .to_string()
}

/// Builds the [`LLMError::Http`] for a failed call, falling back to the raw body
/// when the provider's error payload could not be read.
pub(crate) fn http_error(
    provider: &'static str,
    status: u16,
    parsed_message: Option<String>,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    let message = parsed_message.unwrap_or_else(|| {
        let raw = body.trim();
        if raw.is_empty() {
            "empty response body".to_string()
        } else {
            raw.to_string()
        }
    });
    tracing::warn!(provider, status, "provider request failed: {message}");
    LLMError::Http {
        provider,
        status,
        message,
        retry_after,
    }
}

/// Reads the body of a failed streaming response.
///
/// A read failure yields an empty body so the status still reaches the caller.
pub(crate) async fn read_error_body(provider: &'static str, body: HttpBodyStream) -> String {
    match collect_body_text(body).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(provider, "failed to read error body: {err}");
            String::new()
        }
    }
}
