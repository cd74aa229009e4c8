use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::LLMError;
use crate::http::{
    DynHttpTransport, HttpResponse, post_json_stream_with_headers,
    post_json_with_headers, retry_after_from_headers,
};
use crate::provider::{ChatStream, LLMProvider, read_error_body, resolve_model};
use crate::stream::{Framing, token_stream};
use crate::types::{ChatRequest, ChatResponse};

use super::error::parse_anthropic_error;
use super::request::build_anthropic_body;
use super::response::map_response;
use super::stream::convert_stream_event;
use super::types::AnthropicMessageResponse;

pub(crate) const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";
/// Model used when neither the call nor the configuration names one.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
/// `max_tokens` sent with every request; the Messages API requires the field.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic-compatible Messages adapter.
pub struct AnthropicProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) version: String,
    pub(crate) default_model: String,
    pub(crate) max_tokens: u32,
}

impl AnthropicProvider {
    /// Creates the adapter with the public base URL and `anthropic-version`.
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `anthropic-version` header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    fn build_headers(&self, api_key: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), api_key.to_string());
        headers.insert("anthropic-version".to_string(), self.version.clone());
        headers
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let retry_after = retry_after_from_headers(&response.headers);
        let success = response.is_success();
        let text = response.into_string()?;
        if success {
            Ok(text)
        } else {
            Err(parse_anthropic_error(status, &text, retry_after))
        }
    }

    fn try_parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, LLMError> {
        serde_json::from_str(text).map_err(|err| {
            LLMError::provider(PROVIDER, format!("failed to parse Anthropic response: {err}"))
        })
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        request.validate()?;
        let model = resolve_model(&request, &self.default_model);
        let body = build_anthropic_body(&request.messages, &model, self.max_tokens, false)?;
        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(&request.api_key),
            &body,
        )
        .await?;
        let text = self.ensure_success(response)?;
        let parsed: AnthropicMessageResponse = self.try_parse(&text)?;
        Ok(map_response(parsed))
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, LLMError> {
        request.validate()?;
        let model = resolve_model(&request, &self.default_model);
        let body = build_anthropic_body(&request.messages, &model, self.max_tokens, true)?;
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(&request.api_key),
            &body,
        )
        .await?;
        if !response.is_success() {
            let retry_after = retry_after_from_headers(&response.headers);
            let text = read_error_body(PROVIDER, response.body).await;
            return Err(parse_anthropic_error(response.status, &text, retry_after));
        }
        Ok(token_stream(
            response.body,
            Framing::ServerSentEvents,
            PROVIDER,
            convert_stream_event,
        ))
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
