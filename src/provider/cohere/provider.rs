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

use super::error::parse_cohere_error;
use super::request::build_cohere_body;
use super::response::map_response;
use super::stream::convert_stream_event;
use super::types::CohereChatResponse;

pub(crate) const PROVIDER: &str = "cohere";
const DEFAULT_BASE_URL: &str = "https://api.cohere.com";
/// Model used when neither the call nor the configuration names one.
pub const DEFAULT_MODEL: &str = "command-r-plus";

/// Cohere-compatible `/v1/chat` adapter.
///
/// Streams arrive as newline-delimited JSON rather than server-sent events.
pub struct CohereProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) default_model: String,
}

impl CohereProvider {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat")
        } else {
            format!("{base}/v1/chat")
        }
    }

    fn build_headers(&self, api_key: &str) -> HashMap<String, String> {
        HashMap::from([("Authorization".to_string(), format!("Bearer {api_key}"))])
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let retry_after = retry_after_from_headers(&response.headers);
        let success = response.is_success();
        let text = response.into_string()?;
        if success {
            Ok(text)
        } else {
            Err(parse_cohere_error(status, &text, retry_after))
        }
    }

    fn try_parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, LLMError> {
        serde_json::from_str(text).map_err(|err| {
            LLMError::provider(PROVIDER, format!("failed to parse Cohere response: {err}"))
        })
    }
}

#[async_trait]
impl LLMProvider for CohereProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        request.validate()?;
        let model = resolve_model(&request, &self.default_model);
        let body = build_cohere_body(&request.messages, &model, false)?;
        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(&request.api_key),
            &body,
        )
        .await?;
        let text = self.ensure_success(response)?;
        let parsed: CohereChatResponse = self.try_parse(&text)?;
        Ok(map_response(parsed, model))
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, LLMError> {
        request.validate()?;
        let model = resolve_model(&request, &self.default_model);
        let body = build_cohere_body(&request.messages, &model, true)?;
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
            return Err(parse_cohere_error(response.status, &text, retry_after));
        }
        Ok(token_stream(
            response.body,
            Framing::JsonLines,
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
