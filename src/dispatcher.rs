use std::collections::HashMap;
use std::sync::Arc;

use crate::callback::{CallbackGuard, StreamCallback, pump};
use crate::config::CredentialResolver;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::DynProvider;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::cohere::CohereProvider;
use crate::provider::openai::OpenAiProvider;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, ProviderKind, ProviderSelection};

/// Routes chat calls to the adapter registered under a provider id.
///
/// The dispatcher is stateless between calls: no retries, caching, or request
/// coalescing. Credentials travel with each call.
pub struct Dispatcher {
    providers: HashMap<String, DynProvider>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder {
            providers: HashMap::new(),
        }
    }

    /// Registers the three built-in adapters under `openai`, `anthropic`, and `cohere`.
    pub fn with_default_providers(transport: DynHttpTransport) -> Self {
        Self::builder()
            .register(Arc::new(OpenAiProvider::new(transport.clone())))
            .register(Arc::new(AnthropicProvider::new(transport.clone())))
            .register(Arc::new(CohereProvider::new(transport)))
            .build()
    }

    /// Single-shot call returning the completion text.
    ///
    /// # Errors
    ///
    /// [`LLMError::UnknownProvider`] when `provider_id` is not registered; otherwise
    /// whatever the adapter returned, unchanged.
    pub async fn call_llm(
        &self,
        messages: &[ChatMessage],
        provider_id: &str,
        api_key: &str,
        model: Option<&str>,
    ) -> Result<String, LLMError> {
        self.chat(messages, provider_id, api_key, model)
            .await
            .map(|response| response.text)
    }

    /// Like [`Dispatcher::call_llm`] but keeps the model, finish reason, and usage.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        provider_id: &str,
        api_key: &str,
        model: Option<&str>,
    ) -> Result<ChatResponse, LLMError> {
        let provider = self.get_provider(provider_id)?;
        tracing::debug!(provider = provider_id, messages = messages.len(), "dispatching chat");
        provider
            .chat(build_request(messages, api_key, model))
            .await
    }

    /// Streaming call. Every outcome, including an unknown provider id, is reported
    /// through `callback`; this method itself never fails.
    pub async fn call_llm_streaming<C: StreamCallback + ?Sized>(
        &self,
        messages: &[ChatMessage],
        provider_id: &str,
        api_key: &str,
        model: Option<&str>,
        callback: &mut C,
    ) {
        let mut guard = CallbackGuard::new(callback);
        let provider = match self.get_provider(provider_id) {
            Ok(provider) => provider,
            Err(err) => {
                guard.error(err);
                return;
            }
        };

        tracing::debug!(provider = provider_id, messages = messages.len(), "dispatching stream");
        match provider
            .stream_chat(build_request(messages, api_key, model))
            .await
        {
            Ok(stream) => {
                guard.activate();
                pump(stream, &mut guard).await;
            }
            Err(err) => guard.error(err),
        }
        tracing::debug!(provider = provider_id, state = ?guard.state(), "stream finished");
    }

    /// Single-shot call using a resolved [`ProviderSelection`].
    ///
    /// The selection names a provider kind; see [`Dispatcher::provider_id_for`].
    pub async fn call_selection(
        &self,
        messages: &[ChatMessage],
        selection: &ProviderSelection,
    ) -> Result<String, LLMError> {
        let provider_id = self.provider_id_for(selection.provider)?;
        self.call_llm(
            messages,
            provider_id,
            &selection.api_key,
            selection.model.as_deref(),
        )
        .await
    }

    /// Streaming call using a resolved [`ProviderSelection`].
    pub async fn call_selection_streaming<C: StreamCallback + ?Sized>(
        &self,
        messages: &[ChatMessage],
        selection: &ProviderSelection,
        callback: &mut C,
    ) {
        let provider_id = match self.provider_id_for(selection.provider) {
            Ok(provider_id) => provider_id,
            Err(err) => {
                CallbackGuard::new(callback).error(err);
                return;
            }
        };
        self.call_llm_streaming(
            messages,
            provider_id,
            &selection.api_key,
            selection.model.as_deref(),
            callback,
        )
        .await
    }

    /// Finds the id serving `kind`: the canonical id when registered, otherwise the
    /// lexicographically first id whose adapter is of that kind.
    ///
    /// # Errors
    ///
    /// [`LLMError::UnknownProvider`] when no adapter of that kind is registered.
    pub fn provider_id_for(&self, kind: ProviderKind) -> Result<&str, LLMError> {
        let canonical = kind.as_str();
        if self.providers.contains_key(canonical) {
            return Ok(canonical);
        }
        self.providers
            .iter()
            .filter(|(_, provider)| provider.name() == canonical)
            .map(|(id, _)| id.as_str())
            .min()
            .ok_or_else(|| LLMError::UnknownProvider {
                provider: canonical.to_string(),
            })
    }

    /// Asks `resolver` for the active selection and performs a single-shot call.
    ///
    /// # Errors
    ///
    /// [`LLMError::NoProviderSelected`] when the resolver has nothing selected.
    pub async fn call_active(
        &self,
        resolver: &dyn CredentialResolver,
        messages: &[ChatMessage],
    ) -> Result<String, LLMError> {
        let selection = resolver.resolve().ok_or(LLMError::NoProviderSelected)?;
        self.call_selection(messages, &selection).await
    }

    /// Streaming counterpart of [`Dispatcher::call_active`]; a missing selection is
    /// reported through `callback`.
    pub async fn call_active_streaming<C: StreamCallback + ?Sized>(
        &self,
        resolver: &dyn CredentialResolver,
        messages: &[ChatMessage],
        callback: &mut C,
    ) {
        match resolver.resolve() {
            Some(selection) => {
                self.call_selection_streaming(messages, &selection, callback)
                    .await
            }
            None => CallbackGuard::new(callback).error(LLMError::NoProviderSelected),
        }
    }

    /// Returns the registered provider ids.
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Looks up the adapter registered under `provider_id`.
    pub fn get_provider(&self, provider_id: &str) -> Result<DynProvider, LLMError> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| LLMError::UnknownProvider {
                provider: provider_id.to_string(),
            })
    }
}

fn build_request(messages: &[ChatMessage], api_key: &str, model: Option<&str>) -> ChatRequest {
    ChatRequest::new(messages.to_vec(), api_key).with_model(model.map(str::to_string))
}

/// Collects adapters before building a [`Dispatcher`].
pub struct DispatcherBuilder {
    providers: HashMap<String, DynProvider>,
}

impl DispatcherBuilder {
    /// Registers `provider` under its own name.
    pub fn register(self, provider: DynProvider) -> Self {
        let id = provider.name().to_string();
        self.register_as(id, provider)
    }

    /// Registers `provider` under a custom id, replacing any previous entry.
    pub fn register_as<S: Into<String>>(mut self, id: S, provider: DynProvider) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            providers: self.providers,
        }
    }
}
