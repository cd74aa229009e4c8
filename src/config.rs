use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::DynProvider;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::cohere::CohereProvider;
use crate::provider::openai::OpenAiProvider;
use crate::types::{ProviderKind, ProviderSelection};

/// Environment variable naming the active provider.
pub const ENV_PROVIDER: &str = "SCHOLAR_LLM_PROVIDER";
/// Environment variable holding the API key for the active provider.
pub const ENV_API_KEY: &str = "SCHOLAR_LLM_API_KEY";
/// Optional environment variable overriding the model.
pub const ENV_MODEL: &str = "SCHOLAR_LLM_MODEL";

/// One backend entry registered with the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Dispatcher key, for example `openai` or `openai-proxy`
    pub id: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Provider specific settings such as `organization`, `version` or `max_tokens`
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            id: id.into(),
            provider,
            base_url: None,
            default_model: None,
            extra: HashMap::new(),
        }
    }

    fn extra_string(&self, key: &str) -> Result<Option<String>, LLMError> {
        match self.extra.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(Some(value.clone())),
            Some(_) => Err(self.invalid(key, "expected a non-empty string")),
        }
    }

    fn extra_u32(&self, key: &str) -> Result<Option<u32>, LLMError> {
        match self.extra.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(key, "expected a positive integer")),
        }
    }

    fn invalid(&self, key: &str, reason: &str) -> LLMError {
        LLMError::InvalidConfig {
            field: format!("{}.extra.{key}", self.id.trim()),
            reason: reason.to_string(),
        }
    }
}

/// Builds a [`Dispatcher`] holding one adapter per config entry.
///
/// # Errors
///
/// [`LLMError::InvalidConfig`] for blank or duplicate ids and for malformed
/// `extra` values.
pub fn build_dispatcher_from_configs(
    configs: &[ProviderConfig],
    transport: DynHttpTransport,
) -> Result<Dispatcher, LLMError> {
    let mut builder = Dispatcher::builder();
    let mut seen = Vec::with_capacity(configs.len());

    for config in configs {
        let id = config.id.trim();
        if id.is_empty() {
            return Err(LLMError::InvalidConfig {
                field: "id".to_string(),
                reason: "provider id must not be empty".to_string(),
            });
        }
        if seen.contains(&id) {
            return Err(LLMError::InvalidConfig {
                field: "id".to_string(),
                reason: format!("duplicate provider id `{id}`"),
            });
        }
        seen.push(id);

        let provider = build_provider_from_config(config, transport.clone())?;
        tracing::debug!(id, provider = config.provider.as_str(), "registered provider");
        builder = builder.register_as(id, provider);
    }

    Ok(builder.build())
}

fn build_provider_from_config(
    config: &ProviderConfig,
    transport: DynHttpTransport,
) -> Result<DynProvider, LLMError> {
    let provider: DynProvider = match config.provider {
        ProviderKind::OpenAi => {
            let mut provider = OpenAiProvider::new(transport);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(model) = &config.default_model {
                provider = provider.with_default_model(model.clone());
            }
            if let Some(org) = config.extra_string("organization")? {
                provider = provider.with_organization(org);
            }
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(transport);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(model) = &config.default_model {
                provider = provider.with_default_model(model.clone());
            }
            if let Some(version) = config.extra_string("version")? {
                provider = provider.with_version(version);
            }
            if let Some(max_tokens) = config.extra_u32("max_tokens")? {
                provider = provider.with_max_tokens(max_tokens);
            }
            Arc::new(provider)
        }
        ProviderKind::Cohere => {
            let mut provider = CohereProvider::new(transport);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(model) = &config.default_model {
                provider = provider.with_default_model(model.clone());
            }
            Arc::new(provider)
        }
    };

    Ok(provider)
}

/// Source of the currently selected provider and its key.
///
/// Returning `None` means nothing is selected.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self) -> Option<ProviderSelection>;
}

/// Resolver holding a fixed selection.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    selection: Option<ProviderSelection>,
}

impl StaticCredentialResolver {
    pub fn new(selection: ProviderSelection) -> Self {
        Self {
            selection: Some(selection),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self) -> Option<ProviderSelection> {
        self.selection.clone()
    }
}

/// Resolver reading [`ENV_PROVIDER`], [`ENV_API_KEY`] and [`ENV_MODEL`] on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialResolver;

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self) -> Option<ProviderSelection> {
        resolve_selection(|name| std::env::var(name).ok())
    }
}

/// Builds a selection from a variable lookup.
///
/// Blank values count as unset. An unrecognised provider name is logged and
/// treated as no selection.
pub(crate) fn resolve_selection<F>(lookup: F) -> Option<ProviderSelection>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let provider = read(ENV_PROVIDER)?;
    let kind = match provider.parse::<ProviderKind>() {
        Ok(kind) => kind,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring provider selection");
            return None;
        }
    };
    let api_key = read(ENV_API_KEY)?;

    let mut selection = ProviderSelection::new(kind, api_key);
    if let Some(model) = read(ENV_MODEL) {
        selection = selection.with_model(model);
    }
    Some(selection)
}
