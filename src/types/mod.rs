//! Shared data structures modeling chat requests, responses, and stream events.
//!
//! These types normalize provider-specific payloads so the dispatcher and callers
//! can stay agnostic of individual API differences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LLMError;

/// Author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation.
///
/// The first [`Role::System`] message of a sequence is the preamble; ordering among
/// user and assistant messages is the conversation history and is preserved.
///
/// # Examples
///
/// ```
/// use scholar_llm::types::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Summarize the abstract.");
/// assert_eq!(msg.role, Role::User);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Splits a message sequence into the preamble and the remaining history.
///
/// Only the first system message is used; any later system message is dropped.
pub(crate) fn split_system(messages: &[ChatMessage]) -> (Option<&str>, Vec<&ChatMessage>) {
    let mut system = None;
    let mut history = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => {
                if system.is_none() {
                    system = Some(message.content.as_str());
                } else {
                    tracing::debug!("ignoring additional system message");
                }
            }
            _ => history.push(message),
        }
    }
    (system, history)
}

/// Backends known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "cohere")]
    Cohere,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Cohere,
    ];

    /// Canonical provider id used as the dispatcher key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Cohere => "cohere",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| LLMError::UnknownProvider {
                provider: value.to_string(),
            })
    }
}

/// Which provider, key, and model a call should use.
///
/// Supplied fresh by a [`crate::config::CredentialResolver`] for every call.
/// The `Debug` output never includes the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl ProviderSelection {
    pub fn new(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl fmt::Debug for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSelection")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Per-call input handed to an adapter.
#[derive(Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub api_key: String,
    /// Overrides the adapter's default model when set.
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, api_key: impl Into<String>) -> Self {
        Self {
            messages,
            api_key: api_key.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Checks the preconditions shared by every adapter.
    pub(crate) fn validate(&self) -> Result<(), LLMError> {
        if self.messages.is_empty() {
            return Err(LLMError::validation("at least one message is required"));
        }
        if self.api_key.trim().is_empty() {
            return Err(LLMError::validation("api key must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("messages", &self.messages)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    Other(String),
}

/// Token counters reported by the provider, when available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Builds usage from input/output counts, deriving the total when both are known.
    pub(crate) fn from_counts(prompt: Option<u64>, completion: Option<u64>) -> Self {
        let total_tokens = match (prompt, completion) {
            (Some(p), Some(c)) => Some(p + c),
            _ => None,
        };
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens,
        }
    }
}

/// Single-shot adapter output.
///
/// `text` is empty, not an error, when the provider returned no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    pub text: String,
    pub model: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
}

/// Item yielded by a [`crate::provider::ChatStream`].
///
/// A stream yields zero or more `Token`s followed by exactly one `Completed`, or ends
/// early with an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Incremental text fragment, in arrival order.
    Token(String),
    /// The provider signalled the end of generation, or the body ended cleanly.
    Completed { finish_reason: Option<FinishReason> },
}
