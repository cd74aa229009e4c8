use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the chat dispatcher and its adapters.
///
/// Single-shot calls return these values directly. Streaming calls never return them;
/// they are handed to [`crate::callback::StreamCallback::on_error`] instead.
#[derive(Debug, Error)]
pub enum LLMError {
    /// No adapter is registered under the requested provider id.
    #[error("unknown provider: {provider}")]
    UnknownProvider { provider: String },
    /// The credential resolver reported that no provider is selected.
    #[error("no provider selected")]
    NoProviderSelected,
    /// The provider answered with a non-success HTTP status.
    #[error("provider {provider} returned HTTP {status}: {message}")]
    Http {
        /// Name of the adapter, such as `openai`.
        provider: &'static str,
        /// Numeric HTTP status code.
        status: u16,
        /// Error message extracted from the body, or the raw body.
        message: String,
        /// Wait duration suggested through `Retry-After`, if any. Never acted upon here.
        retry_after: Option<Duration>,
    },
    /// Represents connection, read, or other transport-layer failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The provider answered successfully but the payload could not be used,
    /// or it reported an error inside an open stream.
    #[error("provider {provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
    /// Signals invalid call arguments, such as an empty message list.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Raised when building a dispatcher from configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use scholar_llm::error::LLMError;
    ///
    /// let err = LLMError::transport("connection reset");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Provider`] with the given adapter name and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use scholar_llm::error::LLMError;
    ///
    /// let err = LLMError::provider("cohere", "bad JSON payload");
    /// assert!(matches!(err, LLMError::Provider { provider: "cohere", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Validation`].
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by [`LLMError::Http`].
    ///
    /// # Examples
    ///
    /// ```
    /// use scholar_llm::error::LLMError;
    ///
    /// let err = LLMError::Http {
    ///     provider: "openai",
    ///     status: 401,
    ///     message: "bad key".into(),
    ///     retry_after: None,
    /// };
    /// assert_eq!(err.status(), Some(401));
    /// assert_eq!(LLMError::transport("reset").status(), None);
    /// ```
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
