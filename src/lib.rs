//! Provider-agnostic chat completion over OpenAI, Anthropic, and Cohere.
//!
//! A [`Dispatcher`] maps a provider id to an [`LLMProvider`] adapter and offers a
//! single-shot call returning the full text and a streaming call that pushes
//! tokens into a [`StreamCallback`].

pub mod callback;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod provider;
pub mod stream;
pub mod types;

pub use callback::{ChannelCallback, StreamCallback, StreamSignal, StreamState, TokenCollector};
pub use config::{CredentialResolver, ProviderConfig, build_dispatcher_from_configs};
pub use dispatcher::Dispatcher;
pub use error::LLMError;
pub use provider::{ChatStream, LLMProvider};
pub use types::*;
