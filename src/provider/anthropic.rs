//! Anthropic-compatible Messages adapter.

mod error;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::{AnthropicProvider, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
