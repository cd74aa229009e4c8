//! Cohere-compatible Chat adapter.
//!
//! The Cohere request carries only the last user message plus the preamble;
//! earlier turns are not sent.

mod error;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::{CohereProvider, DEFAULT_MODEL};
