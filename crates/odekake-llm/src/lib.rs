//! Client for the LLM collaborator that reads ambiguous page text.

pub mod client;
pub mod error;

pub use client::{LlmClient, LlmVerdict};
pub use error::LlmError;
