//! AI provider access and everything built on top of it.

pub mod content;
pub mod models;
pub mod processor;
pub mod prompts;
pub mod provider;
pub mod synonyms;

pub use processor::AiProcessor;
pub use provider::{ChatRequest, HttpLlmClient, LlmClient, LlmSettings, Provider};
