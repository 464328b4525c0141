//! Concrete [`LlmProvider`](crate::agent::LlmProvider) implementations.

pub mod openai;

pub use openai::OpenAiProvider;
