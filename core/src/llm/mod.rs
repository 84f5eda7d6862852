//! LLM module: HTTP client for OpenAI-compatible backends
//!
//! This module provides:
//! - `LlmClientConfig`, `LlmClient`, `LlmResponse` for talking to Chat Completions
//! - schema-constrained completions via `ResponseSchema`
//! - streamed completions as a `DeltaStream`, decoded by `SseDecoder`

mod client;
mod sse;

pub use client::{
    delta_stream, ChatMessage, DeltaStream, LlmClient, LlmClientConfig, LlmResponse,
    MessageRole, ResponseSchema,
};
pub use sse::SseDecoder;
