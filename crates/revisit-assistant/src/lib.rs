//! # revisit-assistant
//!
//! Comment assistant backed by the Anthropic Messages API.
//!
//! The key is read from `ANTHROPIC_API_KEY`. Failures never stop a run:
//! the executor falls back to a template comment, and a circuit breaker
//! stops calling the API after repeated errors.

pub mod auth;
pub mod circuit_breaker;
pub mod client;
pub mod types;

pub use auth::{get_api_key, API_KEY_VAR};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::{AnthropicAssistant, RetryPolicy, ANTHROPIC_API_URL, MAX_CONTENT_CHARS};
