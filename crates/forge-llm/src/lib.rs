//! Bounded, retrying facade over a text-generation backend.
//!
//! [`LlmGateway`] is the only thing agents talk to; which concrete backend
//! sits behind it (a real provider over HTTP, or the deterministic
//! [`MockLlmBackend`]) is a configuration concern, not an agent concern.

mod backend;
mod config;
mod gateway;

pub use backend::{mock_completion, GenerateRequest, HttpLlmBackend, LlmBackend, MockLlmBackend};
pub use config::{GatewayConfig, LlmProvider};
pub use gateway::LlmGateway;
