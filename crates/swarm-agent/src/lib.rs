//! Capability client for the research swarm.
//!
//! Wraps a hosted generation API behind the [`CapabilityBackend`] trait:
//! single-shot, streamed and schema-constrained generation with optional web
//! grounding and tool calling. [`RetryingBackend`] layers the rate-limit retry
//! policy over any backend.

pub mod backends;
pub mod config;
pub mod llm;
pub mod retry;
pub mod stream;

pub use backends::gemini::GeminiBackend;
pub use backends::CapabilityBackend;
pub use config::CapabilityConfig;
pub use llm::{CapabilityClient, GenerationRequest, GenerationResponse, Turn};
pub use retry::{with_retry, RetryPolicy, RetryingBackend};
pub use stream::StreamEvent;
