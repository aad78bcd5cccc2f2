pub mod gemini;

use crate::llm::{GenerationRequest, GenerationResponse};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use swarm_core::SwarmResult;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trait for generation capability backends.
///
/// Backends perform exactly one provider call per invocation and surface raw
/// failures; retry lives in [`crate::retry::RetryingBackend`].
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `CapabilityBackend` for your struct
/// 3. Wire it up in `CapabilityClient::new()` in `llm.rs`
#[async_trait]
pub trait CapabilityBackend: Send + Sync {
    /// Single-shot generation.
    async fn generate(&self, request: &GenerationRequest) -> SwarmResult<GenerationResponse>;

    /// Streamed generation.
    ///
    /// Returns a receiver for stream events and a join handle that resolves
    /// to the final aggregated response.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> SwarmResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<SwarmResult<GenerationResponse>>,
    )>;
}
