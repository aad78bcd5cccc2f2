use crate::prompts;
use crate::types::{CollaborationOutcome, Finding};
use swarm_agent::{CapabilityClient, GenerationRequest, StreamEvent};
use swarm_core::{CollaborationMode, SwarmError, SwarmResult};
use tracing::{error, info};

/// Forwarded to the live transcript when a collaboration stream fails.
pub const STREAM_ERROR_CHUNK: &str =
    "\n\n--- An error occurred during the live collaboration. This may be due to API rate limits. ---";

/// Narrates a multi-persona conversation as one streamed, grounded generation.
pub struct CollaborationRunner {
    client: CapabilityClient,
    model: String,
}

impl CollaborationRunner {
    pub fn new(client: CapabilityClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Streams the collaboration, forwarding every text chunk to `on_chunk`.
    ///
    /// On failure [`STREAM_ERROR_CHUNK`] is forwarded before the error is
    /// returned; chunks already delivered stay delivered.
    pub async fn run<F>(
        &self,
        findings: &[Finding],
        topic: &str,
        mode: CollaborationMode,
        instruction: Option<&str>,
        mut on_chunk: F,
    ) -> SwarmResult<CollaborationOutcome>
    where
        F: FnMut(&str) + Send,
    {
        info!(mode = %mode, participants = findings.len(), "Starting collaboration");

        let request = GenerationRequest::new(
            &self.model,
            prompts::collaboration(findings, topic, mode, instruction),
        )
        .with_grounding();

        match self.stream(&request, &mut on_chunk).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(mode = %mode, error = %e, "Collaboration stream failed");
                on_chunk(STREAM_ERROR_CHUNK);
                Err(e)
            }
        }
    }

    async fn stream<F>(
        &self,
        request: &GenerationRequest,
        on_chunk: &mut F,
    ) -> SwarmResult<CollaborationOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let (mut rx, handle) = self.client.generate_stream(request).await?;

        let mut text = String::new();
        let mut stream_error = None;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text: chunk } => {
                    if !chunk.is_empty() {
                        text.push_str(&chunk);
                        on_chunk(&chunk);
                    }
                }
                StreamEvent::Done => break,
                StreamEvent::Error { message } => {
                    stream_error = Some(message);
                    break;
                }
            }
        }

        let response = handle
            .await
            .map_err(|e| SwarmError::Capability(format!("Collaboration stream task failed: {e}")))??;
        if let Some(message) = stream_error {
            return Err(SwarmError::Capability(message));
        }

        Ok(CollaborationOutcome {
            text,
            sources: response.sources,
        })
    }
}
