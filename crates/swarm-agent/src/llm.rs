use crate::backends::gemini::GeminiBackend;
use crate::backends::CapabilityBackend;
use crate::config::CapabilityConfig;
use crate::retry::RetryingBackend;
use crate::stream::StreamEvent;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use swarm_core::{GroundingSource, SwarmResult, ToolCall, ToolDeclaration, ToolResult};
use tokio::sync::mpsc;

/// One turn of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Prompt text from the caller.
    User(String),
    /// A previous model reply, replayed so the model sees its own tool calls.
    Model {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Results for the tool calls of the preceding model turn.
    ToolResults(Vec<ToolResult>),
}

/// A generation request: conversation, model and options.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub turns: Vec<Turn>,
    /// Enable web grounding; cited sources come back on the response.
    pub grounding: bool,
    /// Tools the model may ask to call.
    pub tools: Vec<ToolDeclaration>,
    /// JSON Schema the response text must conform to.
    pub response_schema: Option<serde_json::Value>,
}

impl GenerationRequest {
    /// A single-prompt request with no options.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            turns: vec![Turn::User(prompt.into())],
            grounding: false,
            tools: Vec::new(),
            response_schema: None,
        }
    }

    pub fn with_grounding(mut self) -> Self {
        self.grounding = true;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// What a generation returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    pub tool_calls: Vec<ToolCall>,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Client handle over a [`CapabilityBackend`].
///
/// Cheap to clone. [`CapabilityClient::new`] builds the Gemini backend wrapped
/// in the configured retry policy; tests and embedders can supply any backend
/// through [`CapabilityClient::from_backend`].
#[derive(Clone)]
pub struct CapabilityClient {
    backend: Arc<dyn CapabilityBackend>,
}

impl CapabilityClient {
    pub fn new(config: CapabilityConfig) -> Self {
        let policy = config.retry.clone();
        let gemini: Arc<dyn CapabilityBackend> = Arc::new(GeminiBackend::new(config));
        Self {
            backend: Arc::new(RetryingBackend::new(gemini, policy)),
        }
    }

    /// Create from a pre-built backend. No retry layer is added.
    pub fn from_backend(backend: Arc<dyn CapabilityBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> SwarmResult<GenerationResponse> {
        self.backend.generate(request).await
    }

    /// Streamed generation: incremental events on the receiver, the aggregated
    /// response from the join handle.
    pub async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> SwarmResult<(
        mpsc::Receiver<StreamEvent>,
        tokio::task::JoinHandle<SwarmResult<GenerationResponse>>,
    )> {
        self.backend.generate_stream(request).await
    }

    /// Schema-constrained generation, deserialized into `T`.
    ///
    /// A reply that does not parse surfaces as [`swarm_core::SwarmError::Json`].
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        request: &GenerationRequest,
    ) -> SwarmResult<T> {
        let response = self.generate(request).await?;
        Ok(serde_json::from_str(strip_code_fence(&response.text))?)
    }
}

/// Models sometimes wrap JSON in a Markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
