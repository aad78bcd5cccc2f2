//! Core types and error definitions for the research swarm.
//!
//! This crate provides the foundational types shared across all swarm crates:
//! error handling, tool-call representations, the persona roster, the
//! append-only research log and the saved-run record handed to persistence.
//!
//! # Main types
//!
//! - [`SwarmError`]: Unified error enum for all swarm subsystems.
//! - [`SwarmResult`]: Convenience alias for `Result<T, SwarmError>`.
//! - [`ToolCall`]: A tool invocation requested by the model.
//! - [`ToolDeclaration`]: A callable tool advertised to the model.
//! - [`GroundingSource`]: A web citation returned by grounded generation.
//! - [`Roster`] / [`Persona`]: The fixed, ordered set of agent personas.
//! - [`ResearchLog`] / [`LogEntry`]: The ordered record of one research run.
//! - [`SavedRun`]: A completed run, ready for persistence.

/// Research log entries and delegation records.
pub mod log;
/// Personas, the roster and per-run agent state.
pub mod persona;
/// Saved research runs.
pub mod run;
/// Views derived from a research log (timeline, workflow, delegation graph).
pub mod views;

pub use log::{
    is_well_paired, CollaborationMode, DelegationKind, DelegationRecord, LogEntry, LogEvent,
    ResearchLog,
};
pub use persona::{
    default_definitions, default_roster, AgentState, AgentStatus, Persona, PersonaDefinition,
    PersonaId, Roster, MANAGER_ROLE, SYNTHESIZER_ROLE,
};
pub use run::SavedRun;

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for the research swarm.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    /// The generation capability rejected or failed a request.
    #[error("Capability error: {0}")]
    Capability(String),

    /// An error from an outbound HTTP request (e.g. the Gemini API).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by the research orchestrator.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// An error related to saved-run persistence or lookup.
    #[error("Session error: {0}")]
    Session(String),

    /// The run was stopped by the user.
    #[error("Research stopped by user")]
    Cancelled,

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwarmError {
    /// Whether this failure carries a rate-limit signature (`429` or
    /// `RESOURCE_EXHAUSTED`).
    ///
    /// The check is textual so it holds no matter which layer wrapped the
    /// provider's response.
    pub fn is_rate_limited(&self) -> bool {
        let msg = self.to_string();
        msg.contains("429") || msg.to_uppercase().contains("RESOURCE_EXHAUSTED")
    }

    /// Whether this error is a user-initiated stop rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SwarmError::Cancelled)
    }
}

/// A convenience `Result` alias using [`SwarmError`].
pub type SwarmResult<T> = Result<T, SwarmError>;

// --- Tool types ---

/// A request from the model to invoke a specific tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned to this call (provider-supplied or synthesized).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

/// The result fed back to the model for a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The ID of the [`ToolCall`] this result corresponds to.
    pub call_id: String,
    /// Name of the tool that produced the result.
    pub name: String,
    /// The textual output.
    pub content: String,
}

impl ToolResult {
    /// Creates a tool result for the given call.
    pub fn new(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
        }
    }
}

/// A callable tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name as the model will call it.
    pub name: String,
    /// What the tool does, in plain language.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters_schema: serde_json::Value,
}

/// A web citation attached to grounded output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingSource {
    /// Link to the cited page.
    pub uri: String,
    /// Page title as reported by the provider.
    pub title: String,
}

impl GroundingSource {
    /// Creates a new source.
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }
}

/// Appends `extra` to `sources`, skipping URIs already present.
///
/// First-seen order is preserved, so the result is always a superset of the
/// original list.
pub fn merge_sources(sources: &mut Vec<GroundingSource>, extra: &[GroundingSource]) {
    for source in extra {
        if !sources.iter().any(|s| s.uri == source.uri) {
            sources.push(source.clone());
        }
    }
}
