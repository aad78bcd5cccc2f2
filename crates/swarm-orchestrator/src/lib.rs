//! Research orchestration engine: personas research, delegate, collaborate
//! and synthesize a final report.
//!
//! Implements a fixed multi-phase pipeline over a roster of personas. Each
//! persona researches the topic on its own (delegating focused sub-tasks to
//! specialists through tool calls), a manager persona picks how the team
//! should collaborate (optionally pausing to ask the user a question), and a
//! synthesizer persona writes the final report from the complete log.
//!
//! # Main types
//!
//! - [`ResearchOrchestrator`]: Top-level engine that sequences a research run.
//! - [`RunMonitor`]: Live run state, broadcast to subscribers as [`RunEvent`]s.
//! - [`TaskRunner`]: One persona's research step, with delegation.
//! - [`DelegationResolver`]: Routes tool calls to the personas that serve them.
//! - [`CollaborationRunner`]: Streams a narrated multi-persona conversation.
//! - [`DecisionEngine`]: The manager's choice of the next step.

/// Human checkpoints and the answer rendezvous.
pub mod checkpoint;
/// Streamed collaboration narration.
pub mod collaboration;
/// The manager's next-step decision.
pub mod decision;
/// Tool-call delegation between personas.
pub mod delegation;
/// Research pipeline sequencing.
pub mod engine;
/// Live run state and event broadcast.
pub mod monitor;
/// Prompt builders.
pub mod prompts;
/// Per-persona research step.
pub mod task_runner;
/// Shared orchestration types (findings, decisions, run events, config).
pub mod types;

pub use checkpoint::{AnswerSlot, Checkpoint};
pub use collaboration::CollaborationRunner;
pub use decision::{DecisionEngine, ASK_REQUESTER};
pub use delegation::{role_for_tool, tool_declarations, DelegationResolver, TOOL_ROLE_MAP};
pub use engine::ResearchOrchestrator;
pub use monitor::{LiveState, RunMonitor};
pub use task_runner::TaskRunner;
pub use types::{
    AgentOutput, CollaborationChoice, CollaborationOutcome, CollaborationTranscript, Decision,
    FailureKind, Finding, OrchestratorConfig, PacingConfig, RunEvent, RunFailure, RunOutcome,
};
