use serde::{Deserialize, Serialize};
use std::time::Duration;
use swarm_core::{
    AgentStatus, CollaborationMode, DelegationRecord, GroundingSource, LogEntry, PersonaId,
    SwarmError,
};
use uuid::Uuid;

/// Role label attached to a user's checkpoint answer when it is fed back to
/// the manager as a finding.
pub const USER_INPUT_ROLE: &str = "User Input";

/// One persona's current output, as seen by the manager and the narrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub role: String,
    pub output: String,
}

impl Finding {
    pub fn new(role: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            output: output.into(),
        }
    }

    pub fn user_input(answer: impl Into<String>) -> Self {
        Self::new(USER_INPUT_ROLE, answer)
    }
}

/// The manager's choice for the next step.
///
/// A question is carried only by `AskRequester`, and is never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Collaborate {
        mode: CollaborationMode,
        reasoning: String,
    },
    AskRequester {
        question: String,
        reasoning: String,
    },
}

impl Decision {
    pub fn reasoning(&self) -> &str {
        match self {
            Decision::Collaborate { reasoning, .. } | Decision::AskRequester { reasoning, .. } => {
                reasoning
            }
        }
    }
}

/// A decision the sequencer can act on: always a concrete mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationChoice {
    pub mode: CollaborationMode,
    pub reasoning: String,
}

/// Output of the Agent Task Runner for one persona.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    pub delegations: Vec<DelegationRecord>,
}

/// Consolidated result of one collaboration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollaborationOutcome {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// The live transcript of the collaboration in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationTranscript {
    pub mode: CollaborationMode,
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// How a failed run is reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    RateLimited,
    Generic,
}

impl FailureKind {
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => {
                "The AI is experiencing high demand and has reached a rate limit. The research process has been stopped. Please wait a moment and try again, or check your API key's usage plan."
            }
            FailureKind::Generic => {
                "An error occurred during the research process. Please check the console for details."
            }
        }
    }
}

/// The single classified failure surfaced for a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
    /// The underlying error text, for logs.
    pub detail: String,
}

impl RunFailure {
    pub fn classify(err: &SwarmError) -> Self {
        let kind = if err.is_rate_limited() {
            FailureKind::RateLimited
        } else {
            FailureKind::Generic
        };
        Self {
            kind,
            message: kind.message().to_string(),
            detail: err.to_string(),
        }
    }
}

/// How a `start_research` call ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Synthesis completed and the run was persisted.
    Completed { saved_id: Uuid, report: String },
    /// The user stopped the run.
    Stopped,
}

/// Notifications broadcast to observers while a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted { topic: String },
    StatusChanged {
        persona_id: PersonaId,
        status: AgentStatus,
    },
    LogAppended { entry: LogEntry },
    TranscriptStarted { mode: CollaborationMode },
    TranscriptChunk { text: String },
    TranscriptEnded,
    QuestionAsked { question: String },
    ReportReady { report: String },
    Failed { failure: RunFailure },
    RunFinished,
}

/// Fixed pauses and the human wait bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Pause after each persona step of an individual round.
    #[serde(default = "default_inter_agent_pause_ms")]
    pub inter_agent_pause_ms: u64,
    /// Pause after each resolved delegation.
    #[serde(default = "default_delegation_pause_ms")]
    pub delegation_pause_ms: u64,
    /// How long a checkpoint question waits for an answer.
    #[serde(default = "default_checkpoint_timeout_secs")]
    pub checkpoint_timeout_secs: u64,
}

fn default_inter_agent_pause_ms() -> u64 {
    1500
}

fn default_delegation_pause_ms() -> u64 {
    1000
}

fn default_checkpoint_timeout_secs() -> u64 {
    300
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            inter_agent_pause_ms: default_inter_agent_pause_ms(),
            delegation_pause_ms: default_delegation_pause_ms(),
            checkpoint_timeout_secs: default_checkpoint_timeout_secs(),
        }
    }
}

impl PacingConfig {
    pub fn inter_agent_pause(&self) -> Duration {
        Duration::from_millis(self.inter_agent_pause_ms)
    }

    pub fn delegation_pause(&self) -> Duration {
        Duration::from_millis(self.delegation_pause_ms)
    }

    pub fn checkpoint_timeout(&self) -> Duration {
        Duration::from_secs(self.checkpoint_timeout_secs)
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Whether the manager may pause the run to ask the user a question.
    #[serde(default = "default_ask_requester")]
    pub ask_requester: bool,
    /// Model that narrates collaborations.
    #[serde(default = "default_collaboration_model")]
    pub collaboration_model: String,
    #[serde(default)]
    pub pacing: PacingConfig,
}

fn default_ask_requester() -> bool {
    true
}

fn default_collaboration_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ask_requester: default_ask_requester(),
            collaboration_model: default_collaboration_model(),
            pacing: PacingConfig::default(),
        }
    }
}

/// Sleeps for `duration`, skipping the timer entirely when it is zero.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        let limited = RunFailure::classify(&SwarmError::Http(
            "Gemini API error 429 Too Many Requests: RESOURCE_EXHAUSTED".into(),
        ));
        assert_eq!(limited.kind, FailureKind::RateLimited);
        assert!(limited.message.contains("rate limit"));

        let generic = RunFailure::classify(&SwarmError::Capability("boom".into()));
        assert_eq!(generic.kind, FailureKind::Generic);
        assert_eq!(generic.message, FailureKind::Generic.message());
        assert!(generic.detail.contains("boom"));
    }

    #[test]
    fn test_config_defaults() {
        let config: OrchestratorConfig = serde_json::from_str("{}").unwrap();
        assert!(config.ask_requester);
        assert_eq!(config.collaboration_model, "gemini-2.5-flash");
        assert_eq!(config.pacing.inter_agent_pause(), Duration::from_millis(1500));
        assert_eq!(config.pacing.delegation_pause(), Duration::from_secs(1));
        assert_eq!(config.pacing.checkpoint_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_run_event_tagging() {
        let json = serde_json::to_value(RunEvent::TranscriptChunk { text: "hi".into() }).unwrap();
        assert_eq!(json["type"], "transcript_chunk");
        assert_eq!(json["text"], "hi");
    }
}
