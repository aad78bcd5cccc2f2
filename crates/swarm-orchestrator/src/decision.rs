use crate::prompts;
use crate::types::{Decision, Finding};
use serde::Deserialize;
use serde_json::json;
use swarm_agent::{CapabilityClient, GenerationRequest};
use swarm_core::{CollaborationMode, Persona, SwarmError, SwarmResult};
use tracing::{info, warn};

/// Wire value of the action that asks the user a question.
pub const ASK_REQUESTER: &str = "ASK_REQUESTER";

/// Reasoning attached to a substituted Meeting when the reply was unusable.
pub const INVALID_RESPONSE_REASONING: &str = "Defaulted due to invalid model response.";

/// Response schema for the manager's choice.
pub fn decision_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "action": {
                "type": "STRING",
                "description": "The chosen action type, e.g., 'Meeting' or 'ASK_REQUESTER'."
            },
            "reasoning": {
                "type": "STRING",
                "description": "A brief justification for the chosen action."
            },
            "question": {
                "type": "STRING",
                "description": "The question to ask the user, ONLY if the action is 'ASK_REQUESTER'."
            }
        },
        "required": ["action", "reasoning"]
    })
}

/// The manager's reply as the model returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDecision {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

fn invalid() -> Decision {
    Decision::Collaborate {
        mode: CollaborationMode::Meeting,
        reasoning: INVALID_RESPONSE_REASONING.to_string(),
    }
}

/// Turns a raw reply into a [`Decision`], substituting a Meeting for
/// anything malformed.
pub fn interpret(raw: RawDecision) -> Decision {
    let reasoning = raw.reasoning.unwrap_or_default();

    if raw.action == ASK_REQUESTER {
        return match raw.question {
            Some(question) if !question.trim().is_empty() => {
                Decision::AskRequester { question, reasoning }
            }
            _ => {
                warn!("Manager asked for user input without a question, defaulting to Meeting");
                invalid()
            }
        };
    }

    match CollaborationMode::from_wire(&raw.action) {
        Some(mode) => Decision::Collaborate { mode, reasoning },
        None => {
            warn!(action = %raw.action, "Model returned invalid action type, defaulting to Meeting");
            invalid()
        }
    }
}

/// Asks the manager persona how the team should proceed.
pub struct DecisionEngine {
    client: CapabilityClient,
}

impl DecisionEngine {
    pub fn new(client: CapabilityClient) -> Self {
        Self { client }
    }

    /// Chooses the next action. Capability failures propagate; an
    /// unparseable reply becomes a Meeting.
    pub async fn choose(
        &self,
        findings: &[Finding],
        topic: &str,
        instruction: Option<&str>,
        manager: &Persona,
    ) -> SwarmResult<Decision> {
        let request = GenerationRequest::new(
            &manager.model,
            prompts::decision(manager, findings, topic, instruction),
        )
        .with_schema(decision_schema());

        let decision = match self.client.generate_json::<RawDecision>(&request).await {
            Ok(raw) => interpret(raw),
            Err(SwarmError::Json(e)) => {
                warn!(error = %e, "Unparseable decision reply, defaulting to Meeting");
                invalid()
            }
            Err(e) => return Err(e),
        };

        info!(
            manager = %manager.name,
            findings = findings.len(),
            decision = ?decision,
            "Manager decided next step"
        );
        Ok(decision)
    }
}
