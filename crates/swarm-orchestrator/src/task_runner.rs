use crate::delegation::{tool_declarations, DelegationResolver};
use crate::prompts;
use crate::types::AgentOutput;
use std::time::Duration;
use swarm_agent::{CapabilityClient, GenerationRequest, Turn};
use swarm_core::{Persona, Roster, SwarmResult};
use tracing::info;

/// Runs one persona's research step, including any delegations it asks for.
///
/// The first call offers the delegation tools and no grounding. When the
/// model requests tools, their results are fed back in a second, grounded
/// call without tools. That second call happens even if every requested
/// tool was unroutable.
pub struct TaskRunner {
    client: CapabilityClient,
    resolver: DelegationResolver,
}

impl TaskRunner {
    pub fn new(client: CapabilityClient, delegation_pause: Duration) -> Self {
        Self {
            resolver: DelegationResolver::new(client.clone(), delegation_pause),
            client,
        }
    }

    pub async fn run(
        &self,
        persona: &Persona,
        roster: &Roster,
        topic: &str,
        context: Option<&str>,
        instruction: Option<&str>,
    ) -> SwarmResult<AgentOutput> {
        let prompt = prompts::agent_task(persona, topic, context, instruction);
        let first = self
            .client
            .generate(
                &GenerationRequest::new(&persona.model, prompt.clone())
                    .with_tools(tool_declarations()),
            )
            .await?;

        if !first.has_tool_calls() {
            return Ok(AgentOutput {
                text: first.text,
                sources: first.sources,
                delegations: Vec::new(),
            });
        }

        info!(
            persona = %persona.name,
            tool_calls = first.tool_calls.len(),
            "Agent requested delegations"
        );
        let resolution = self
            .resolver
            .resolve(&first.tool_calls, persona, roster, topic, instruction)
            .await?;

        let mut follow_up = GenerationRequest::new(&persona.model, prompt).with_grounding();
        follow_up.turns.push(Turn::Model {
            text: (!first.text.is_empty()).then_some(first.text),
            tool_calls: first.tool_calls,
        });
        if !resolution.results.is_empty() {
            follow_up.turns.push(Turn::ToolResults(resolution.results));
        }

        let second = self.client.generate(&follow_up).await?;
        Ok(AgentOutput {
            text: second.text,
            sources: second.sources,
            delegations: resolution.trace,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use swarm_agent::{CapabilityBackend, GenerationResponse, StreamEvent};
    use swarm_core::{default_roster, GroundingSource, SwarmError, ToolCall};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Replies to tool-enabled requests with the configured calls, to
    /// delegated briefings with a fixed answer, and to everything else with
    /// a grounded final text.
    struct ScriptBackend {
        calls: Vec<ToolCall>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptBackend {
        fn new(calls: Vec<ToolCall>) -> Arc<Self> {
            Arc::new(Self {
                calls,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CapabilityBackend for ScriptBackend {
        async fn generate(&self, request: &GenerationRequest) -> SwarmResult<GenerationResponse> {
            self.requests.lock().push(request.clone());
            if !request.tools.is_empty() {
                return Ok(GenerationResponse {
                    text: if self.calls.is_empty() {
                        "solo findings".into()
                    } else {
                        String::new()
                    },
                    sources: vec![],
                    tool_calls: self.calls.clone(),
                });
            }
            if request.turns.len() == 1 {
                return Ok(GenerationResponse::text("verified"));
            }
            Ok(GenerationResponse {
                text: "merged findings".into(),
                sources: vec![GroundingSource::new("https://grid.example", "Grid")],
                tool_calls: vec![],
            })
        }

        async fn generate_stream(
            &self,
            _request: &GenerationRequest,
        ) -> SwarmResult<(
            mpsc::Receiver<StreamEvent>,
            JoinHandle<SwarmResult<GenerationResponse>>,
        )> {
            Err(SwarmError::Capability("no streams here".into()))
        }
    }

    fn fact_check() -> ToolCall {
        ToolCall {
            id: "call_0".into(),
            name: "factCheck".into(),
            arguments: serde_json::json!({"claim": "pumped hydro dominates"}),
        }
    }

    fn runner(backend: Arc<ScriptBackend>) -> TaskRunner {
        TaskRunner::new(CapabilityClient::from_backend(backend), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_no_tool_calls_returns_first_reply() {
        let backend = ScriptBackend::new(vec![]);
        let roster = default_roster();
        let output = runner(backend.clone())
            .run(roster.get(1).unwrap(), &roster, "storage", None, None)
            .await
            .unwrap();

        assert_eq!(output.text, "solo findings");
        assert!(output.delegations.is_empty());
        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].grounding);
        assert_eq!(requests[0].tools.len(), 4);
    }

    #[tokio::test]
    async fn test_tool_calls_trigger_grounded_follow_up() {
        let backend = ScriptBackend::new(vec![fact_check()]);
        let roster = default_roster();
        let output = runner(backend.clone())
            .run(roster.get(1).unwrap(), &roster, "storage", Some("narrow it"), None)
            .await
            .unwrap();

        assert_eq!(output.text, "merged findings");
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.delegations.len(), 2);

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 3);
        let follow_up = &requests[2];
        assert!(follow_up.grounding);
        assert!(follow_up.tools.is_empty());
        assert_eq!(follow_up.turns.len(), 3);
        assert!(matches!(&follow_up.turns[1], Turn::Model { text: None, tool_calls } if tool_calls.len() == 1));
        match &follow_up.turns[2] {
            Turn::ToolResults(results) => assert_eq!(results[0].content, "verified"),
            other => panic!("expected tool results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unroutable_calls_still_run_second_round() {
        let backend = ScriptBackend::new(vec![ToolCall {
            id: "call_0".into(),
            name: "consultOracle".into(),
            arguments: serde_json::json!({}),
        }]);
        let roster = default_roster();
        let output = runner(backend.clone())
            .run(roster.get(1).unwrap(), &roster, "storage", None, None)
            .await
            .unwrap();

        assert_eq!(output.text, "merged findings");
        assert!(output.delegations.is_empty());
        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].turns.len(), 2);
    }
}
