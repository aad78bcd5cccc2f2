use crate::prompts;
use crate::types::pause;
use serde_json::json;
use std::time::Duration;
use swarm_agent::{CapabilityClient, GenerationRequest};
use swarm_core::{DelegationRecord, Persona, Roster, SwarmResult, ToolCall, ToolDeclaration, ToolResult};
use tracing::{debug, info};

/// Static table routing each delegation tool to the role that serves it.
pub const TOOL_ROLE_MAP: &[(&str, &str)] = &[
    ("factCheck", "Fact-Checker"),
    ("findData", "Data Analyst"),
    ("getHistoricalContext", "Historical Context Analyst"),
    ("challengeAssumption", "Critic & Devil's Advocate"),
];

/// The role a tool delegates to, if the tool is known.
pub fn role_for_tool(tool: &str) -> Option<&'static str> {
    TOOL_ROLE_MAP
        .iter()
        .find(|(name, _)| *name == tool)
        .map(|(_, role)| *role)
}

fn string_param(name: &str, description: &str, param: &str, param_description: &str) -> ToolDeclaration {
    ToolDeclaration {
        name: name.to_string(),
        description: description.to_string(),
        parameters_schema: json!({
            "type": "OBJECT",
            "properties": {
                param: {"type": "STRING", "description": param_description}
            },
            "required": [param]
        }),
    }
}

/// Declarations for every tool in [`TOOL_ROLE_MAP`].
pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![
        string_param(
            "factCheck",
            "Verify a specific claim for accuracy using reliable sources.",
            "claim",
            "The specific claim to be verified.",
        ),
        string_param(
            "findData",
            "Find quantitative data, statistics, or specific numbers related to a query.",
            "query",
            "The specific data or statistic being requested.",
        ),
        string_param(
            "getHistoricalContext",
            "Provide historical background or context for a particular event, person, or topic.",
            "topic",
            "The topic needing historical context.",
        ),
        string_param(
            "challengeAssumption",
            "Challenge an assumption or argument to test its validity. Identify potential flaws.",
            "assumption",
            "The assumption or argument to be challenged.",
        ),
    ]
}

/// Text of a Request record: the call with its argument object unwrapped.
pub fn request_text(call: &ToolCall) -> String {
    let args = call.arguments.to_string();
    let inner = args
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(&args);
    format!("Tasked to perform: {}({inner})", call.name)
}

/// Result of resolving one batch of tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Request/Response pairs, in call order.
    pub trace: Vec<DelegationRecord>,
    /// One result per resolved call, fed back to the requester.
    pub results: Vec<ToolResult>,
}

/// Hands tool calls off to the personas that serve them.
pub struct DelegationResolver {
    client: CapabilityClient,
    pause: Duration,
}

impl DelegationResolver {
    pub fn new(client: CapabilityClient, pause: Duration) -> Self {
        Self { client, pause }
    }

    /// Resolves `calls` strictly in order. Unknown tools and roles missing
    /// from the roster are skipped.
    pub async fn resolve(
        &self,
        calls: &[ToolCall],
        requester: &Persona,
        roster: &Roster,
        topic: &str,
        instruction: Option<&str>,
    ) -> SwarmResult<Resolution> {
        let mut resolution = Resolution::default();

        for call in calls {
            let Some(delegate) = role_for_tool(&call.name).and_then(|role| roster.find_by_role(role))
            else {
                debug!(tool = %call.name, requester = %requester.name, "Skipping unroutable delegation");
                continue;
            };

            info!(
                tool = %call.name,
                requester = %requester.name,
                delegate = %delegate.name,
                "Delegating task"
            );
            resolution.trace.push(DelegationRecord::request(
                requester.id,
                delegate.id,
                request_text(call),
            ));

            let prompt = prompts::delegated_task(
                delegate,
                requester,
                topic,
                &call.name,
                &call.arguments,
                instruction,
            );
            let response = self
                .client
                .generate(&GenerationRequest::new(&delegate.model, prompt).with_grounding())
                .await?;

            resolution.trace.push(DelegationRecord::response(
                requester.id,
                delegate.id,
                response.text.clone(),
                response.sources,
            ));
            resolution.results.push(ToolResult::new(call, response.text));

            pause(self.pause).await;
        }

        Ok(resolution)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use swarm_agent::{CapabilityBackend, GenerationResponse, StreamEvent, Turn};
    use swarm_core::{
        default_definitions, default_roster, is_well_paired, DelegationKind, GroundingSource,
        SwarmError, MANAGER_ROLE, SYNTHESIZER_ROLE,
    };
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Echoes the first line of the prompt and records every request.
    #[derive(Default)]
    struct EchoBackend {
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl CapabilityBackend for EchoBackend {
        async fn generate(&self, request: &GenerationRequest) -> SwarmResult<GenerationResponse> {
            self.requests.lock().push(request.clone());
            let Some(Turn::User(prompt)) = request.turns.first() else {
                return Err(SwarmError::Capability("no prompt".into()));
            };
            Ok(GenerationResponse {
                text: prompt.lines().next().unwrap_or_default().to_string(),
                sources: vec![GroundingSource::new("https://src.example", "Src")],
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

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: args,
        }
    }

    fn resolver(backend: Arc<EchoBackend>) -> DelegationResolver {
        DelegationResolver::new(CapabilityClient::from_backend(backend), Duration::ZERO)
    }

    #[test]
    fn test_tool_role_map_and_declarations_agree() {
        let declarations = tool_declarations();
        assert_eq!(declarations.len(), TOOL_ROLE_MAP.len());
        for decl in &declarations {
            assert!(role_for_tool(&decl.name).is_some(), "{}", decl.name);
        }
        assert_eq!(role_for_tool("factCheck"), Some("Fact-Checker"));
        assert_eq!(role_for_tool("summon"), None);
    }

    #[test]
    fn test_request_text_unwraps_arguments() {
        let text = request_text(&call("factCheck", json!({"claim": "Li-ion is cheapest"})));
        assert_eq!(text, "Tasked to perform: factCheck(\"claim\":\"Li-ion is cheapest\")");
    }

    #[tokio::test]
    async fn test_resolve_produces_paired_trace() {
        let backend = Arc::new(EchoBackend::default());
        let roster = default_roster();
        let lyra = roster.get(1).unwrap();

        let resolution = resolver(backend.clone())
            .resolve(
                &[
                    call("factCheck", json!({"claim": "a"})),
                    call("findData", json!({"query": "b"})),
                ],
                lyra,
                &roster,
                "storage",
                None,
            )
            .await
            .unwrap();

        assert_eq!(resolution.trace.len(), 4);
        assert!(is_well_paired(&resolution.trace));
        assert_eq!(resolution.trace[0].target, 3);
        assert_eq!(resolution.trace[2].target, 2);
        assert_eq!(resolution.trace[1].kind, DelegationKind::Response);
        assert_eq!(resolution.trace[1].text, "You are Caelus, the Fact-Checker.");
        assert_eq!(resolution.trace[1].sources.len(), 1);
        assert_eq!(resolution.results[1].name, "findData");

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.grounding && r.tools.is_empty()));
        assert_eq!(requests[0].model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_unroutable_calls_are_skipped() {
        let backend = Arc::new(EchoBackend::default());
        let defs = default_definitions()
            .into_iter()
            .filter(|d| d.role != "Fact-Checker")
            .collect();
        let roster = Roster::new(defs, MANAGER_ROLE, SYNTHESIZER_ROLE);
        let lyra = roster.get(1).unwrap();

        let resolution = resolver(backend.clone())
            .resolve(
                &[
                    call("factCheck", json!({"claim": "a"})),
                    call("summonOracle", json!({})),
                ],
                lyra,
                &roster,
                "storage",
                None,
            )
            .await
            .unwrap();

        assert!(resolution.trace.is_empty());
        assert!(resolution.results.is_empty());
        assert!(backend.requests.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_follows_each_delegation() {
        let backend = Arc::new(EchoBackend::default());
        let roster = default_roster();
        let resolver = DelegationResolver::new(
            CapabilityClient::from_backend(backend),
            Duration::from_secs(1),
        );

        let started = tokio::time::Instant::now();
        resolver
            .resolve(
                &[
                    call("factCheck", json!({"claim": "a"})),
                    call("getHistoricalContext", json!({"topic": "b"})),
                ],
                roster.get(1).unwrap(),
                &roster,
                "storage",
                None,
            )
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}
