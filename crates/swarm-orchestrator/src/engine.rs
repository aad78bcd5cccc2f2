use crate::checkpoint::{AnswerSlot, Checkpoint, NO_ANSWER_TEXT};
use crate::collaboration::CollaborationRunner;
use crate::decision::DecisionEngine;
use crate::monitor::{LiveState, RunMonitor};
use crate::prompts;
use crate::task_runner::TaskRunner;
use crate::types::{
    pause, CollaborationChoice, CollaborationOutcome, CollaborationTranscript, Decision, Finding,
    OrchestratorConfig, RunEvent, RunFailure, RunOutcome,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use swarm_agent::{CapabilityClient, GenerationRequest};
use swarm_core::{
    merge_sources, AgentState, AgentStatus, LogEntry, LogEvent, Persona, Roster, SavedRun,
    SwarmError, SwarmResult,
};
use swarm_session::RunStore;
use tokio::sync::broadcast;
use tracing::{error, info};

const ROUND_ONE_TEXT: &str = "Phase 1: Initial Individual Research commencing...";
const ROUND_TWO_TEXT: &str = "Phase 3: Refined individual research based on collaboration outcomes.";
const STOPPED_TEXT: &str = "Research process manually stopped by the user.";
const ROUND_SEPARATOR: &str = "\n\n---\n\n";

/// The research swarm engine.
///
/// Runs the fixed pipeline: individual research, a manager decision (with an
/// optional question for the user), a collaboration, a refined individual
/// round, a second decision and collaboration, then synthesis. One run at a
/// time; share it as `Arc<ResearchOrchestrator>` so another task can stop the
/// run or answer checkpoint questions.
pub struct ResearchOrchestrator {
    roster: Roster,
    config: OrchestratorConfig,
    client: CapabilityClient,
    tasks: TaskRunner,
    collaboration: CollaborationRunner,
    decisions: DecisionEngine,
    store: Arc<dyn RunStore>,
    monitor: RunMonitor,
    checkpoint: AnswerSlot,
    running: AtomicBool,
    cancel: AtomicBool,
}

impl ResearchOrchestrator {
    pub fn new(
        client: CapabilityClient,
        roster: Roster,
        config: OrchestratorConfig,
        store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            tasks: TaskRunner::new(client.clone(), config.pacing.delegation_pause()),
            collaboration: CollaborationRunner::new(
                client.clone(),
                config.collaboration_model.clone(),
            ),
            decisions: DecisionEngine::new(client.clone()),
            monitor: RunMonitor::new(&roster),
            checkpoint: AnswerSlot::new(),
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            client,
            roster,
            config,
            store,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Subscribe to live run events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.monitor.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether a checkpoint question is waiting for an answer.
    pub fn awaiting_answer(&self) -> bool {
        self.checkpoint.is_pending()
    }

    pub fn agents(&self) -> Vec<AgentState> {
        self.monitor.agents()
    }

    pub fn log(&self) -> Vec<LogEntry> {
        self.monitor.log()
    }

    pub fn transcript(&self) -> Option<CollaborationTranscript> {
        self.monitor.transcript()
    }

    pub fn report(&self) -> Option<String> {
        self.monitor.report()
    }

    /// The classified failure of the last run, if it failed.
    pub fn last_failure(&self) -> Option<RunFailure> {
        self.monitor.failure()
    }

    pub fn snapshot(&self) -> LiveState {
        self.monitor.snapshot()
    }

    /// Run the full research pipeline for `topic`.
    ///
    /// A stop request ends the run with [`RunOutcome::Stopped`]. Any other
    /// failure aborts the remaining phases, is recorded as
    /// [`Self::last_failure`] and returned. Nothing is persisted unless
    /// synthesis completes.
    pub async fn start_research(
        &self,
        topic: &str,
        instruction: Option<&str>,
    ) -> SwarmResult<RunOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SwarmError::Orchestrator(
                "Please enter a research topic.".to_string(),
            ));
        }
        self.roster.validate()?;
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SwarmError::Orchestrator(
                "A research run is already in progress".to_string(),
            ));
        }
        let _guard = RunGuard(self);

        self.cancel.store(false, Ordering::SeqCst);
        self.monitor.begin_run(topic, &self.roster);
        let instruction = instruction.map(str::trim).filter(|i| !i.is_empty());
        let start = Instant::now();
        info!(topic = %topic, has_instruction = instruction.is_some(), "Research run started");

        let mut ctx = RunContext::new(self, topic, instruction);
        match ctx.run().await {
            Ok(outcome) => {
                info!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    entries = self.monitor.log().len(),
                    "Research run complete"
                );
                Ok(outcome)
            }
            Err(e) if e.is_cancelled() => {
                info!("Research run stopped by user");
                self.monitor.append(LogEvent::phase(STOPPED_TEXT));
                Ok(RunOutcome::Stopped)
            }
            Err(e) => {
                let failure = RunFailure::classify(&e);
                error!(error = %e, kind = ?failure.kind, "Research run failed");
                self.monitor.record_failure(failure);
                Err(e)
            }
        }
    }

    /// Request a cooperative stop. In-flight calls finish; nothing new starts.
    /// Returns false when no run is active.
    pub fn stop_research(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        info!("Stop requested");
        self.cancel.store(true, Ordering::SeqCst);
        self.checkpoint.answer(None);
        true
    }

    /// Answer the pending checkpoint question. `None` means "no answer".
    /// Returns false when no question is waiting.
    pub fn answer_checkpoint(&self, answer: Option<String>) -> bool {
        self.checkpoint.answer(answer)
    }
}

/// Exit bookkeeping that must happen however a run ends, including when the
/// `start_research` future is dropped.
struct RunGuard<'a>(&'a ResearchOrchestrator);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let orchestrator = self.0;
        orchestrator.checkpoint.clear();
        orchestrator.monitor.finish();
        orchestrator.cancel.store(false, Ordering::SeqCst);
        orchestrator.running.store(false, Ordering::SeqCst);
    }
}

/// Per-run state owned by the sequencer: the cumulative agent outputs and
/// the inputs every phase needs.
struct RunContext<'a> {
    orchestrator: &'a ResearchOrchestrator,
    topic: &'a str,
    instruction: Option<&'a str>,
    agents: Vec<AgentState>,
}

impl<'a> RunContext<'a> {
    fn new(
        orchestrator: &'a ResearchOrchestrator,
        topic: &'a str,
        instruction: Option<&'a str>,
    ) -> Self {
        Self {
            agents: AgentState::for_roster(&orchestrator.roster),
            orchestrator,
            topic,
            instruction,
        }
    }

    fn monitor(&self) -> &'a RunMonitor {
        &self.orchestrator.monitor
    }

    fn check_cancel(&self) -> SwarmResult<()> {
        if self.orchestrator.cancel.load(Ordering::SeqCst) {
            Err(SwarmError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn findings(&self) -> Vec<Finding> {
        self.agents
            .iter()
            .map(|a| Finding::new(&a.persona.role, &a.output))
            .collect()
    }

    async fn run(&mut self) -> SwarmResult<RunOutcome> {
        let orchestrator = self.orchestrator;
        let manager = orchestrator.roster.manager()?;
        let synthesizer = orchestrator.roster.synthesizer()?;

        self.check_cancel()?;
        self.monitor().append(LogEvent::phase(ROUND_ONE_TEXT));
        self.individual_round(None).await?;

        self.check_cancel()?;
        let (first, findings) = self.decide(Checkpoint::First, manager).await?;
        let first_outcome = self.collaborate(&first, &findings).await?;

        self.check_cancel()?;
        self.monitor().append(LogEvent::phase(ROUND_TWO_TEXT));
        self.individual_round(Some((&first, &first_outcome))).await?;

        self.check_cancel()?;
        let (second, findings) = self.decide(Checkpoint::Second, manager).await?;
        self.collaborate(&second, &findings).await?;

        self.check_cancel()?;
        self.synthesize(synthesizer).await
    }

    /// One pass over the roster. With a collaboration summary this is the
    /// refined round: each output is appended to the persona's previous one.
    async fn individual_round(
        &mut self,
        summary: Option<(&CollaborationChoice, &CollaborationOutcome)>,
    ) -> SwarmResult<()> {
        let orchestrator = self.orchestrator;
        let monitor = self.monitor();
        for (index, persona) in orchestrator.roster.iter().enumerate() {
            self.check_cancel()?;
            monitor.set_status(persona.id, AgentStatus::Researching);
            info!(persona = %persona.name, role = %persona.role, refined = summary.is_some(), "Agent researching");

            let context = summary.map(|(choice, outcome)| {
                format!(
                    "Based on the initial research and the following {} summary, conduct a more focused investigation from your perspective as {}. Summary: {}",
                    choice.mode, persona.role, outcome.text
                )
            });
            let output = orchestrator
                .tasks
                .run(
                    persona,
                    &orchestrator.roster,
                    self.topic,
                    context.as_deref(),
                    self.instruction,
                )
                .await?;

            let agent = &mut self.agents[index];
            if summary.is_some() {
                agent.output = format!("{}{ROUND_SEPARATOR}{}", agent.output, output.text);
                merge_sources(&mut agent.sources, &output.sources);
            } else {
                agent.output = output.text.clone();
                agent.sources = output.sources.clone();
            }
            monitor.record_output(agent);
            monitor.set_status(persona.id, AgentStatus::Idle);
            monitor.append(LogEvent::Individual {
                persona_id: persona.id,
                text: output.text,
                sources: output.sources,
                delegations: output.delegations,
            });

            pause(orchestrator.config.pacing.inter_agent_pause()).await;
        }
        Ok(())
    }

    /// Ask the manager for the next step, handling the human checkpoint.
    ///
    /// Returns a concrete collaboration mode and the findings the
    /// collaboration should see (including any user answer).
    async fn decide(
        &self,
        checkpoint: Checkpoint,
        manager: &Persona,
    ) -> SwarmResult<(CollaborationChoice, Vec<Finding>)> {
        let orchestrator = self.orchestrator;
        let mut findings = self.findings();
        let decision = orchestrator
            .decisions
            .choose(&findings, self.topic, self.instruction, manager)
            .await?;

        let choice = match decision {
            Decision::Collaborate { mode, reasoning } => CollaborationChoice { mode, reasoning },
            Decision::AskRequester { .. } if !orchestrator.config.ask_requester => {
                checkpoint.questions_disabled()
            }
            Decision::AskRequester {
                question,
                reasoning,
            } => {
                self.monitor()
                    .append(LogEvent::phase(checkpoint.question_phase(&manager.role, &reasoning)));
                self.monitor().append(LogEvent::UserInteraction {
                    question: Some(question.clone()),
                    answer: None,
                });
                info!(checkpoint = ?checkpoint, question = %question, "Waiting for user answer");
                self.monitor().question_asked(&question);

                let answer = orchestrator
                    .checkpoint
                    .ask(orchestrator.config.pacing.checkpoint_timeout(), &orchestrator.cancel)
                    .await;
                self.check_cancel()?;

                match answer {
                    Some(answer) => {
                        self.monitor().append(LogEvent::UserInteraction {
                            question: None,
                            answer: Some(answer.clone()),
                        });
                        findings.push(Finding::user_input(answer));
                    }
                    None => {
                        info!("{NO_ANSWER_TEXT}");
                        self.monitor().append(LogEvent::UserInteraction {
                            question: None,
                            answer: None,
                        });
                    }
                }

                match orchestrator
                    .decisions
                    .choose(&findings, self.topic, self.instruction, manager)
                    .await?
                {
                    Decision::Collaborate { mode, reasoning } => {
                        CollaborationChoice { mode, reasoning }
                    }
                    Decision::AskRequester { .. } => checkpoint.fallback(),
                }
            }
        };

        self.monitor()
            .append(LogEvent::phase(checkpoint.decision_phase(&manager.role, &choice)));
        Ok((choice, findings))
    }

    async fn collaborate(
        &self,
        choice: &CollaborationChoice,
        findings: &[Finding],
    ) -> SwarmResult<CollaborationOutcome> {
        // A stop may have landed during the decision call.
        self.check_cancel()?;
        let monitor = self.monitor();
        monitor.set_all_status(AgentStatus::InMeeting);
        monitor.start_transcript(choice.mode);

        let outcome = self
            .orchestrator
            .collaboration
            .run(findings, self.topic, choice.mode, self.instruction, |chunk| {
                monitor.push_chunk(chunk)
            })
            .await;
        monitor.end_transcript();
        let outcome = outcome?;

        monitor.append(LogEvent::Collaboration {
            mode: choice.mode,
            text: outcome.text.clone(),
            sources: outcome.sources.clone(),
        });
        monitor.set_all_status(AgentStatus::Idle);
        Ok(outcome)
    }

    async fn synthesize(&self, synthesizer: &Persona) -> SwarmResult<RunOutcome> {
        let orchestrator = self.orchestrator;
        let monitor = self.monitor();

        monitor.set_status(synthesizer.id, AgentStatus::Synthesizing);
        monitor.append(LogEvent::phase(format!(
            "Phase 5: {} is compiling the final report.",
            synthesizer.role
        )));
        info!(synthesizer = %synthesizer.name, "Compiling final report");

        let entries = monitor.log();
        let response = orchestrator
            .client
            .generate(
                &GenerationRequest::new(
                    &synthesizer.model,
                    prompts::synthesis(synthesizer, &entries, self.topic, self.instruction),
                )
                .with_grounding(),
            )
            .await?;
        // Stopped while the report was being written: nothing is saved.
        self.check_cancel()?;

        monitor.set_status(synthesizer.id, AgentStatus::Idle);
        monitor.set_report(&response.text);
        monitor.append(LogEvent::Synthesis {
            persona_id: synthesizer.id,
            text: response.text.clone(),
            sources: response.sources,
        });

        let agents = self
            .agents
            .iter()
            .cloned()
            .map(|mut a| {
                a.status = AgentStatus::Idle;
                a
            })
            .collect();
        let run = SavedRun::new(self.topic, monitor.log(), response.text.clone(), agents);
        let saved_id = orchestrator.store.save(&run).await?;
        info!(run_id = %saved_id, "Research run saved");

        Ok(RunOutcome::Completed {
            saved_id,
            report: response.text,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use swarm_agent::{CapabilityBackend, GenerationResponse, StreamEvent};
    use swarm_core::default_roster;
    use swarm_session::MemoryRunStore;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Fails every call; enough to exercise the entry guards.
    struct Unreachable;

    #[async_trait]
    impl CapabilityBackend for Unreachable {
        async fn generate(&self, _request: &GenerationRequest) -> SwarmResult<GenerationResponse> {
            Err(SwarmError::Capability("unreachable backend".into()))
        }

        async fn generate_stream(
            &self,
            _request: &GenerationRequest,
        ) -> SwarmResult<(
            mpsc::Receiver<StreamEvent>,
            JoinHandle<SwarmResult<GenerationResponse>>,
        )> {
            Err(SwarmError::Capability("unreachable backend".into()))
        }
    }

    fn orchestrator(roster: Roster) -> ResearchOrchestrator {
        ResearchOrchestrator::new(
            CapabilityClient::from_backend(Arc::new(Unreachable)),
            roster,
            OrchestratorConfig::default(),
            Arc::new(MemoryRunStore::new()),
        )
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let orch = orchestrator(default_roster());
        let err = orch.start_research("   ", None).await.unwrap_err();
        assert!(matches!(err, SwarmError::Orchestrator(_)));
        assert!(!orch.is_running());
        assert!(orch.log().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_roster_rejected() {
        let roster = Roster::new(
            swarm_core::default_definitions()
                .into_iter()
                .filter(|d| d.role != swarm_core::SYNTHESIZER_ROLE)
                .collect(),
            swarm_core::MANAGER_ROLE,
            swarm_core::SYNTHESIZER_ROLE,
        );
        let err = orchestrator(roster)
            .start_research("storage", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::Config(_)));
    }

    #[tokio::test]
    async fn test_failure_is_classified_and_state_reset() {
        let orch = orchestrator(default_roster());
        let err = orch.start_research("storage", None).await.unwrap_err();
        assert!(err.to_string().contains("unreachable backend"));

        let failure = orch.last_failure().unwrap();
        assert_eq!(failure.kind, crate::types::FailureKind::Generic);
        assert!(!orch.is_running());
        assert!(orch.agents().iter().all(|a| a.status == AgentStatus::Idle));
        // Phase 1 milestone survives the failure
        assert_eq!(orch.log().len(), 1);
    }

    #[test]
    fn test_stop_without_run_is_noop() {
        let orch = orchestrator(default_roster());
        assert!(!orch.stop_research());
        assert!(!orch.answer_checkpoint(Some("hello".into())));
    }
}
