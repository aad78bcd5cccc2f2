use crate::types::{CollaborationTranscript, RunEvent, RunFailure};
use parking_lot::RwLock;
use serde::Serialize;
use swarm_core::{
    AgentState, AgentStatus, CollaborationMode, LogEntry, LogEvent, PersonaId, ResearchLog, Roster,
};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 1024;

/// Everything an observer can see about the current (or last) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveState {
    pub topic: Option<String>,
    pub agents: Vec<AgentState>,
    pub log: ResearchLog,
    pub transcript: Option<CollaborationTranscript>,
    pub report: Option<String>,
    pub failure: Option<RunFailure>,
}

/// Tracks live run state and broadcasts every change as a [`RunEvent`].
///
/// Only the running sequencer writes; readers get cloned snapshots. Locks are
/// never held across an await.
pub struct RunMonitor {
    state: RwLock<LiveState>,
    events: broadcast::Sender<RunEvent>,
}

impl RunMonitor {
    pub fn new(roster: &Roster) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(LiveState {
                agents: AgentState::for_roster(roster),
                ..LiveState::default()
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RunEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Resets live state for a new run.
    pub fn begin_run(&self, topic: &str, roster: &Roster) {
        *self.state.write() = LiveState {
            topic: Some(topic.to_string()),
            agents: AgentState::for_roster(roster),
            ..LiveState::default()
        };
        self.emit(RunEvent::RunStarted {
            topic: topic.to_string(),
        });
    }

    pub fn set_status(&self, persona_id: PersonaId, status: AgentStatus) {
        {
            let mut state = self.state.write();
            match state.agents.iter_mut().find(|a| a.persona.id == persona_id) {
                Some(agent) => agent.status = status,
                None => return,
            }
        }
        self.emit(RunEvent::StatusChanged { persona_id, status });
    }

    pub fn set_all_status(&self, status: AgentStatus) {
        let ids: Vec<PersonaId> = {
            let mut state = self.state.write();
            state
                .agents
                .iter_mut()
                .filter(|a| a.status != status)
                .map(|a| {
                    a.status = status;
                    a.persona.id
                })
                .collect()
        };
        for persona_id in ids {
            self.emit(RunEvent::StatusChanged { persona_id, status });
        }
    }

    /// Replaces one agent's cumulative output and sources.
    pub fn record_output(&self, updated: &AgentState) {
        let mut state = self.state.write();
        if let Some(agent) = state
            .agents
            .iter_mut()
            .find(|a| a.persona.id == updated.persona.id)
        {
            agent.output = updated.output.clone();
            agent.sources = updated.sources.clone();
        }
    }

    /// Appends to the live log and returns the stored entry.
    pub fn append(&self, event: LogEvent) -> LogEntry {
        let entry = self.state.write().log.append(event).clone();
        self.emit(RunEvent::LogAppended {
            entry: entry.clone(),
        });
        entry
    }

    pub fn start_transcript(&self, mode: CollaborationMode) {
        self.state.write().transcript = Some(CollaborationTranscript {
            mode,
            text: String::new(),
            sources: Vec::new(),
        });
        self.emit(RunEvent::TranscriptStarted { mode });
    }

    pub fn push_chunk(&self, chunk: &str) {
        if let Some(transcript) = self.state.write().transcript.as_mut() {
            transcript.text.push_str(chunk);
        }
        self.emit(RunEvent::TranscriptChunk {
            text: chunk.to_string(),
        });
    }

    /// Discards the live transcript.
    pub fn end_transcript(&self) {
        if self.state.write().transcript.take().is_some() {
            self.emit(RunEvent::TranscriptEnded);
        }
    }

    pub fn question_asked(&self, question: &str) {
        self.emit(RunEvent::QuestionAsked {
            question: question.to_string(),
        });
    }

    pub fn set_report(&self, report: &str) {
        self.state.write().report = Some(report.to_string());
        self.emit(RunEvent::ReportReady {
            report: report.to_string(),
        });
    }

    pub fn record_failure(&self, failure: RunFailure) {
        self.state.write().failure = Some(failure.clone());
        self.emit(RunEvent::Failed { failure });
    }

    /// Exit bookkeeping: every agent idle, no live transcript.
    pub fn finish(&self) {
        self.end_transcript();
        self.set_all_status(AgentStatus::Idle);
        self.emit(RunEvent::RunFinished);
    }

    pub fn snapshot(&self) -> LiveState {
        self.state.read().clone()
    }

    pub fn agents(&self) -> Vec<AgentState> {
        self.state.read().agents.clone()
    }

    pub fn log(&self) -> Vec<LogEntry> {
        self.state.read().log.entries().to_vec()
    }

    pub fn transcript(&self) -> Option<CollaborationTranscript> {
        self.state.read().transcript.clone()
    }

    pub fn report(&self) -> Option<String> {
        self.state.read().report.clone()
    }

    pub fn failure(&self) -> Option<RunFailure> {
        self.state.read().failure.clone()
    }

    /// Serialize the current state as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}
