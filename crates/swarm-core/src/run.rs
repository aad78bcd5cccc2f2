use crate::log::LogEntry;
use crate::persona::AgentState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed research run as handed to persistence.
///
/// Created once per run that reaches synthesis; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRun {
    pub id: Uuid,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub log: Vec<LogEntry>,
    pub final_report: String,
    pub agents: Vec<AgentState>,
}

impl SavedRun {
    pub fn new(
        topic: impl Into<String>,
        log: Vec<LogEntry>,
        final_report: impl Into<String>,
        agents: Vec<AgentState>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            timestamp: Utc::now(),
            log,
            final_report: final_report.into(),
            agents,
        }
    }
}
