use crate::persona::PersonaId;
use crate::{GroundingSource, SwarmError, SwarmResult};
use serde::{Deserialize, Serialize};

/// The kinds of simulated multi-persona conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollaborationMode {
    Meeting,
    Debate,
    Discussion,
    #[serde(rename = "Q&A")]
    QnA,
}

impl CollaborationMode {
    /// All modes, in the order they are offered to the manager.
    pub const ALL: [CollaborationMode; 4] = [
        CollaborationMode::Meeting,
        CollaborationMode::Discussion,
        CollaborationMode::Debate,
        CollaborationMode::QnA,
    ];

    /// The wire name (`Meeting`, `Debate`, `Discussion`, `Q&A`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaborationMode::Meeting => "Meeting",
            CollaborationMode::Debate => "Debate",
            CollaborationMode::Discussion => "Discussion",
            CollaborationMode::QnA => "Q&A",
        }
    }

    /// Parses an exact wire name.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for CollaborationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a delegation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationKind {
    Request,
    Response,
}

/// One half of a delegated sub-task.
///
/// Both records of a pair carry `source` = requesting persona and
/// `target` = delegate; `kind` tells which way the message travelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub kind: DelegationKind,
    pub source: PersonaId,
    pub target: PersonaId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<GroundingSource>,
}

impl DelegationRecord {
    pub fn request(source: PersonaId, target: PersonaId, text: impl Into<String>) -> Self {
        Self {
            kind: DelegationKind::Request,
            source,
            target,
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn response(
        source: PersonaId,
        target: PersonaId,
        text: impl Into<String>,
        sources: Vec<GroundingSource>,
    ) -> Self {
        Self {
            kind: DelegationKind::Response,
            source,
            target,
            text: text.into(),
            sources,
        }
    }

    /// The persona the message came from.
    pub fn from(&self) -> PersonaId {
        match self.kind {
            DelegationKind::Request => self.source,
            DelegationKind::Response => self.target,
        }
    }

    /// The persona the message went to.
    pub fn to(&self) -> PersonaId {
        match self.kind {
            DelegationKind::Request => self.target,
            DelegationKind::Response => self.source,
        }
    }
}

/// Checks that a trace is a sequence of contiguous (Request, Response) pairs
/// naming the same (source, target).
pub fn is_well_paired(trace: &[DelegationRecord]) -> bool {
    trace.len() % 2 == 0
        && trace.chunks(2).all(|pair| {
            pair[0].kind == DelegationKind::Request
                && pair[1].kind == DelegationKind::Response
                && pair[0].source == pair[1].source
                && pair[0].target == pair[1].target
        })
}

/// What happened at one step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LogEvent {
    /// A milestone in the workflow.
    Phase { text: String },
    /// One persona's research output for a round.
    Individual {
        persona_id: PersonaId,
        text: String,
        #[serde(default)]
        sources: Vec<GroundingSource>,
        #[serde(default)]
        delegations: Vec<DelegationRecord>,
    },
    /// The consolidated transcript of a collaboration.
    Collaboration {
        mode: CollaborationMode,
        text: String,
        #[serde(default)]
        sources: Vec<GroundingSource>,
    },
    /// The final report.
    Synthesis {
        persona_id: PersonaId,
        text: String,
        #[serde(default)]
        sources: Vec<GroundingSource>,
    },
    /// A question put to the user, or the user's answer.
    UserInteraction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
}

impl LogEvent {
    pub fn phase(text: impl Into<String>) -> Self {
        LogEvent::Phase { text: text.into() }
    }

    /// Short label for the variant.
    pub fn kind_label(&self) -> &'static str {
        match self {
            LogEvent::Phase { .. } => "Phase",
            LogEvent::Individual { .. } => "Individual",
            LogEvent::Collaboration { .. } => "Collaboration",
            LogEvent::Synthesis { .. } => "Synthesis",
            LogEvent::UserInteraction { .. } => "UserInteraction",
        }
    }

    /// The main text of the event, if it has one.
    pub fn text(&self) -> Option<&str> {
        match self {
            LogEvent::Phase { text }
            | LogEvent::Individual { text, .. }
            | LogEvent::Collaboration { text, .. }
            | LogEvent::Synthesis { text, .. } => Some(text),
            LogEvent::UserInteraction { answer, question } => {
                answer.as_deref().or(question.as_deref())
            }
        }
    }

    pub fn sources(&self) -> &[GroundingSource] {
        match self {
            LogEvent::Individual { sources, .. }
            | LogEvent::Collaboration { sources, .. }
            | LogEvent::Synthesis { sources, .. } => sources,
            _ => &[],
        }
    }
}

/// An appended log event with its position in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: usize,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// The append-only, ordered record of one run.
///
/// Entry ids are contiguous and zero-based; entries never change once
/// appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResearchLog {
    entries: Vec<LogEntry>,
}

impl ResearchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from stored entries, checking id contiguity.
    pub fn from_entries(entries: Vec<LogEntry>) -> SwarmResult<Self> {
        if let Some((i, entry)) = entries.iter().enumerate().find(|(i, e)| e.id != *i) {
            return Err(SwarmError::Session(format!(
                "log entry at position {i} has id {}",
                entry.id
            )));
        }
        Ok(Self { entries })
    }

    /// Appends an event and returns the stored entry.
    pub fn append(&mut self, event: LogEvent) -> &LogEntry {
        let id = self.entries.len();
        self.entries.push(LogEntry { id, event });
        &self.entries[id]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
