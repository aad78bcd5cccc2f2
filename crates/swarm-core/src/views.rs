use crate::log::{DelegationKind, DelegationRecord, LogEntry, LogEvent};
use crate::persona::{Persona, PersonaId};
use serde::Serialize;

const EXCERPT_CHARS: usize = 160;

fn name_of(personas: &[Persona], id: PersonaId) -> String {
    personas
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("Agent {id}"))
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// One row of the timeline view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineItem {
    /// One-based step number.
    pub step: usize,
    pub kind: &'static str,
    pub headline: String,
    pub excerpt: String,
}

/// One timeline item per log entry, in log order.
pub fn timeline(entries: &[LogEntry], personas: &[Persona]) -> Vec<TimelineItem> {
    entries
        .iter()
        .map(|entry| {
            let headline = match &entry.event {
                LogEvent::Individual { persona_id, .. } => {
                    format!("Agent: {}", name_of(personas, *persona_id))
                }
                LogEvent::Collaboration { mode, .. } => format!("Collaboration - {mode}"),
                LogEvent::Synthesis { persona_id, .. } => {
                    format!("Synthesis by {}", name_of(personas, *persona_id))
                }
                LogEvent::UserInteraction { answer: Some(_), .. } => "User Answer".to_string(),
                LogEvent::UserInteraction {
                    question: Some(_), ..
                } => "Question for User".to_string(),
                LogEvent::UserInteraction { .. } => "No User Response".to_string(),
                LogEvent::Phase { .. } => "Phase".to_string(),
            };
            TimelineItem {
                step: entry.id + 1,
                kind: entry.event.kind_label(),
                headline,
                excerpt: entry.event.text().map(excerpt).unwrap_or_default(),
            }
        })
        .collect()
}

/// A group of consecutive entries opened by a Phase milestone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPhase<'a> {
    /// The milestone text, or `Phase {n}` for a group with no opening milestone.
    pub title: String,
    /// Entries inside the phase, excluding the opening milestone.
    pub entries: Vec<&'a LogEntry>,
}

/// Groups the log into phases; a new group starts at every Phase entry.
pub fn workflow<'a>(entries: &'a [LogEntry]) -> Vec<WorkflowPhase<'a>> {
    let mut groups: Vec<(Option<&'a LogEntry>, Vec<&'a LogEntry>)> = Vec::new();
    for entry in entries {
        match &entry.event {
            LogEvent::Phase { .. } => groups.push((Some(entry), Vec::new())),
            _ => match groups.last_mut() {
                Some((_, members)) => members.push(entry),
                None => groups.push((None, vec![entry])),
            },
        }
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(i, (opening, entries))| WorkflowPhase {
            title: opening
                .and_then(|e| e.event.text())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Phase {}", i + 1)),
            entries,
        })
        .collect()
}

/// A delegation record together with the log entry that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphRecord<'a> {
    pub entry_id: usize,
    pub record: &'a DelegationRecord,
}

/// Aggregated requester to delegate traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegationEdge {
    pub requester: PersonaId,
    pub delegate: PersonaId,
    pub count: usize,
}

/// Every delegation in log order plus per-pair request counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DelegationGraph<'a> {
    pub records: Vec<GraphRecord<'a>>,
    pub edges: Vec<DelegationEdge>,
}

/// Builds the delegation graph. Edges are listed in first-seen order.
pub fn delegation_graph(entries: &[LogEntry]) -> DelegationGraph<'_> {
    let mut graph = DelegationGraph::default();
    for entry in entries {
        let LogEvent::Individual { delegations, .. } = &entry.event else {
            continue;
        };
        for record in delegations {
            graph.records.push(GraphRecord {
                entry_id: entry.id,
                record,
            });
            if record.kind != DelegationKind::Request {
                continue;
            }
            match graph
                .edges
                .iter_mut()
                .find(|e| e.requester == record.source && e.delegate == record.target)
            {
                Some(edge) => edge.count += 1,
                None => graph.edges.push(DelegationEdge {
                    requester: record.source,
                    delegate: record.target,
                    count: 1,
                }),
            }
        }
    }
    graph
}
