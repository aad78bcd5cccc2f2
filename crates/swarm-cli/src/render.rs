//! Plain-text rendering of live log entries, saved runs and the roster.

use std::fmt::Write;
use swarm_core::views::{delegation_graph, timeline, workflow};
use swarm_core::{
    DelegationKind, GroundingSource, LogEntry, LogEvent, Persona, PersonaId, Roster, SavedRun,
};
use swarm_orchestrator::TOOL_ROLE_MAP;

const WORKFLOW_EXCERPT_CHARS: usize = 100;

fn name_of(personas: &[Persona], id: PersonaId) -> String {
    personas
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("Agent {id}"))
}

fn first_line(text: &str, max: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

fn sources_block(out: &mut String, sources: &[GroundingSource]) {
    if sources.is_empty() {
        return;
    }
    let _ = writeln!(out, "Sources:");
    for source in sources {
        let _ = writeln!(out, "  - {} <{}>", source.title, source.uri);
    }
}

/// Renders a log entry as it is appended during a live run.
///
/// Collaboration and synthesis text is streamed or printed separately, so only
/// their sources are shown.
pub fn live_entry(entry: &LogEntry, personas: &[Persona]) -> String {
    let mut out = String::new();
    match &entry.event {
        LogEvent::Phase { text } => {
            let _ = writeln!(out, "\n== {text}");
        }
        LogEvent::Individual {
            persona_id,
            text,
            sources,
            delegations,
        } => {
            let role = personas
                .iter()
                .find(|p| p.id == *persona_id)
                .map(|p| p.role.as_str())
                .unwrap_or("Agent");
            let _ = writeln!(out, "\n[{} ({role})]", name_of(personas, *persona_id));
            for record in delegations.iter().filter(|r| r.kind == DelegationKind::Request) {
                let _ = writeln!(
                    out,
                    "  -> {}: {}",
                    name_of(personas, record.target),
                    record.text
                );
            }
            let _ = writeln!(out, "{}", text.trim_end());
            sources_block(&mut out, sources);
        }
        LogEvent::Collaboration { mode, sources, .. } => {
            let _ = writeln!(out, "\n[{mode} concluded]");
            sources_block(&mut out, sources);
        }
        LogEvent::Synthesis { sources, .. } => {
            let _ = writeln!(out, "\n[Final report ready]");
            sources_block(&mut out, sources);
        }
        LogEvent::UserInteraction { question, answer } => match (question, answer) {
            (Some(q), _) => {
                let _ = writeln!(out, "\nQuestion for you: {q}");
            }
            (None, Some(a)) => {
                let _ = writeln!(out, "You answered: {a}");
            }
            (None, None) => {}
        },
    }
    out
}

pub fn run_list(runs: &[SavedRun]) -> String {
    if runs.is_empty() {
        return "No saved runs.\n".to_string();
    }
    let mut out = String::from("Saved runs:\n");
    for run in runs {
        let _ = writeln!(
            out,
            "  {}  {}  {}",
            run.id,
            run.timestamp.format("%Y-%m-%d %H:%M"),
            run.topic
        );
    }
    let _ = writeln!(out, "\nTotal: {} run(s)", runs.len());
    out
}

fn run_personas(run: &SavedRun) -> Vec<Persona> {
    run.agents.iter().map(|a| a.persona.clone()).collect()
}

pub fn timeline_view(run: &SavedRun) -> String {
    let personas = run_personas(run);
    let mut out = String::new();
    for item in timeline(&run.log, &personas) {
        let _ = writeln!(out, "{:>3}. [{}] {}", item.step, item.kind, item.headline);
        if !item.excerpt.is_empty() {
            let _ = writeln!(out, "     {}", item.excerpt);
        }
    }
    out
}

pub fn workflow_view(run: &SavedRun) -> String {
    let personas = run_personas(run);
    let mut out = String::new();
    for phase in workflow(&run.log) {
        let _ = writeln!(out, "\n{}", first_line(&phase.title, WORKFLOW_EXCERPT_CHARS));
        for entry in phase.entries {
            let who = match &entry.event {
                LogEvent::Individual { persona_id, .. } | LogEvent::Synthesis { persona_id, .. } => {
                    name_of(&personas, *persona_id)
                }
                LogEvent::Collaboration { mode, .. } => mode.to_string(),
                _ => "User".to_string(),
            };
            let text = entry.event.text().unwrap_or("");
            let _ = writeln!(
                out,
                "  - {who}: {}",
                first_line(text, WORKFLOW_EXCERPT_CHARS)
            );
        }
    }
    out
}

pub fn delegations_view(run: &SavedRun) -> String {
    let personas = run_personas(run);
    let graph = delegation_graph(&run.log);
    if graph.records.is_empty() {
        return "No delegations in this run.\n".to_string();
    }

    let mut out = String::from("Edges:\n");
    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  {} -> {} ({} request(s))",
            name_of(&personas, edge.requester),
            name_of(&personas, edge.delegate),
            edge.count
        );
    }
    let _ = writeln!(out, "\nMessages:");
    for item in &graph.records {
        let record = item.record;
        let _ = writeln!(
            out,
            "  #{} {:?} {} -> {}: {}",
            item.entry_id,
            record.kind,
            name_of(&personas, record.from()),
            name_of(&personas, record.to()),
            first_line(&record.text, WORKFLOW_EXCERPT_CHARS)
        );
    }
    out
}

pub fn roster_view(roster: &Roster) -> String {
    let mut out = String::from("Personas:\n");
    for persona in roster.iter() {
        let marker = if persona.role == roster.manager_role() {
            " [manager]"
        } else if persona.role == roster.synthesizer_role() {
            " [synthesizer]"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  {:>2}  {:<8} {:<36} {}{marker}",
            persona.id, persona.name, persona.role, persona.model
        );
    }
    let _ = writeln!(out, "\nDelegation tools:");
    for (tool, role) in TOOL_ROLE_MAP {
        let available = if roster.find_by_role(role).is_some() {
            ""
        } else {
            " (no such persona)"
        };
        let _ = writeln!(out, "  {tool:<22} -> {role}{available}");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use swarm_core::{default_roster, AgentState, DelegationRecord, ResearchLog};

    fn sample_run() -> SavedRun {
        let roster = default_roster();
        let mut log = ResearchLog::new();
        log.append(LogEvent::phase("Phase 1: Individual research"));
        log.append(LogEvent::Individual {
            persona_id: 1,
            text: "Lithium prices fell.\nMore detail.".into(),
            sources: vec![GroundingSource::new("https://iea.example", "IEA")],
            delegations: vec![
                DelegationRecord::request(1, 2, "Tasked to perform: analyze_data(query: prices)"),
                DelegationRecord::response(1, 2, "Prices fell 20%.", vec![]),
            ],
        });
        log.append(LogEvent::Synthesis {
            persona_id: 9,
            text: "# Report".into(),
            sources: vec![],
        });
        SavedRun::new(
            "battery storage",
            log.into_entries(),
            "# Report",
            AgentState::for_roster(&roster),
        )
    }

    #[test]
    fn test_live_individual_entry() {
        let run = sample_run();
        let personas = run_personas(&run);
        let text = live_entry(&run.log[1], &personas);
        assert!(text.contains("[Lyra ("));
        assert!(text.contains("  -> Vela: Tasked to perform: analyze_data"));
        assert!(text.contains("  - IEA <https://iea.example>"));
        assert!(live_entry(&run.log[0], &personas).contains("== Phase 1"));
    }

    #[test]
    fn test_views() {
        let run = sample_run();
        assert!(run_list(std::slice::from_ref(&run)).contains("battery storage"));
        assert_eq!(run_list(&[]), "No saved runs.\n");

        let workflow = workflow_view(&run);
        assert!(workflow.contains("Phase 1: Individual research"));
        assert!(workflow.contains("  - Lyra: Lithium prices fell."));

        let delegations = delegations_view(&run);
        assert!(delegations.contains("Lyra -> Vela (1 request(s))"));
        assert!(delegations.contains("Response Vela -> Lyra: Prices fell 20%."));

        assert_eq!(timeline_view(&run).lines().filter(|l| l.contains(". [")).count(), 3);
    }

    #[test]
    fn test_roster_view_marks_roles() {
        let text = roster_view(&default_roster());
        assert!(text.contains("Orion") && text.contains("[manager]"));
        assert!(text.contains("[synthesizer]"));
        assert!(!text.contains("(no such persona)"));
    }

    #[test]
    fn test_first_line_truncates() {
        assert_eq!(first_line("\n  hello  \nworld", 10), "hello");
        assert_eq!(first_line("abcdefghijk", 5), "abcde...");
    }
}
