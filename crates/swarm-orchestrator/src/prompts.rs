//! Prompt builders for every generation the orchestrator issues.

use crate::decision::ASK_REQUESTER;
use crate::types::Finding;
use swarm_core::{CollaborationMode, DelegationKind, LogEntry, LogEvent, Persona};

fn findings_text(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("--- [{}] ---\n{}\n", f.role, f.output))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn agent_task(
    persona: &Persona,
    topic: &str,
    context: Option<&str>,
    instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are an AI agent named {}.\nYour role is: {}.\nYour goal is: {}.\nThe main research topic is: \"{topic}\".\n",
        persona.name, persona.role, persona.description
    );
    if let Some(instruction) = instruction {
        prompt.push_str(&format!(
            "There is an important overarching instruction from the user that you must follow: \"{instruction}\"\n"
        ));
    }
    if let Some(context) = context {
        prompt.push_str(&format!("Additional context for this task: {context}\n"));
    }
    prompt.push_str(
        "\nPerform your task diligently.\n\
         You have access to a team of specialist agents you can delegate tasks to if needed. \
         Use the available tools to call upon them. For example, if you encounter a claim you \
         cannot verify, use 'factCheck'. If you need specific data, use 'findData'.\n\
         After any delegations, synthesize their responses with your own findings to produce a \
         comprehensive answer for your primary role.\n\
         Provide a concise summary of your findings, analysis, or questions based on your specific role.\n\
         Keep your response focused on your designated role.",
    );
    prompt
}

pub fn delegated_task(
    delegate: &Persona,
    requester: &Persona,
    topic: &str,
    tool: &str,
    arguments: &serde_json::Value,
    instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are {}, the {}.\nYour colleague, {} ({}), has delegated a task to you.\nThe main research topic is \"{topic}\".\n",
        delegate.name, delegate.role, requester.name, requester.role
    );
    if let Some(instruction) = instruction {
        prompt.push_str(&format!(
            "The user has provided a global instruction for all agents: \"{instruction}\"\n"
        ));
    }
    prompt.push_str(&format!(
        "Your assigned task is: {tool}.\nThe details are: {arguments}\nPerform this specific task and provide a direct, concise answer."
    ));
    prompt
}

pub fn decision(
    manager: &Persona,
    findings: &[Finding],
    topic: &str,
    instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are {}, the {} for a team of AI agents researching: \"{topic}\".\n",
        manager.name, manager.role
    );
    if let Some(instruction) = instruction {
        prompt.push_str(&format!(
            "\nThere is an important instruction from the user you must follow: \"{instruction}\"\n"
        ));
    }
    prompt.push_str(&format!(
        "Review the following findings from your team:\n{}\n",
        findings_text(findings)
    ));
    prompt.push_str(&format!(
        "Based on these findings, decide the most effective type of collaboration for the next step.\n\
         Your options are:\n\
         - \"{}\": For general synchronization and synthesis of ideas.\n\
         - \"{}\": For exploring a topic in-depth and brainstorming new angles.\n\
         - \"{}\": To resolve conflicting information or challenge weak arguments.\n\
         - \"{}\": To clarify specific points or have experts answer questions from the team.\n\
         - \"{ASK_REQUESTER}\": Use this sparingly. Only when there is a critical ambiguity, a need for a \
         subjective choice, or a fundamental pivot in research direction that requires the user's input.\n\n\
         If you choose \"{ASK_REQUESTER}\", you MUST formulate a clear, concise question for the user.\n\
         Otherwise, just choose one of the collaboration actions.\n\n\
         Choose one action and provide a brief reasoning for your choice.",
        CollaborationMode::Meeting,
        CollaborationMode::Discussion,
        CollaborationMode::Debate,
        CollaborationMode::QnA,
    ));
    prompt
}

fn narration(mode: CollaborationMode) -> &'static str {
    match mode {
        CollaborationMode::Meeting => "facilitate a collaborative meeting.",
        CollaborationMode::Debate => "moderate a structured debate.",
        CollaborationMode::Discussion => "guide a round-table discussion.",
        CollaborationMode::QnA => "conduct a question-and-answer session.",
    }
}

pub fn collaboration(
    findings: &[Finding],
    topic: &str,
    mode: CollaborationMode,
    instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are an AI meeting facilitator. Your task is to {}\n\
         The participants are a team of AI agents researching the topic: \"{topic}\".\n",
        narration(mode)
    );
    if let Some(instruction) = instruction {
        prompt.push_str(&format!(
            "\nThe user has provided an important instruction that should guide this entire collaboration: \"{instruction}\"\n"
        ));
    }
    prompt.push_str(&format!(
        "\nHere are their latest findings, which may include direct input from the user:\n{}\n",
        findings_text(findings)
    ));
    prompt.push_str(&format!(
        "Based on these inputs, generate a transcript of the {}.\n\
         The conversation should be dynamic, with agents interacting, challenging each other \
         (especially in a debate), and building upon each other's ideas.\n\
         Ensure the conversation flows logically and makes progress on the research topic.\n\
         Use your search capabilities to inject new, relevant information into the conversation \
         if needed to resolve disputes or fill knowledge gaps.\n\
         The output should be a formatted transcript. For example:\n\
         Lyra (Lead Researcher): \"Based on my findings...\"\n\
         Eris (Critic): \"I'd like to challenge that assumption...\"",
        mode.as_str().to_lowercase()
    ));
    prompt
}

/// Renders the log as the plain-text record the synthesizer reads.
pub fn render_log(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|entry| match &entry.event {
            LogEvent::Individual {
                persona_id,
                text,
                delegations,
                ..
            } => {
                let mut block = format!("[Individual Work - Agent {persona_id}]:\n{text}");
                if !delegations.is_empty() {
                    block.push_str("\n\n  [Begin Internal Communications Log]\n");
                    let lines: Vec<String> = delegations
                        .iter()
                        .map(|d| {
                            let kind = match d.kind {
                                DelegationKind::Request => "Request",
                                DelegationKind::Response => "Response",
                            };
                            format!(
                                "    - {kind} from Agent {} to Agent {}: {}",
                                d.from(),
                                d.to(),
                                d.text
                            )
                        })
                        .collect();
                    block.push_str(&lines.join("\n"));
                    block.push_str("\n  [End Internal Communications Log]\n");
                }
                block
            }
            LogEvent::Collaboration { mode, text, .. } => format!("[{mode} Transcript]:\n{text}"),
            LogEvent::UserInteraction { question, answer } => {
                let mut block = "[User Interaction]".to_string();
                if let Some(question) = question {
                    block.push_str(&format!("\nQuestion: {question}"));
                }
                if let Some(answer) = answer {
                    block.push_str(&format!("\nAnswer: {answer}"));
                }
                block
            }
            LogEvent::Synthesis { text, .. } | LogEvent::Phase { text } => {
                format!("[Phase Update]: {text}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn synthesis(
    synthesizer: &Persona,
    entries: &[LogEntry],
    topic: &str,
    instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are the '{}' AI agent.\n\
         Your task is to create a comprehensive, well-structured final report on the topic: \"{topic}\".\n",
        synthesizer.role
    );
    if let Some(instruction) = instruction {
        prompt.push_str(&format!(
            "\nCRITICAL INSTRUCTION FROM THE USER: You must adhere to the following instruction when writing the report: \"{instruction}\"\n"
        ));
    }
    prompt.push_str(&format!(
        "You have been provided with the complete log of the research process, including individual \
         findings from multiple specialized agents, transcripts of their collaborative meetings, and \
         logs of their internal task delegations.\n\n\
         Here is the full research log:\n{}\n\n\
         Synthesize all this information into a single, coherent report.\n\
         The report should be well-organized, insightful, and cover the topic from multiple \
         perspectives as explored by the agent team.\n\
         Start with an executive summary, followed by detailed sections.\n\
         Use Markdown for formatting (e.g., # for headings, * for bullet points).\n\
         Use your search capabilities to verify final points and ensure the report is up-to-date.",
        render_log(entries)
    ));
    prompt
}
