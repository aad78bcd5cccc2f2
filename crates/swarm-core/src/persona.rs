use crate::{GroundingSource, SwarmError, SwarmResult};
use serde::{Deserialize, Serialize};

/// Index of a persona in its roster.
pub type PersonaId = usize;

/// Role label of the persona that makes collaboration decisions.
pub const MANAGER_ROLE: &str = "Project Manager";

/// Role label of the persona that writes the final report.
pub const SYNTHESIZER_ROLE: &str = "Final Report Synthesizer";

/// Static description of a persona as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDefinition {
    pub name: String,
    pub role: String,
    pub description: String,
    pub model: String,
}

impl PersonaDefinition {
    pub fn new(name: &str, role: &str, description: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            description: description.to_string(),
            model: model.to_string(),
        }
    }
}

/// A persona placed in a roster. Immutable once the roster is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    pub role: String,
    pub description: String,
    pub model: String,
}

/// The ordered set of personas taking part in a run.
///
/// Order defines sequencing and display only. Ids are roster indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    personas: Vec<Persona>,
    manager_role: String,
    synthesizer_role: String,
}

impl Roster {
    /// Builds a roster, assigning ids in definition order.
    pub fn new(
        definitions: Vec<PersonaDefinition>,
        manager_role: impl Into<String>,
        synthesizer_role: impl Into<String>,
    ) -> Self {
        let personas = definitions
            .into_iter()
            .enumerate()
            .map(|(id, def)| Persona {
                id,
                name: def.name,
                role: def.role,
                description: def.description,
                model: def.model,
            })
            .collect();
        Self {
            personas,
            manager_role: manager_role.into(),
            synthesizer_role: synthesizer_role.into(),
        }
    }

    /// Checks the roster is usable for a run: non-empty, with exactly one
    /// manager and exactly one synthesizer.
    pub fn validate(&self) -> SwarmResult<()> {
        if self.personas.is_empty() {
            return Err(SwarmError::Config("roster has no personas".into()));
        }
        self.manager()?;
        self.synthesizer()?;
        Ok(())
    }

    /// The single persona holding the manager role.
    pub fn manager(&self) -> SwarmResult<&Persona> {
        self.unique_role(&self.manager_role)
    }

    /// The single persona holding the synthesizer role.
    pub fn synthesizer(&self) -> SwarmResult<&Persona> {
        self.unique_role(&self.synthesizer_role)
    }

    fn unique_role(&self, role: &str) -> SwarmResult<&Persona> {
        let mut matches = self.personas.iter().filter(|p| p.role == role);
        match (matches.next(), matches.next()) {
            (Some(persona), None) => Ok(persona),
            (None, _) => Err(SwarmError::Config(format!(
                "roster has no persona with role '{role}'"
            ))),
            (Some(_), Some(_)) => Err(SwarmError::Config(format!(
                "roster has more than one persona with role '{role}'"
            ))),
        }
    }

    /// First persona with the given role, if any.
    pub fn find_by_role(&self, role: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.role == role)
    }

    pub fn get(&self, id: PersonaId) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// Display name for a persona id, falling back to `Agent {id}`.
    pub fn display_name(&self, id: PersonaId) -> String {
        self.get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Agent {id}"))
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub fn manager_role(&self) -> &str {
        &self.manager_role
    }

    pub fn synthesizer_role(&self) -> &str {
        &self.synthesizer_role
    }
}

/// The built-in definitions: eleven personas, manager first.
pub fn default_definitions() -> Vec<PersonaDefinition> {
    vec![
        PersonaDefinition::new(
            "Orion",
            MANAGER_ROLE,
            "Oversees the entire research process, assigns tasks, and ensures the team stays on track.",
            "gemini-2.5-pro",
        ),
        PersonaDefinition::new(
            "Lyra",
            "Lead Researcher",
            "Conducts deep, foundational research and identifies primary sources and avenues of investigation.",
            "gemini-2.5-flash",
        ),
        PersonaDefinition::new(
            "Vela",
            "Data Analyst",
            "Specializes in finding, interpreting, and visualizing quantitative data and statistics.",
            "gemini-2.5-flash",
        ),
        PersonaDefinition::new(
            "Caelus",
            "Fact-Checker",
            "Meticulously verifies all claims, data points, and sources for accuracy and reliability.",
            "gemini-2.5-flash",
        ),
        PersonaDefinition::new(
            "Eris",
            "Critic & Devil's Advocate",
            "Challenges assumptions, questions conclusions, and identifies potential flaws in arguments.",
            "gemini-2.5-pro",
        ),
        PersonaDefinition::new(
            "Cygnus",
            "Creative Thinker",
            "Explores unconventional angles, brainstorms innovative ideas, and connects disparate concepts.",
            "gemini-2.5-flash",
        ),
        PersonaDefinition::new(
            "Clio",
            "Historical Context Analyst",
            "Provides historical background and context to understand the evolution of the topic.",
            "gemini-2.5-flash",
        ),
        PersonaDefinition::new(
            "Techne",
            "Technological Feasibility Expert",
            "Assesses the technical aspects, feasibility, and implications of technologies related to the topic.",
            "gemini-2.5-pro",
        ),
        PersonaDefinition::new(
            "Astra",
            "Ethical & Societal Impact Analyst",
            "Examines the ethical considerations and broader societal impact of the research findings.",
            "gemini-2.5-pro",
        ),
        PersonaDefinition::new(
            "Nexus",
            SYNTHESIZER_ROLE,
            "Weaves all the verified findings and diverse perspectives into a coherent, comprehensive final report.",
            "gemini-2.5-pro",
        ),
        PersonaDefinition::new(
            "Draco",
            "Web Intelligence Analyst",
            "Scours the web for public sentiment, trends, and discussions related to the topic.",
            "gemini-2.5-flash",
        ),
    ]
}

/// The built-in eleven-persona roster.
pub fn default_roster() -> Roster {
    Roster::new(default_definitions(), MANAGER_ROLE, SYNTHESIZER_ROLE)
}

/// Lifecycle status of an agent during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentStatus {
    #[default]
    Idle,
    Researching,
    #[serde(rename = "In Meeting")]
    InMeeting,
    Synthesizing,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Idle => "Idle",
            AgentStatus::Researching => "Researching",
            AgentStatus::InMeeting => "In Meeting",
            AgentStatus::Synthesizing => "Synthesizing",
        };
        f.write_str(s)
    }
}

/// Per-run projection of a persona: what it is doing and what it has found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(flatten)]
    pub persona: Persona,
    pub status: AgentStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

impl AgentState {
    pub fn idle(persona: &Persona) -> Self {
        Self {
            persona: persona.clone(),
            status: AgentStatus::Idle,
            output: String::new(),
            sources: Vec::new(),
        }
    }

    /// Fresh idle states for every persona in the roster.
    pub fn for_roster(roster: &Roster) -> Vec<Self> {
        roster.iter().map(Self::idle).collect()
    }
}
