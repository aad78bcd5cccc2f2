use serde::Deserialize;
use std::path::{Path, PathBuf};
use swarm_agent::CapabilityConfig;
use swarm_core::{default_definitions, PersonaDefinition, Roster, MANAGER_ROLE, SYNTHESIZER_ROLE};
use swarm_orchestrator::OrchestratorConfig;

/// Environment variables consulted, in order, when no API key is configured.
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Deserialize)]
pub struct SwarmConfig {
    #[serde(default)]
    pub capability: CapabilityConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Replaces the built-in roster when non-empty.
    #[serde(default)]
    pub personas: Vec<PersonaDefinition>,
    #[serde(default = "default_manager_role")]
    pub manager_role: String,
    #[serde(default = "default_synthesizer_role")]
    pub synthesizer_role: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_manager_role() -> String {
    MANAGER_ROLE.to_string()
}
fn default_synthesizer_role() -> String {
    SYNTHESIZER_ROLE.to_string()
}

impl SwarmConfig {
    /// Loads the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            }
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Invalid config: {e}"))
    }

    /// Fills an empty API key from the first non-blank variable `lookup` finds.
    pub fn resolve_api_key(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if !self.capability.api_key.trim().is_empty() {
            return;
        }
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .find(|key| !key.trim().is_empty())
        {
            self.capability.api_key = key;
        }
    }

    pub fn roster(&self) -> anyhow::Result<Roster> {
        let definitions = if self.personas.is_empty() {
            default_definitions()
        } else {
            self.personas.clone()
        };
        let roster = Roster::new(
            definitions,
            self.manager_role.clone(),
            self.synthesizer_role.clone(),
        );
        roster.validate()?;
        Ok(roster)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.data_dir.join("runs")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SwarmConfig::parse("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.runs_dir(), PathBuf::from("./data/runs"));
        assert!(config.orchestrator.ask_requester);
        assert!(config.capability.api_key.is_empty());
        assert_eq!(config.roster().unwrap().len(), 11);
    }

    #[test]
    fn test_full_config() {
        let config = SwarmConfig::parse(
            r#"
            data_dir = "/var/lib/swarm"

            [capability]
            api_key = "from-file"
            api_base_url = "http://localhost:8080/"

            [orchestrator]
            ask_requester = false
            collaboration_model = "gemini-2.5-pro"

            [orchestrator.pacing]
            inter_agent_pause_ms = 0
            delegation_pause_ms = 0
            checkpoint_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.capability.api_key, "from-file");
        assert_eq!(config.capability.base_url(), "http://localhost:8080");
        assert!(!config.orchestrator.ask_requester);
        assert_eq!(config.orchestrator.collaboration_model, "gemini-2.5-pro");
        assert_eq!(config.orchestrator.pacing.checkpoint_timeout_secs, 30);
        assert_eq!(config.runs_dir(), PathBuf::from("/var/lib/swarm/runs"));
    }

    #[test]
    fn test_custom_roster() {
        let config = SwarmConfig::parse(
            r#"
            manager_role = "Lead"
            synthesizer_role = "Writer"

            [[personas]]
            name = "Ada"
            role = "Lead"
            description = "Runs the show."
            model = "gemini-2.5-flash"

            [[personas]]
            name = "Bo"
            role = "Writer"
            description = "Writes it up."
            model = "gemini-2.5-pro"
            "#,
        )
        .unwrap();

        let roster = config.roster().unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.manager().unwrap().name, "Ada");
        assert_eq!(roster.synthesizer().unwrap().id, 1);
    }

    #[test]
    fn test_roster_without_manager_is_rejected() {
        let config = SwarmConfig::parse(
            r#"
            [[personas]]
            name = "Solo"
            role = "Final Report Synthesizer"
            description = "Alone."
            model = "gemini-2.5-pro"
            "#,
        )
        .unwrap();
        let err = config.roster().unwrap_err();
        assert!(err.to_string().contains("Project Manager"));
    }

    #[test]
    fn test_api_key_resolution() {
        let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "  "), ("API_KEY", "env-key")]
            .into_iter()
            .collect();
        let lookup = |var: &str| env.get(var).map(|v| v.to_string());

        let mut config = SwarmConfig::parse("").unwrap();
        config.resolve_api_key(lookup);
        assert_eq!(config.capability.api_key, "env-key");

        let mut config = SwarmConfig::parse("[capability]\napi_key = \"file\"").unwrap();
        config.resolve_api_key(lookup);
        assert_eq!(config.capability.api_key, "file");
    }

    #[tokio::test]
    async fn test_load_missing_and_present_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SwarmConfig::load(&dir.path().join("swarm.toml")).await.unwrap();
        assert!(missing.personas.is_empty());

        let path = dir.path().join("custom.toml");
        tokio::fs::write(&path, "data_dir = \"./elsewhere\"").await.unwrap();
        let loaded = SwarmConfig::load(&path).await.unwrap();
        assert_eq!(loaded.data_dir, PathBuf::from("./elsewhere"));

        tokio::fs::write(&path, "data_dir = [").await.unwrap();
        assert!(SwarmConfig::load(&path).await.is_err());
    }
}
