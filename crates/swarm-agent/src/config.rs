use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Default endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for the generation capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl CapabilityConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_default_and_override() {
        let config = CapabilityConfig::new("key");
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);

        let config = CapabilityConfig {
            api_base_url: Some("http://127.0.0.1:9000/".into()),
            ..CapabilityConfig::new("key")
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: CapabilityConfig = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.api_base_url.is_none());
    }
}
