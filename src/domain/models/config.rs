//! Configuration model for the planning core.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub planner: PlannerConfig,
    pub logging: LoggingConfig,
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database URL.
    pub url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:gainit/planning.db".to_string(),
            max_connections: 5,
        }
    }
}

/// AI planning provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Hard bound on a single provider call, in seconds.
    pub timeout_secs: u64,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Maximum tokens for the response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0-1.0).
    pub temperature: f32,
    /// Provider API base URL.
    pub api_base_url: String,
    /// API key; falls back to the provider's environment variable.
    pub api_key: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            api_base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
    /// Output format: json or pretty.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.planner.timeout_secs, 30);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: Config = serde_yaml::from_str("planner:\n  timeout_secs: 5\n").unwrap();
        assert_eq!(config.planner.timeout_secs, 5);
        assert_eq!(config.planner.max_tokens, 4096);
        assert_eq!(config.logging.format, "pretty");
    }
}
