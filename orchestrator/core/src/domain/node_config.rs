// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for a Colony node:
// - Agent runtime settings (stop grace period)
// - Swarm engine settings (checkpointing, iteration pacing)
// - Evaluation dispatcher settings (broker, remote agents, timeouts)
// - Logging settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level node configuration (colony-config.yaml)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NodeConfig {
    #[serde(default)]
    pub agents: AgentSettings,

    #[serde(default)]
    pub swarm: SwarmSettings,

    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSettings {
    /// How long `stop` waits for a run loop before aborting it
    #[serde(with = "humantime_serde", default = "default_stop_grace")]
    pub stop_grace: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            stop_grace: default_stop_grace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwarmSettings {
    /// JSON checkpoint file; no persistence when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<PathBuf>,

    /// Rewrite the checkpoint on every swarm mutation
    #[serde(default = "default_true")]
    pub auto_persist: bool,

    /// Pause between iterations of a swarm loop
    #[serde(with = "humantime_serde", default = "default_iteration_delay")]
    pub iteration_delay: Duration,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            checkpoint_path: None,
            auto_persist: true,
            iteration_delay: default_iteration_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatcherSettings {
    /// Broker connection string (`memory://evaluations`, `redis://host:6379/0`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_url: Option<String>,

    /// Work queue evaluation tasks are pushed onto
    #[serde(default = "default_work_queue")]
    pub work_queue: String,

    /// Total time budget for collecting one batch of broker replies
    #[serde(with = "humantime_serde", default = "default_collection_budget")]
    pub collection_budget: Duration,

    /// Base URL remote agents expose their evaluation endpoint under
    #[serde(default = "default_agent_base_url")]
    pub agent_base_url: String,

    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            broker_url: None,
            work_queue: default_work_queue(),
            collection_budget: default_collection_budget(),
            agent_base_url: default_agent_base_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. COLONY_CONFIG_PATH environment variable
    /// 2. ./colony-config.yaml (working directory)
    /// 3. ~/.colony/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("COLONY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./colony-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".colony").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails loudly when missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COLONY_BROKER_URL") {
            tracing::info!("Environment override: COLONY_BROKER_URL={}", val);
            self.dispatcher.broker_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var("COLONY_CHECKPOINT_PATH") {
            tracing::info!("Environment override: COLONY_CHECKPOINT_PATH={}", val);
            self.swarm.checkpoint_path = if val.is_empty() { None } else { Some(PathBuf::from(val)) };
        }

        if let Ok(val) = std::env::var("COLONY_AUTO_PERSIST") {
            match parse_bool(&val) {
                Some(flag) => {
                    tracing::info!("Environment override: COLONY_AUTO_PERSIST={}", flag);
                    self.swarm.auto_persist = flag;
                }
                None => tracing::warn!(
                    "Invalid value for COLONY_AUTO_PERSIST: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dispatcher.work_queue.trim().is_empty() {
            anyhow::bail!("dispatcher.work_queue must not be empty");
        }
        if self.dispatcher.collection_budget.is_zero() {
            anyhow::bail!("dispatcher.collection_budget must be greater than zero");
        }
        if self.dispatcher.request_timeout.is_zero() || self.dispatcher.connect_timeout.is_zero() {
            anyhow::bail!("dispatcher timeouts must be greater than zero");
        }
        if self.agents.stop_grace.is_zero() {
            anyhow::bail!("agents.stop_grace must be greater than zero");
        }
        if let Some(url) = &self.dispatcher.broker_url {
            if !url.contains("://") {
                anyhow::bail!("dispatcher.broker_url '{}' is not a connection string", url);
            }
        }
        Ok(())
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_stop_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_iteration_delay() -> Duration {
    Duration::from_millis(10)
}

fn default_work_queue() -> String {
    "colony:eval_tasks".to_string()
}

fn default_collection_budget() -> Duration {
    Duration::from_secs(30)
}

fn default_agent_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = NodeConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.dispatcher.work_queue, "colony:eval_tasks");
        assert_eq!(config.swarm.iteration_delay, Duration::from_millis(10));
        assert!(config.swarm.auto_persist);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
swarm:
  checkpoint_path: /tmp/colony/swarms.json
  iteration_delay: 250ms
dispatcher:
  broker_url: memory://evaluations
  collection_budget: 2s
logging:
  level: debug
  format: json
"#;
        let config = NodeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.swarm.iteration_delay, Duration::from_millis(250));
        assert_eq!(
            config.swarm.checkpoint_path,
            Some(PathBuf::from("/tmp/colony/swarms.json"))
        );
        assert_eq!(config.dispatcher.broker_url.as_deref(), Some("memory://evaluations"));
        assert_eq!(config.dispatcher.collection_budget, Duration::from_secs(2));
        assert_eq!(config.logging.format, LogFormat::Json);

        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(NodeConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        let mut config = NodeConfig::default();
        config.dispatcher.work_queue = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.dispatcher.collection_budget = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.dispatcher.broker_url = Some("localhost".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colony.yaml");
        std::fs::write(&path, "agents:\n  stop_grace: 1s\n").unwrap();

        let config = NodeConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(config.agents.stop_grace, Duration::from_secs(1));

        let missing = NodeConfig::load_or_default(Some(dir.path().join("nope.yaml")));
        assert!(missing.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
