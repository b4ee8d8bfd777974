use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::dispatch::mcp::ToolNames;
use super::dispatch::model::{DeliveryMode, DEFAULT_MAX_MESSAGE_CHARS};
use super::error::ConfigError;
use super::gate::Threshold;
use super::signals::model::SignalSet;

/// Notifier settings, loadable from a JSON file. Every field is optional on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub threshold: Threshold,
    pub always_notify: bool,
    pub dry_run: bool,
    pub use_simulation: bool,
    /// Fallback destination when no channel is given explicitly
    pub default_channel: Option<String>,
    /// Signal table file; the built-in table is used when unset
    pub signals_path: Option<PathBuf>,
    /// MCP client configuration holding the server launch entry
    pub mcp_config_path: Option<PathBuf>,
    pub server_name: String,
    pub startup_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub tools: ToolNames,
    /// Variables that must be set for live delivery (never read beyond presence)
    pub required_credentials: Vec<String>,
    pub max_message_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: Threshold::default(),
            always_notify: false,
            dry_run: false,
            use_simulation: false,
            default_channel: None,
            signals_path: None,
            mcp_config_path: None,
            server_name: "slack".to_string(),
            startup_timeout_secs: 30,
            request_timeout_secs: 30,
            tools: ToolNames::default(),
            required_credentials: vec!["SLACK_BOT_TOKEN".to_string(), "SLACK_TEAM_ID".to_string()],
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

/// Values given on the command line or through the environment. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub threshold: Option<f64>,
    pub always_notify: bool,
    pub dry_run: bool,
    pub use_simulation: bool,
    pub default_channel: Option<String>,
    pub signals_path: Option<PathBuf>,
    pub mcp_config_path: Option<PathBuf>,
    pub server_name: Option<String>,
}

impl Settings {
    /// Layer overrides on top of these settings. Flags can switch modes on, not off.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(threshold) = overrides.threshold {
            self.threshold = Threshold::new(threshold)?;
        }
        self.always_notify |= overrides.always_notify;
        self.dry_run |= overrides.dry_run;
        self.use_simulation |= overrides.use_simulation;
        if overrides.default_channel.is_some() {
            self.default_channel = overrides.default_channel;
        }
        if overrides.signals_path.is_some() {
            self.signals_path = overrides.signals_path;
        }
        if overrides.mcp_config_path.is_some() {
            self.mcp_config_path = overrides.mcp_config_path;
        }
        if let Some(name) = overrides.server_name {
            self.server_name = name;
        }
        Ok(self)
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::from_flags(self.dry_run, self.use_simulation)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn load_signals(&self) -> Result<SignalSet, ConfigError> {
        match &self.signals_path {
            Some(path) => SignalSet::load(path),
            None => Ok(SignalSet::builtin()),
        }
    }

    pub fn mcp_config_path(&self) -> PathBuf {
        self.mcp_config_path.clone().unwrap_or_else(default_mcp_config_path)
    }
}

fn default_mcp_config_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cursor").join("mcp.json")
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load settings. A missing file yields defaults; a malformed one is an error.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::debug!("No settings at {:?}, using defaults", self.config_path);
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Read {
            path: self.config_path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })
    }
}

/// How to launch a tool server: one `mcpServers` entry of an MCP client config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Passed to the child as-is; holds the transport credentials
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct McpClientConfig {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: HashMap<String, ServerSpec>,
}

impl ServerSpec {
    /// Read server `name` from an MCP client configuration file.
    pub fn load(path: &Path, name: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: McpClientConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config
            .mcp_servers
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownServer {
                name: name.to_string(),
                path: path.to_path_buf(),
            })
    }

    /// Every required variable must be non-empty in the server env or the process env.
    pub fn check_credentials(&self, required: &[String]) -> Result<(), ConfigError> {
        for var in required {
            let in_spec = self.env.get(var).is_some_and(|v| !v.trim().is_empty());
            let in_process = std::env::var(var).is_ok_and(|v| !v.trim().is_empty());
            if !in_spec && !in_process {
                return Err(ConfigError::MissingCredential(var.clone()));
            }
        }
        Ok(())
    }
}
