//! Configuration file support

use parley_activity::transport::ConnectionSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Which transport the chat client talks through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// A real agent over the Direct-to-Engine API
    #[default]
    CopilotStudio,
    /// Local simulated agent
    Echo,
}

/// Configuration for parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport to use
    pub transport: TransportKind,
    /// Enable debug logging
    pub verbose: bool,
    /// Agent connection settings
    pub copilot_studio: ConnectionSettings,
    /// Credentials
    pub auth: AuthConfig,
}

/// Credential configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Pre-acquired bearer token for the Power Platform API
    pub token: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, then apply environment overrides.
    ///
    /// Runs before logging is set up, so problems are reported on stderr.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    fn load_file() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Override settings from environment variables looked up through `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("PARLEY_ACCESS_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Some(environment_id) = non_empty("COPILOT_STUDIO_ENVIRONMENT_ID") {
            self.copilot_studio.environment_id = Some(environment_id);
        }
        if let Some(schema_name) = non_empty("COPILOT_STUDIO_SCHEMA_NAME") {
            self.copilot_studio.schema_name = Some(schema_name);
        }
    }

    /// Configured access token, if any
    pub fn access_token(&self) -> Option<&str> {
        self.auth
            .token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        Config::default().save()?;
        Ok(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux) or set PARLEY_CONFIG_PATH

# Transport: "copilot-studio" or "echo" (local simulated agent)
transport = "copilot-studio"

# Debug logging to stderr
verbose = false

[copilot_studio]
# Environment hosting the agent (or set COPILOT_STUDIO_ENVIRONMENT_ID)
environment_id = "00000000-0000-0000-0000-000000000000"
# Agent schema name (or set COPILOT_STUDIO_SCHEMA_NAME)
schema_name = "cr123_myAgent"
# Cloud: prod, firstrelease, preprod, test, gov, high, dod, mooncake
cloud = "prod"
# Full conversations URL, used instead of environment_id and schema_name
# direct_connect_url = "https://..."

[auth]
# Bearer token for the Power Platform API (or set PARLEY_ACCESS_TOKEN)
# token = "eyJ..."
"#
}
