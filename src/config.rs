//! Configuration module
//!
//! `AppConfig` is read from a TOML file and then patched from `OCPI_*`
//! environment variables. Every section has defaults so a partial file
//! (or no file at all) still yields a runnable node.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::SchedulerSettings;
use crate::domain::{LocalIdentity, ModuleId, Party, PartyRole};
use crate::infrastructure::{DatabaseConfig, TransportSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default config location: `<config dir>/texnouz-ocpi/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texnouz-ocpi")
        .join("config.toml")
}

/// Resolve the config path: explicit flag, `OCPI_CONFIG`, `OCPI_ROOT/config.toml`,
/// then the platform default.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve_config_path_with(explicit, |key| std::env::var(key).ok())
}

fn resolve_config_path_with(
    explicit: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    explicit
        .or_else(|| lookup("OCPI_CONFIG").map(PathBuf::from))
        .or_else(|| lookup("OCPI_ROOT").map(|root| PathBuf::from(root).join("config.toml")))
        .unwrap_or_else(default_config_path)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub logging: LoggingConfig,
    pub platform: PlatformConfig,
    pub scheduler: SchedulerConfig,
    pub commands: CommandsConfig,
    pub transport: TransportConfig,
    /// Counterparts registered and connected at startup
    pub remotes: Vec<RemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_connections: db.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub id: String,
    pub name: String,
    /// Public base URL counterparts reach this node on
    pub base_url: String,
    pub versions: Vec<String>,
    pub parties: Vec<PartyConfig>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            id: "LOCAL".to_string(),
            name: "Texnouz OCPI".to_string(),
            base_url: "http://localhost:8080".to_string(),
            versions: vec!["2.2.1".to_string(), "2.1.1".to_string()],
            parties: vec![PartyConfig::default()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    pub country_code: String,
    pub party_id: String,
    pub roles: Vec<PartyRole>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            country_code: "UZ".to_string(),
            party_id: "TXN".to_string(),
            roles: vec![PartyRole::Cpo],
            name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub pull_secs: u64,
    pub push_unsupported_pull_secs: u64,
    pub pull_window_secs: u64,
    pub deadline_sweep_secs: u64,
    /// `limit` sent with every paginated pull
    pub page_limit: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let defaults = SchedulerSettings::default();
        Self {
            pull_secs: defaults.pull_period.as_secs(),
            push_unsupported_pull_secs: defaults.push_unsupported_pull_period.as_secs(),
            pull_window_secs: defaults.pull_window.as_secs(),
            deadline_sweep_secs: defaults.deadline_sweep_period.as_secs(),
            page_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Seconds a counterpart gets to report a command result
    pub timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let defaults = TransportSettings::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

/// A counterpart that handed us a token A out of band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub id: String,
    pub name: String,
    pub token_a: String,
    pub versions_url: String,
    /// Modules this counterpart never pushes; pulled on the short period
    #[serde(default)]
    pub push_unsupported: Vec<ModuleId>,
}

impl AppConfig {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&raw)?
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    fn apply_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OCPI_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(port) = lookup("OCPI_API_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(base_url) = lookup("OCPI_BASE_URL") {
            self.platform.base_url = base_url;
        }
        if let Some(level) = lookup("OCPI_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.push_unsupported_pull_secs == 0 || s.pull_secs == 0 || s.deadline_sweep_secs == 0 {
            return Err(ConfigError::Invalid("scheduler periods must be positive".into()));
        }
        if s.push_unsupported_pull_secs >= s.pull_secs {
            return Err(ConfigError::Invalid(format!(
                "scheduler.push_unsupported_pull_secs ({}) must be shorter than scheduler.pull_secs ({})",
                s.push_unsupported_pull_secs, s.pull_secs
            )));
        }
        if self.platform.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("platform.base_url must be set".into()));
        }
        if self.platform.versions.is_empty() {
            return Err(ConfigError::Invalid("platform.versions must not be empty".into()));
        }
        if self.platform.parties.is_empty() {
            return Err(ConfigError::Invalid("platform.parties must not be empty".into()));
        }
        for party in &self.platform.parties {
            if party.country_code.len() != 2 || party.party_id.len() != 3 {
                return Err(ConfigError::Invalid(format!(
                    "party {}/{} must have a 2-letter country code and 3-character party id",
                    party.country_code, party.party_id
                )));
            }
        }
        for remote in &self.remotes {
            if remote.id == self.platform.id {
                return Err(ConfigError::Invalid(format!(
                    "remote id {} collides with the local platform id",
                    remote.id
                )));
            }
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn identity(&self) -> LocalIdentity {
        let platform = &self.platform;
        LocalIdentity {
            platform_id: platform.id.clone(),
            name: platform.name.clone(),
            base_url: platform.base_url.trim_end_matches('/').to_string(),
            versions: platform.versions.clone(),
            parties: platform
                .parties
                .iter()
                .map(|p| {
                    let mut party = Party::new(
                        p.country_code.to_ascii_uppercase(),
                        p.party_id.to_ascii_uppercase(),
                        p.roles.clone(),
                        platform.id.clone(),
                    );
                    party.name = p.name.clone();
                    party
                })
                .collect(),
        }
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let s = &self.scheduler;
        SchedulerSettings {
            pull_period: Duration::from_secs(s.pull_secs),
            push_unsupported_pull_period: Duration::from_secs(s.push_unsupported_pull_secs),
            pull_window: Duration::from_secs(s.pull_window_secs),
            deadline_sweep_period: Duration::from_secs(s.deadline_sweep_secs),
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout: Duration::from_secs(self.transport.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.transport.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[server]
port = 9090

[platform]
id = "TXN"
name = "Texnouz"
base_url = "https://ocpi.texnouz.uz/"
versions = ["2.2.1"]

[[platform.parties]]
country_code = "uz"
party_id = "txn"
roles = ["CPO", "EMSP"]

[scheduler]
pull_secs = 600
push_unsupported_pull_secs = 30

[[remotes]]
id = "HUB1"
name = "Roaming hub"
token_a = "abc"
versions_url = "https://hub.example/ocpi/versions"
push_unsupported = ["tariffs"]
"#;

    #[test]
    fn parses_partial_file_with_defaults() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.commands.timeout_secs, 30);
        assert_eq!(config.remotes[0].push_unsupported, vec![ModuleId::Tariffs]);

        let identity = config.identity();
        assert_eq!(identity.base_url, "https://ocpi.texnouz.uz");
        assert_eq!(identity.parties[0].country_code, "UZ");
        assert_eq!(identity.parties[0].platform_id, "TXN");
        assert_eq!(
            config.scheduler_settings().push_unsupported_pull_period,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn push_unsupported_period_must_be_shorter() {
        let mut config = AppConfig::default();
        config.scheduler.push_unsupported_pull_secs = config.scheduler.pull_secs;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be shorter"));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = [
            ("OCPI_DATABASE_URL", "sqlite::memory:"),
            ("OCPI_API_PORT", "7000"),
            ("OCPI_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.apply_overrides_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.platform.base_url, "https://ocpi.texnouz.uz/");
    }

    #[test]
    fn config_path_resolution_order() {
        let env: HashMap<&str, &str> = [("OCPI_ROOT", "/srv/ocpi")].into_iter().collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        assert_eq!(
            resolve_config_path_with(Some(PathBuf::from("/etc/x.toml")), lookup),
            PathBuf::from("/etc/x.toml")
        );
        assert_eq!(
            resolve_config_path_with(None, lookup),
            PathBuf::from("/srv/ocpi/config.toml")
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/ocpi/config.toml")).unwrap();
        assert_eq!(config.platform.id, "LOCAL");
    }
}
