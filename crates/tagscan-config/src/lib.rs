//! Configuration for the tagscan scanner.
//!
//! TOML file in the platform config directory, layered over built-in
//! defaults and `TAGSCAN_`-prefixed environment variables, plus
//! translation to `tagscan_core::SessionConfig` and the backend transport.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tagscan_core::{
    ModelAllowList, ReportContext, ReportingPolicy, SessionConfig, TlsMode, TransportConfig,
};

/// Prefix for environment overrides. Only nested keys are read, using `__`
/// as the separator (`TAGSCAN_BACKEND__BASE_URL`, `TAGSCAN_READER__TX_POWER`),
/// so flat CLI variables like `TAGSCAN_OUTPUT` never collide with sections.
pub const ENV_PREFIX: &str = "TAGSCAN_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Where readings go.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API root, e.g. "http://localhost:3001/api".
    pub base_url: String,

    pub timeout_secs: u64,

    /// Skip TLS verification (self-signed lab servers).
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api".into(),
            timeout_secs: 30,
            insecure: false,
            ca_cert: None,
        }
    }
}

/// Reader hardware settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Model name reported by this device.
    pub device_model: String,

    /// Case-insensitive substrings a model must contain to be supported.
    /// Empty means every model is accepted.
    pub supported_models: Vec<String>,

    /// Transmit power in dBm; unset means the module maximum.
    pub tx_power: Option<u8>,

    pub poll_interval_ms: u64,

    pub stop_grace_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            device_model: "C72E".into(),
            supported_models: vec!["c72e".into()],
            tx_power: None,
            poll_interval_ms: 100,
            stop_grace_ms: 1000,
        }
    }
}

/// Sampling and placement metadata for uplinked readings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Report the first sighting and every Nth after that. Must be > 0.
    pub sampling_interval: u32,

    pub max_in_flight: usize,

    /// Defaults to the device model.
    pub device_id: Option<String>,

    pub location: String,
    pub department: String,
    pub room_number: String,
    pub floor: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        let context = ReportContext::for_device("");
        Self {
            sampling_interval: ReportingPolicy::DEFAULT_INTERVAL.get(),
            max_in_flight: SessionConfig::DEFAULT_MAX_IN_FLIGHT,
            device_id: None,
            location: context.location,
            department: context.department,
            room_number: context.room_number,
            floor: context.floor,
        }
    }
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Parsed backend API root.
    pub fn backend_url(&self) -> Result<Url, ConfigError> {
        let url: Url = self
            .backend
            .base_url
            .parse()
            .map_err(|e| ConfigError::Validation {
                field: "backend.base_url".into(),
                reason: format!("{e}: {}", self.backend.base_url),
            })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "backend.base_url".into(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// HTTP transport settings. Rejects a zero request timeout.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "backend.timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let tls = if self.backend.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.backend.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };
        Ok(TransportConfig {
            tls,
            ..TransportConfig::default()
        }
        .with_timeout(Duration::from_secs(self.backend.timeout_secs)))
    }

    pub fn allow_list(&self) -> ModelAllowList {
        ModelAllowList::new(&self.reader.supported_models)
    }

    /// Build the runtime session configuration, validating as we go.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let interval =
            NonZeroU32::new(self.reporting.sampling_interval).ok_or_else(|| {
                ConfigError::Validation {
                    field: "reporting.sampling_interval".into(),
                    reason: "must be greater than zero".into(),
                }
            })?;
        if self.reporting.max_in_flight == 0 {
            return Err(ConfigError::Validation {
                field: "reporting.max_in_flight".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.reader.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "reader.poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.reader.poll_interval_ms >= self.reader.stop_grace_ms {
            return Err(ConfigError::Validation {
                field: "reader.poll_interval_ms".into(),
                reason: format!(
                    "must be shorter than reader.stop_grace_ms ({} ms)",
                    self.reader.stop_grace_ms
                ),
            });
        }

        let device_id = self
            .reporting
            .device_id
            .clone()
            .unwrap_or_else(|| self.reader.device_model.clone());

        Ok(SessionConfig {
            device_model: self.reader.device_model.clone(),
            tx_power: self.reader.tx_power,
            poll_interval: Duration::from_millis(self.reader.poll_interval_ms),
            stop_grace: Duration::from_millis(self.reader.stop_grace_ms),
            policy: ReportingPolicy::new(interval),
            max_in_flight_reports: self.reporting.max_in_flight,
            report_context: ReportContext {
                device_id,
                location: self.reporting.location.clone(),
                department: self.reporting.department.clone(),
                room_number: self.reporting.room_number.clone(),
                floor: self.reporting.floor.clone(),
            },
        })
    }

    /// Run every validation without keeping the results.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend_url()?;
        self.transport_config()?;
        self.session_config()?;
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tagscan", "tagscan").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tagscan");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .filter(|key| key.as_str().contains("__"))
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
