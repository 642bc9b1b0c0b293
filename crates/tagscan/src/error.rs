//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tagscan_config::ConfigError;
use tagscan_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const HARDWARE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Backend ──────────────────────────────────────────────────────
    #[error("Could not reach the backend at {url}")]
    #[diagnostic(
        code(tagscan::backend_unreachable),
        help(
            "Check that the inventory server is running and reachable.\n\
             Set the URL with --backend or [backend].base_url in the config file."
        )
    )]
    BackendUnreachable {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(
        "Backend error{}: {message}",
        .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
    )]
    #[diagnostic(code(tagscan::backend))]
    Backend {
        message: String,
        status: Option<u16>,
    },

    // ── Reader ───────────────────────────────────────────────────────
    #[error("Device '{model}' is not supported")]
    #[diagnostic(
        code(tagscan::unsupported_device),
        help(
            "Pass a supported model with --model, or extend\n\
             [reader].supported_models in the config file."
        )
    )]
    UnsupportedDevice { model: String },

    #[error("Reader error: {message}")]
    #[diagnostic(
        code(tagscan::reader),
        help("Check that the reader is attached and not held by another app, then retry.")
    )]
    Reader { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tagscan::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(tagscan::config),
        help("Inspect the resolved configuration with: tagscan config show")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(tagscan::toml))]
    Toml(#[from] toml::ser::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(tagscan::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BackendUnreachable { .. } => exit_code::CONNECTION,
            Self::UnsupportedDevice { .. } => exit_code::UNSUPPORTED,
            Self::Reader { .. } => exit_code::HARDWARE,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedDevice { model } => CliError::UnsupportedDevice { model },

            CoreError::AcquisitionFailed { .. }
            | CoreError::ConfigurationFailed { .. }
            | CoreError::ReadRefused => CliError::Reader {
                message: err.to_string(),
            },

            CoreError::Destroyed => CliError::Internal(err.to_string()),

            CoreError::BackendUnreachable { reason } => CliError::BackendUnreachable {
                url: "(backend)".into(),
                source: reason.into(),
            },

            CoreError::Uplink { message, status } => CliError::Backend { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let unsupported: CliError = CoreError::UnsupportedDevice {
            model: "Pixel".into(),
        }
        .into();
        assert_eq!(unsupported.exit_code(), exit_code::UNSUPPORTED);

        let reader: CliError = CoreError::ReadRefused.into();
        assert_eq!(reader.exit_code(), exit_code::HARDWARE);

        let backend: CliError = CoreError::Uplink {
            message: "bad".into(),
            status: Some(400),
        }
        .into();
        assert_eq!(backend.exit_code(), exit_code::GENERAL);

        let offline: CliError = CoreError::BackendUnreachable {
            reason: "refused".into(),
        }
        .into();
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);
    }
}
