// ── Core error types ──
//
// Errors surfaced by session operations and backend calls made through the
// core. Reporting failures never reach these: the uplink reporter logs and
// drops them. The `From<tagscan_api::Error>` impl covers direct backend
// calls the host makes (health, asset assignment, listings).

use thiserror::Error;

use crate::hardware::ReaderError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    /// Capability check failed. Terminal until the support check is re-run.
    #[error("Device not supported: {model}")]
    UnsupportedDevice { model: String },

    #[error("Reader acquisition failed: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Reader configuration failed: {reason}")]
    ConfigurationFailed { reason: String },

    #[error("Reader refused to start continuous reading")]
    ReadRefused,

    #[error("Session controller has been destroyed")]
    Destroyed,

    // ── Backend errors (wrapped, not exposed raw) ────────────────────
    #[error("Cannot reach backend: {reason}")]
    BackendUnreachable { reason: String },

    #[error("Backend error: {message}")]
    Uplink {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// A fresh start request may succeed after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionFailed { .. }
                | Self::ConfigurationFailed { .. }
                | Self::ReadRefused
                | Self::BackendUnreachable { .. }
        )
    }

    pub(crate) fn acquisition(err: &ReaderError) -> Self {
        Self::AcquisitionFailed {
            reason: err.to_string(),
        }
    }

    pub(crate) fn configuration(err: &ReaderError) -> Self {
        Self::ConfigurationFailed {
            reason: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tagscan_api::Error> for CoreError {
    fn from(err: tagscan_api::Error) -> Self {
        match err {
            tagscan_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::BackendUnreachable {
                    reason: e.to_string(),
                }
            }
            tagscan_api::Error::Transport(e) => CoreError::Uplink {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            tagscan_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid backend URL: {e}"),
            },
            tagscan_api::Error::Tls(msg) => CoreError::BackendUnreachable {
                reason: format!("TLS error: {msg}"),
            },
            tagscan_api::Error::Status { status, message } => CoreError::Uplink {
                message,
                status: Some(status),
            },
            tagscan_api::Error::Rejected { message } => CoreError::Uplink {
                message,
                status: None,
            },
            tagscan_api::Error::Deserialization { message, .. } => CoreError::Uplink {
                message: format!("Unexpected backend response: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_code() {
        let err: CoreError = tagscan_api::Error::Status {
            status: 400,
            message: "EPC is required".into(),
        }
        .into();
        match err {
            CoreError::Uplink { status, message } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "EPC is required");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejected_envelope_maps_to_uplink() {
        let err: CoreError = tagscan_api::Error::Rejected {
            message: "nope".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Uplink { status: None, .. }));
    }

    #[test]
    fn session_failures_are_retryable_but_unsupported_is_not() {
        assert!(CoreError::acquisition(&ReaderError::Unavailable("busy".into())).is_retryable());
        assert!(CoreError::configuration(&ReaderError::Fatal("x".into())).is_retryable());
        assert!(
            !CoreError::UnsupportedDevice {
                model: "emu".into()
            }
            .is_retryable()
        );
        assert!(!CoreError::Destroyed.is_retryable());
    }
}
