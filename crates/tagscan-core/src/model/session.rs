use std::fmt;

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use super::epc::Epc;

/// Lifecycle state of the scan session, observable by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    AcquiringHardware,
    Scanning,
    Stopping,
    /// Device model failed the capability check. Sticky until re-checked.
    Unsupported,
    /// Acquisition, configuration, or the scan loop failed. A new start retries.
    Failed,
}

impl SessionState {
    /// The reader handle is held in this state.
    pub fn holds_reader(self) -> bool {
        matches!(self, Self::Scanning | Self::Stopping)
    }
}

/// Short, non-blocking user-facing message raised by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// First sighting of a tag this session.
    NewTag { epc: Epc },
    /// Reader acquired, configured, and reading.
    ReaderReady { power: u8 },
    UnsupportedDevice { model: String },
    /// Acquisition or configuration failed; a new start may succeed.
    ReaderFailed { reason: String },
    /// The scan loop hit a fatal reader fault and the session ended.
    ScanAborted { reason: String },
    BackendOnline { url: String },
    BackendOffline { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewTag { epc } => write!(f, "New tag detected: {}...", epc.short()),
            Self::ReaderReady { power } => write!(f, "Reader initialized (Power: {power}dBm)"),
            Self::UnsupportedDevice { model } => {
                write!(f, "Device not supported. Current device: {model}")
            }
            Self::ReaderFailed { reason } => write!(f, "Reader error: {reason}"),
            Self::ScanAborted { reason } => write!(f, "Scanning stopped: {reason}"),
            Self::BackendOnline { url } => write!(f, "Connected to backend at {url}"),
            Self::BackendOffline { reason } => {
                write!(f, "Backend not reachable, readings will not be saved: {reason}")
            }
        }
    }
}
