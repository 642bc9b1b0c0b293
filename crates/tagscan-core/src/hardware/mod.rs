// ── Reader hardware seam ──
//
// The controller talks to the physical reader only through these traits.
// Vendor SDK bindings implement them on-device; `SimulatedDriver` implements
// them for headless runs and tests.
//
// All methods are blocking. The controller calls them from
// `spawn_blocking` contexts, never on an async worker thread.

mod simulated;

use std::sync::Arc;

use thiserror::Error;

use crate::model::TagSighting;

pub use simulated::{SimulatedDriver, SimulatedHandle};

/// Failure reported by a reader driver or handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// Recoverable glitch (buffer overrun, CRC error). The scan loop keeps going.
    #[error("transient reader error: {0}")]
    Transient(String),

    /// The reader is gone or wedged. The scan loop ends.
    #[error("fatal reader error: {0}")]
    Fatal(String),

    /// The reader cannot be acquired right now (busy, powered down).
    #[error("reader unavailable: {0}")]
    Unavailable(String),
}

impl ReaderError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }
}

/// Entry point into the reader SDK.
pub trait ReaderDriver: Send + Sync {
    /// Whether this device model carries a supported reader module.
    fn is_supported(&self, model: &str) -> bool;

    /// Open the reader. The returned handle is exclusively owned by the
    /// session controller until `release`.
    fn acquire(&self) -> Result<Arc<dyn ReaderHandle>, ReaderError>;
}

/// An acquired reader.
pub trait ReaderHandle: Send + Sync {
    /// Highest transmit power the module accepts, in dBm.
    fn max_power(&self) -> u8;

    fn configure(&self, power: u8) -> Result<(), ReaderError>;

    /// Begin continuous inventory. `Ok(false)` means the module refused.
    fn start_continuous_read(&self) -> Result<bool, ReaderError>;

    /// Next buffered tag, if any. Must not block.
    fn poll_next(&self) -> Result<Option<TagSighting>, ReaderError>;

    fn stop_continuous_read(&self) -> Result<(), ReaderError>;

    fn release(&self) -> Result<(), ReaderError>;
}

/// Case-insensitive substring allow-list over device model names.
///
/// An empty list allows every model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelAllowList {
    patterns: Vec<String>,
}

impl ModelAllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, model: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let model = model.to_lowercase();
        self.patterns.iter().any(|p| model.contains(p.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_case_insensitive_substring() {
        let list = ModelAllowList::new(["c72e"]);
        assert!(list.allows("C72E"));
        assert!(list.allows("Chainway C72E-Pro"));
        assert!(!list.allows("sdk_gphone64_x86_64"));
    }

    #[test]
    fn empty_allow_list_allows_all() {
        let list = ModelAllowList::new(Vec::<String>::new());
        assert!(list.allows("anything"));
        let blanks = ModelAllowList::new(["", "  "]);
        assert!(blanks.patterns().is_empty());
    }

    #[test]
    fn only_transient_errors_are_recoverable() {
        assert!(!ReaderError::Transient("crc".into()).is_fatal());
        assert!(ReaderError::Fatal("gone".into()).is_fatal());
        assert!(ReaderError::Unavailable("busy".into()).is_fatal());
    }
}
