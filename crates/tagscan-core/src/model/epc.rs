// ── Electronic Product Code ──
//
// Validated, normalized tag identifier. Readers hand back raw strings;
// anything that fails `Epc::parse` is discarded by the scan loop and never
// cached or reported.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest EPC the backend accepts, in hex characters.
pub const MIN_LEN: usize = 4;
/// Longest EPC the backend accepts, in hex characters.
pub const MAX_LEN: usize = 96;

const SHORT_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EpcError {
    #[error("EPC is empty")]
    Empty,

    #[error("EPC length {len} outside {MIN_LEN}..={MAX_LEN}")]
    Length { len: usize },

    #[error("EPC contains non-hex character {ch:?}")]
    NotHex { ch: char },
}

/// Hex-encoded tag identifier, upper-cased, 4–96 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Epc(String);

impl Epc {
    /// Validate and normalize a raw identifier from the reader.
    ///
    /// Surrounding whitespace is ignored; hex digits are upper-cased.
    pub fn parse(raw: &str) -> Result<Self, EpcError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EpcError::Empty);
        }
        if let Some(ch) = trimmed.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(EpcError::NotHex { ch });
        }
        // All ASCII from here, so byte length == char count.
        let len = trimmed.len();
        if !(MIN_LEN..=MAX_LEN).contains(&len) {
            return Err(EpcError::Length { len });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters for compact display ("new tag E2801170...").
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(SHORT_LEN)]
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Epc {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Epc {
    type Error = EpcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Epc> for String {
    fn from(epc: Epc) -> Self {
        epc.0
    }
}
