use thiserror::Error;

/// Top-level error type for the `tagscan-api` crate.
///
/// Covers every failure mode of a backend exchange: building the HTTP
/// client, reaching the server, non-success responses, and envelopes that
/// either report `success: false` or fail to parse. `tagscan-core` maps
/// these into its own diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend ─────────────────────────────────────────────────────
    /// Non-success HTTP status. `message` is the envelope message when the
    /// body carried one, otherwise a preview of the raw body.
    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// HTTP success, but the envelope reported `success: false`.
    #[error("Backend rejected request: {message}")]
    Rejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the backend refused the payload as invalid (HTTP 400).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Status { status: 400, .. })
    }

    /// HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
