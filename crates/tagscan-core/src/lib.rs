//! Scan session core between reader hardware and the inventory backend.
//!
//! This crate owns the concurrency and lifecycle logic of a handheld
//! RFID scanning session:
//!
//! - **[`SessionController`]** — State machine driving the session through
//!   [`SessionState`]: capability check, reader acquisition and
//!   configuration, scan loop start, bounded-grace stop, and handle release.
//!   Host lifecycle callbacks map onto it via [`HostEvent`].
//!
//! - **[`TagPresenceCache`]** — `DashMap`-backed per-EPC sighting state,
//!   shared between the scan loop and UI-facing readers, with a
//!   `tokio::sync::watch` channel announcing the latest updated tag.
//!
//! - **[`ReportingPolicy`]** — Pure sampling rule: report the first sighting
//!   of a tag and every Nth one after that.
//!
//! - **[`UplinkReporter`]** — Fire-and-forget dispatch of policy-approved
//!   sightings to an injected [`TagUplink`] (the HTTP [`BackendClient`] in
//!   production, a fake in tests).
//!
//! - **Hardware seam** ([`hardware`]) — [`ReaderDriver`] / [`ReaderHandle`]
//!   traits plus a deterministic [`SimulatedDriver`] for headless runs.

pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod model;
pub mod observer;
pub mod policy;
pub mod reporter;
mod scan_loop;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ReportContext, SessionConfig};
pub use controller::{HostEvent, SessionController, StopOutcome};
pub use error::CoreError;
pub use hardware::{
    ModelAllowList, ReaderDriver, ReaderError, ReaderHandle, SimulatedDriver, SimulatedHandle,
};
pub use model::{Epc, EpcError, Notice, ReportDecision, SessionState, TagPresence, TagSighting};
pub use observer::{NoopObserver, SessionObserver};
pub use policy::ReportingPolicy;
pub use reporter::{ReporterStats, TagUplink, UplinkReporter};
pub use store::TagPresenceCache;

// Backend types the host shell needs without a direct `tagscan-api` dependency.
pub use tagscan_api::{
    Asset, BackendClient, Error as ApiError, ReferenceData, TagReading, TagRecord, TlsMode,
    TransportConfig,
};
