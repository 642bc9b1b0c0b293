// ── Domain model ──
//
// Tag identifiers, sightings, per-tag presence state, and the
// session-level state and notices exposed to the host.

pub mod epc;
pub mod session;
pub mod tag;

pub use epc::{Epc, EpcError};
pub use session::{Notice, SessionState};
pub use tag::{ReportDecision, TagPresence, TagSighting};
