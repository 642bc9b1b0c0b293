use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::epc::Epc;

/// One raw observation handed back by the reader.
///
/// The identifier is unvalidated: readers can return empty or garbled
/// codes, which the scan loop drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSighting {
    pub id: String,
    /// Signal strength in reader units (typically dBm, negative).
    pub rssi: i32,
    pub observed_at: DateTime<Utc>,
}

impl TagSighting {
    pub fn new(id: impl Into<String>, rssi: i32, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            rssi,
            observed_at,
        }
    }
}

/// Accumulated sighting state for one tag within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPresence {
    pub epc: Epc,
    /// Signal strength of the most recent sighting.
    pub rssi: i32,
    /// Sightings this session. Starts at 1, only ever incremented.
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl TagPresence {
    pub(crate) fn first(epc: Epc, rssi: i32, at: DateTime<Utc>) -> Self {
        Self {
            epc,
            rssi,
            count: 1,
            first_seen: at,
            last_seen: at,
        }
    }

    pub(crate) fn observe(&mut self, rssi: i32, at: DateTime<Utc>) {
        self.rssi = rssi;
        self.count = self.count.saturating_add(1);
        self.last_seen = at;
    }

    pub fn is_first_sighting(&self) -> bool {
        self.count == 1
    }
}

/// Outcome of the reporting policy, paired with the presence snapshot it
/// was decided on. The reporter sends this snapshot, not whatever the
/// cache holds by the time the request goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDecision {
    pub report: bool,
    pub presence: TagPresence,
}
