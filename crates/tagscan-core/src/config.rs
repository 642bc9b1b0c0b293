// ── Runtime session configuration ──
//
// These types describe how a scan session runs and what context travels
// with each report. They never touch disk: the host builds a
// `SessionConfig` (usually via `tagscan-config`) and hands it in.

use std::time::Duration;

use tagscan_api::TagReading;

use crate::model::TagPresence;
use crate::policy::ReportingPolicy;

/// Placement metadata attached to every uplinked reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub device_id: String,
    pub location: String,
    pub department: String,
    pub room_number: String,
    pub floor: String,
}

impl ReportContext {
    /// Defaults for a handheld: mobile location, unassigned department,
    /// unknown room, ground floor.
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            location: "Mobile Scanner".into(),
            department: "Unassigned".into(),
            room_number: "Unknown".into(),
            floor: "0".into(),
        }
    }

    /// Build the wire payload for `presence`.
    pub fn reading_for(&self, presence: &TagPresence) -> TagReading {
        TagReading {
            rssi: Some(presence.rssi),
            timestamp: Some(presence.last_seen),
            department: Some(self.department.clone()),
            room_number: Some(self.room_number.clone()),
            floor: Some(self.floor.clone()),
            location: Some(self.location.clone()),
            device_id: Some(self.device_id.clone()),
            ..TagReading::new(presence.epc.as_str())
        }
    }
}

/// Configuration for a [`SessionController`](crate::SessionController).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model string checked against the driver's support list.
    pub device_model: String,
    /// Transmit power; `None` means the module maximum. Clamped to the maximum.
    pub tx_power: Option<u8>,
    /// Delay after every poll. The scan loop's only throttle.
    pub poll_interval: Duration,
    /// How long `stop` waits for the scan loop before releasing anyway.
    pub stop_grace: Duration,
    pub policy: ReportingPolicy,
    /// Upper bound on concurrently outstanding uplink requests.
    pub max_in_flight_reports: usize,
    pub report_context: ReportContext,
}

impl SessionConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

    pub fn new(device_model: impl Into<String>) -> Self {
        let device_model = device_model.into();
        Self {
            report_context: ReportContext::for_device(device_model.clone()),
            device_model,
            tx_power: None,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            stop_grace: Self::DEFAULT_STOP_GRACE,
            policy: ReportingPolicy::default(),
            max_in_flight_reports: Self::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("C72E")
    }
}
