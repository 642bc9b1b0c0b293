// Wire types for the inventory backend.
//
// Field names follow the backend's camelCase JSON. Every response is
// wrapped in the `{ success, message, data }` envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response envelope shared by all backend endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    /// Some validation failures carry the reason here instead of `message`.
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Best human-readable explanation carried by the envelope.
    pub fn reason(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}

/// One sighting forwarded to `POST /tags/reading`.
///
/// The server creates or updates the per-tag aggregate (first seen kept,
/// last seen and read count bumped), so duplicate deliveries are harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReading {
    pub epc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "iso_millis",
        default
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl TagReading {
    /// A bare reading carrying only the EPC.
    pub fn new(epc: impl Into<String>) -> Self {
        Self {
            epc: epc.into(),
            rssi: None,
            timestamp: None,
            department: None,
            room_number: None,
            floor: None,
            location: None,
            device_id: None,
        }
    }
}

/// Asset metadata attached to a tag via `POST /tags/{epc}/asset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub description: String,
    pub department: String,
    pub room_number: String,
    pub floor: String,
    pub category: String,
    pub value: f64,
    pub location: Option<String>,
    pub status: String,
    pub owner: Option<String>,
}

impl Asset {
    /// New asset with the handheld's placement defaults: unassigned
    /// department, unknown room, first floor, available, no value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            department: "Unassigned".into(),
            room_number: "Unknown".into(),
            floor: "1".into(),
            category: String::new(),
            value: 0.0,
            location: None,
            status: "Available".into(),
            owner: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Per-tag aggregate as returned by `GET /tags`.
///
/// Only the fields the scanner displays are typed; the backend may return more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub epc: String,
    #[serde(default)]
    pub read_count: Option<u64>,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default)]
    pub asset: Option<serde_json::Value>,
}

/// Reference lists offered when assigning assets (`GET /references`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub room_numbers: Vec<String>,
}

/// Millisecond-precision ISO-8601 (`2024-06-15T10:30:00.123Z`), the format the
/// backend's validators expect.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<DateTime<Utc>>::deserialize(deserializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn reading_serializes_camel_case_and_skips_missing_fields() {
        let mut reading = TagReading::new("E28011700000020A1B2C3D4E");
        reading.rssi = Some(-52);
        reading.room_number = Some("Unknown".into());
        reading.device_id = Some("C72E".into());
        reading.timestamp = Some(Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap());

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            value,
            json!({
                "epc": "E28011700000020A1B2C3D4E",
                "rssi": -52,
                "timestamp": "2024-06-15T10:30:00.000Z",
                "roomNumber": "Unknown",
                "deviceId": "C72E"
            })
        );
    }

    #[test]
    fn asset_defaults_match_handheld_form() {
        let asset = Asset::new("Infusion pump").with_category("Medical");
        assert_eq!(asset.department, "Unassigned");
        assert_eq!(asset.room_number, "Unknown");
        assert_eq!(asset.floor, "1");
        assert_eq!(asset.status, "Available");
        assert_eq!(asset.category, "Medical");
        assert!(asset.owner.is_none());
    }

    #[test]
    fn envelope_reason_prefers_message() {
        let env: ApiResponse<serde_json::Value> = serde_json::from_value(json!({
            "success": false,
            "message": "Validation failed",
            "error": "epc too short"
        }))
        .unwrap();
        assert_eq!(env.reason(), Some("Validation failed"));
        assert!(env.data.is_none());
    }
}
