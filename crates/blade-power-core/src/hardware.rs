//! Server hardware as reported by the management appliance.

use serde::{Deserialize, Serialize};

/// A blade as returned by `GET <hardware-uri>`.
///
/// Only the fields the power workflow needs are kept; everything else in the
/// appliance's response is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerHardware {
    /// URI of the hardware resource. Empty means no hardware is referenced.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Serial number.
    pub serial_number: String,
    /// Last reported power state, as a free-form string.
    pub power_state: String,
}

impl ServerHardware {
    /// Create a reference to hardware known only by its URI.
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Returns true if the hardware can be queried or changed.
    #[must_use]
    pub fn has_reference(&self) -> bool {
        !self.uri.is_empty()
    }

    /// URI of the power state sub-resource.
    #[must_use]
    pub fn power_state_uri(&self) -> String {
        format!("{}/powerState", self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ignores_extra_fields() {
        let json = r#"{
            "uri": "/rest/server-hardware/30373237",
            "name": "Encl1, bay 3",
            "serialNumber": "SGH100X6J1",
            "powerState": "On",
            "model": "BL460c Gen9",
            "processorCount": 2
        }"#;

        let hw: ServerHardware = serde_json::from_str(json).unwrap();
        assert_eq!(hw.name, "Encl1, bay 3");
        assert_eq!(hw.serial_number, "SGH100X6J1");
        assert_eq!(hw.power_state, "On");
        assert!(hw.has_reference());
    }

    #[test]
    fn power_state_uri_appends_segment() {
        let hw = ServerHardware::from_uri("/rest/server-hardware/30373237");
        assert_eq!(hw.power_state_uri(), "/rest/server-hardware/30373237/powerState");
    }

    #[test]
    fn empty_uri_has_no_reference() {
        assert!(!ServerHardware::default().has_reference());
    }
}
