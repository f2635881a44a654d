// Find service response types
//
// Models for the SmartThings Find JSON API. The service is inconsistent
// about field presence and about numbers arriving as strings, so fields use
// `#[serde(default)]` liberally and coordinates go through a lenient parser.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Device list ──────────────────────────────────────────────────────

/// Envelope of `getDeviceList.do`.
#[derive(Debug, Deserialize)]
pub struct DeviceListResponse {
    #[serde(rename = "deviceList", default)]
    pub device_list: Vec<FindDevice>,
}

/// One device entry from `getDeviceList.do`.
///
/// The service returns many more fields per device; everything not
/// modelled explicitly lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindDevice {
    #[serde(rename = "dvceID")]
    pub id: String,
    /// HTML-escaped, sometimes twice (`Bob&amp;#39;s S22`).
    #[serde(rename = "modelName", default)]
    pub model_name: String,
    #[serde(rename = "modelID", default)]
    pub model_id: Option<String>,
    #[serde(rename = "usrId", default)]
    pub user_id: Option<String>,
    /// `TAG`, `PHONE`, `TABLET`, `WATCH`, `BUDS`, ...
    #[serde(rename = "deviceTypeCode", default)]
    pub device_type_code: Option<String>,
    /// `CANAL2` marks earbuds with separate left/right locations.
    #[serde(rename = "subType", default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub icons: Option<DeviceIcons>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FindDevice {
    /// Display name with HTML entities fully decoded. The service escapes
    /// names twice.
    pub fn display_name(&self) -> String {
        let once = html_escape::decode_html_entities(&self.model_name);
        html_escape::decode_html_entities(&once).into_owned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIcons {
    #[serde(rename = "coloredIcon", default)]
    pub colored_icon: Option<String>,
}

// ── Device state ─────────────────────────────────────────────────────

/// Response of `setLastSelect.do`: the latest operations for one device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceOperations {
    #[serde(default)]
    pub operation: Vec<Operation>,
}

/// A single operation record. Location-bearing records are `LOCATION`,
/// `LASTLOC` and `OFFLINE_LOC`; battery arrives on `CHECK_CONNECTION`.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    #[serde(rename = "oprnType")]
    pub operation_type: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(rename = "horizontalUncertainty", default, deserialize_with = "lenient_f64")]
    pub horizontal_uncertainty: Option<f64>,
    #[serde(rename = "verticalUncertainty", default, deserialize_with = "lenient_f64")]
    pub vertical_uncertainty: Option<f64>,
    #[serde(default)]
    pub extra: Option<OperationExtra>,
    #[serde(rename = "encLocation", default)]
    pub enc_location: Option<EncLocation>,
    /// Either a level name (`FULL`, `MEDIUM`, ...) or a number.
    #[serde(default)]
    pub battery: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationExtra {
    /// `%Y%m%d%H%M%S`, UTC.
    #[serde(rename = "gpsUtcDt", default)]
    pub gps_utc_dt: Option<String>,
}

/// Location block that may be end-to-end encrypted. Multi-part devices
/// (earbuds) carry per-part blocks under keys like `left` and `right`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncLocation {
    #[serde(default)]
    pub encrypted: bool,
    #[serde(rename = "gpsUtcDt", default)]
    pub gps_utc_dt: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(rename = "horizontalUncertainty", default, deserialize_with = "lenient_f64")]
    pub horizontal_uncertainty: Option<f64>,
    #[serde(rename = "verticalUncertainty", default, deserialize_with = "lenient_f64")]
    pub vertical_uncertainty: Option<f64>,
    #[serde(flatten)]
    pub parts: HashMap<String, serde_json::Value>,
}

/// Location of one part of a multi-part device.
#[derive(Debug, Clone, Deserialize)]
pub struct PartLocation {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(rename = "horizontalUncertainty", default, deserialize_with = "lenient_f64")]
    pub horizontal_uncertainty: Option<f64>,
    #[serde(rename = "verticalUncertainty", default, deserialize_with = "lenient_f64")]
    pub vertical_uncertainty: Option<f64>,
    #[serde(rename = "gpsUtcDt", default)]
    pub gps_utc_dt: Option<String>,
}

impl EncLocation {
    /// Per-part locations (e.g. `left`, `right`) that parse as coordinates.
    pub fn part_locations(&self) -> Vec<(String, PartLocation)> {
        let mut parts: Vec<(String, PartLocation)> = self
            .parts
            .iter()
            .filter(|(_, v)| v.is_object())
            .filter_map(|(name, v)| {
                serde_json::from_value::<PartLocation>(v.clone())
                    .ok()
                    .filter(|p| p.latitude.is_some() && p.longitude.is_some())
                    .map(|p| (name.clone(), p))
            })
            .collect();
        parts.sort_by(|a, b| a.0.cmp(&b.0));
        parts
    }
}

// ── Login ────────────────────────────────────────────────────────────

/// Response of `signInXhr`.
#[derive(Debug, Deserialize)]
pub(crate) struct SignInXhr {
    #[serde(rename = "_csrf", default)]
    pub csrf: Option<CsrfBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CsrfBlock {
    #[serde(default)]
    pub token: Option<String>,
}

/// Response of the approval status endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct QrPollResponse {
    #[serde(rename = "rtnCd", default)]
    pub return_code: Option<String>,
    #[serde(rename = "nextURL", default)]
    pub next_url: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Accept a number, a numeric string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn double_escaped_names_decode() {
        let device: FindDevice = serde_json::from_value(json!({
            "dvceID": "d1",
            "modelName": "Bob&amp;#39;s S22"
        }))
        .unwrap();
        assert_eq!(device.display_name(), "Bob's S22");
    }

    #[test]
    fn named_html5_entities_decode() {
        let device: FindDevice = serde_json::from_value(json!({
            "dvceID": "d2",
            "modelName": "Caf&amp;eacute;&amp;nbsp;Tag"
        }))
        .unwrap();
        assert_eq!(device.display_name(), "Caf\u{e9}\u{a0}Tag");
    }

    #[test]
    fn unknown_entities_pass_through() {
        let device: FindDevice = serde_json::from_value(json!({
            "dvceID": "d3",
            "modelName": "a &bogus; b & c"
        }))
        .unwrap();
        assert_eq!(device.display_name(), "a &bogus; b & c");
    }

    #[test]
    fn coordinates_accept_strings_and_numbers() {
        let op: Operation = serde_json::from_value(json!({
            "oprnType": "LOCATION",
            "latitude": "52.5",
            "longitude": 13.4,
            "horizontalUncertainty": null
        }))
        .unwrap();
        assert_eq!(op.latitude, Some(52.5));
        assert_eq!(op.longitude, Some(13.4));
        assert_eq!(op.horizontal_uncertainty, None);
    }

    #[test]
    fn enc_location_exposes_parts() {
        let loc: EncLocation = serde_json::from_value(json!({
            "encrypted": false,
            "gpsUtcDt": "20240101120000",
            "left": { "latitude": "1.0", "longitude": "2.0", "gpsUtcDt": "20240101120000" },
            "right": { "latitude": 3.0, "longitude": 4.0 },
            "note": "not a part"
        }))
        .unwrap();
        let parts = loc.part_locations();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, "left");
        assert_eq!(parts[1].1.latitude, Some(3.0));
    }
}
