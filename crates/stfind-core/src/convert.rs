// ── Wire-to-domain conversions ──
//
// Turns stfind-api response types into the canonical model: device listings
// get a kind and a capability set, operation records are reduced to the
// newest usable location and a battery level.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use stfind_api::{DeviceOperations, EncLocation, FindDevice, Operation, PartLocation};
use tracing::{debug, warn};

use crate::model::{Capabilities, DeviceKind, DeviceListing, DeviceLocation, DeviceStateUpdate};

/// Operation types that carry a position.
const LOCATION_OPERATIONS: [&str; 3] = ["LOCATION", "LASTLOC", "OFFLINE_LOC"];

/// Sub-type of earbuds that report left and right positions separately.
const SPLIT_EARBUDS_SUBTYPE: &str = "CANAL2";

/// Battery level names and the percentage each stands for.
const BATTERY_LEVELS: [(&str, u8); 4] = [("FULL", 100), ("MEDIUM", 50), ("LOW", 15), ("VERY_LOW", 5)];

const FIND_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

// ── Devices ──────────────────────────────────────────────────────────

impl From<FindDevice> for DeviceListing {
    fn from(device: FindDevice) -> Self {
        let kind = device_kind(
            device.device_type_code.as_deref(),
            device.sub_type.as_deref(),
        );
        Self {
            display_name: device.display_name(),
            kind,
            model: device.model_id.filter(|m| !m.is_empty()),
            user_id: device.user_id.filter(|u| !u.is_empty()),
            icon_url: device
                .icons
                .and_then(|i| i.colored_icon)
                .filter(|u| !u.is_empty()),
            capabilities: Capabilities::for_kind(kind),
            id: device.id,
        }
    }
}

/// Map the service's type code (and sub-type) onto a device kind.
pub fn device_kind(type_code: Option<&str>, sub_type: Option<&str>) -> DeviceKind {
    if sub_type == Some(SPLIT_EARBUDS_SUBTYPE) {
        return DeviceKind::Earbuds;
    }
    match type_code.map(str::to_ascii_uppercase).as_deref() {
        Some("TAG") => DeviceKind::Tag,
        Some("PHONE") => DeviceKind::Phone,
        Some("TABLET") => DeviceKind::Tablet,
        Some("WATCH") => DeviceKind::Watch,
        Some("BUDS" | "EARBUDS") => DeviceKind::Earbuds,
        _ => DeviceKind::Other,
    }
}

// ── Device state ─────────────────────────────────────────────────────

/// Reduce a device's operation records to a partial state update.
pub fn state_update(device_id: &str, kind: DeviceKind, ops: &DeviceOperations) -> DeviceStateUpdate {
    let sub_locations = if kind == DeviceKind::Earbuds {
        sub_locations(&ops.operation)
    } else {
        BTreeMap::new()
    };

    DeviceStateUpdate {
        location: newest_location(device_id, &ops.operation),
        battery_percent: battery_level(device_id, &ops.operation),
        sub_locations,
        answered: !ops.operation.is_empty(),
    }
}

/// The newest unencrypted, dated position among the location operations.
fn newest_location(device_id: &str, ops: &[Operation]) -> Option<DeviceLocation> {
    let mut best: Option<DeviceLocation> = None;

    for op in ops
        .iter()
        .filter(|op| LOCATION_OPERATIONS.contains(&op.operation_type.as_str()))
    {
        let candidate = if op.latitude.is_some() {
            plain_location(device_id, op)
        } else if let Some(enc) = &op.enc_location {
            enclosed_location(device_id, &op.operation_type, enc)
        } else {
            None
        };
        let Some(candidate) = candidate else { continue };

        let newer = match (&best, candidate.timestamp) {
            (None, _) => true,
            (Some(current), Some(ts)) => current.timestamp.is_none_or(|cur| ts > cur),
            (Some(_), None) => false,
        };
        if newer {
            best = Some(candidate);
        } else {
            debug!(device_id, op = %op.operation_type, "ignoring older location");
        }
    }

    best
}

fn plain_location(device_id: &str, op: &Operation) -> Option<DeviceLocation> {
    let Some(timestamp) = op
        .extra
        .as_ref()
        .and_then(|e| e.gps_utc_dt.as_deref())
        .and_then(parse_find_date)
    else {
        warn!(device_id, op = %op.operation_type, "location without a UTC date, skipping");
        return None;
    };
    Some(DeviceLocation {
        latitude: op.latitude?,
        longitude: op.longitude?,
        timestamp: Some(timestamp),
        accuracy_m: accuracy(op.horizontal_uncertainty, op.vertical_uncertainty),
    })
}

fn enclosed_location(device_id: &str, op_type: &str, enc: &EncLocation) -> Option<DeviceLocation> {
    if enc.encrypted {
        debug!(device_id, op = op_type, "ignoring encrypted location");
        return None;
    }
    let Some(timestamp) = enc.gps_utc_dt.as_deref().and_then(parse_find_date) else {
        debug!(device_id, op = op_type, "ignoring location with missing date");
        return None;
    };
    Some(DeviceLocation {
        latitude: enc.latitude?,
        longitude: enc.longitude?,
        timestamp: Some(timestamp),
        accuracy_m: accuracy(enc.horizontal_uncertainty, enc.vertical_uncertainty),
    })
}

/// Per-part positions from the first operation that carries each part.
fn sub_locations(ops: &[Operation]) -> BTreeMap<String, DeviceLocation> {
    let mut parts = BTreeMap::new();
    for enc in ops.iter().filter_map(|op| op.enc_location.as_ref()) {
        for (name, part) in enc.part_locations() {
            if let Some(location) = part_location(&part) {
                parts.entry(name).or_insert(location);
            }
        }
    }
    parts
}

fn part_location(part: &PartLocation) -> Option<DeviceLocation> {
    Some(DeviceLocation {
        latitude: part.latitude?,
        longitude: part.longitude?,
        timestamp: part.gps_utc_dt.as_deref().and_then(parse_find_date),
        accuracy_m: accuracy(part.horizontal_uncertainty, part.vertical_uncertainty),
    })
}

/// Battery from the first `CHECK_CONNECTION` record that carries one.
fn battery_level(device_id: &str, ops: &[Operation]) -> Option<u8> {
    let raw = ops
        .iter()
        .filter(|op| op.operation_type == "CHECK_CONNECTION")
        .find_map(|op| op.battery.as_ref())?;

    let level = match raw {
        serde_json::Value::String(name) => BATTERY_LEVELS
            .iter()
            .find(|(level, _)| *level == name.as_str())
            .map(|(_, pct)| *pct)
            .or_else(|| name.trim().parse::<u8>().ok()),
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        _ => None,
    };

    match level {
        Some(pct) if pct <= 100 => Some(pct),
        _ => {
            warn!(device_id, battery = %raw, "invalid battery level");
            None
        }
    }
}

/// Combined accuracy `sqrt(h² + v²)`, rounded to one decimal.
pub fn accuracy(horizontal: Option<f64>, vertical: Option<f64>) -> Option<f64> {
    let (h, v) = (horizontal?, vertical?);
    Some((h.hypot(v) * 10.0).round() / 10.0)
}

/// Parse the service's `%Y%m%d%H%M%S` timestamps (UTC).
pub fn parse_find_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), FIND_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
