// ── Device domain types ──

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device category, normalized from the service's type codes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    Tag,
    Phone,
    Tablet,
    Watch,
    Earbuds,
    /// A type code none of the above match.
    Other,
}

/// A single thing a device can be asked or expected to do.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    Ring,
    Track,
    StopRing,
    Battery,
}

/// The capability set of one device. Callers check this before offering an
/// operation instead of branching on the device kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    /// Capabilities the service offers for a device kind.
    ///
    /// Stop-ring is never granted: the service has no working stop command.
    /// Earbuds report no battery level.
    pub fn for_kind(kind: DeviceKind) -> Self {
        let mut set = BTreeSet::from([Capability::Ring, Capability::Track]);
        if kind != DeviceKind::Earbuds {
            set.insert(Capability::Battery);
        }
        Self(set)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        f.write_str(&names.join(", "))
    }
}

/// A reported position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// When the device was at this position (UTC).
    pub timestamp: Option<DateTime<Utc>>,
    /// Combined horizontal/vertical uncertainty in meters.
    pub accuracy_m: Option<f64>,
}

/// Identity and static attributes of a device, as found in the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListing {
    pub id: String,
    pub display_name: String,
    pub kind: DeviceKind,
    pub model: Option<String>,
    /// Owner id; attached to operations on this device.
    pub user_id: Option<String>,
    pub icon_url: Option<String>,
    pub capabilities: Capabilities,
}

/// A partial state report for one device. `None` means "not reported",
/// never "clear".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStateUpdate {
    pub location: Option<DeviceLocation>,
    pub battery_percent: Option<u8>,
    /// Per-part positions (`left`, `right`) of multi-part devices.
    pub sub_locations: BTreeMap<String, DeviceLocation>,
    /// `false` when the service answered without any operation records.
    pub answered: bool,
}

/// Canonical device record held in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub display_name: String,
    pub kind: DeviceKind,
    pub model: Option<String>,
    pub user_id: Option<String>,
    pub icon_url: Option<String>,
    pub last_location: Option<DeviceLocation>,
    pub battery_percent: Option<u8>,
    pub sub_locations: BTreeMap<String, DeviceLocation>,
    pub capabilities: Capabilities,
    /// Missing from the most recent device listing.
    pub stale: bool,
    /// Whether the most recent state fetch for this device succeeded.
    pub last_poll_ok: bool,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    pub fn from_listing(listing: DeviceListing) -> Self {
        Self {
            id: listing.id,
            display_name: listing.display_name,
            kind: listing.kind,
            model: listing.model,
            user_id: listing.user_id,
            icon_url: listing.icon_url,
            last_location: None,
            battery_percent: None,
            sub_locations: BTreeMap::new(),
            capabilities: listing.capabilities,
            stale: false,
            last_poll_ok: true,
            last_polled_at: None,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Refresh the static attributes from a new listing. Returns `true` if
    /// anything changed.
    pub fn apply_listing(&mut self, listing: &DeviceListing) -> bool {
        let before = self.clone();
        self.display_name.clone_from(&listing.display_name);
        self.kind = listing.kind;
        self.model.clone_from(&listing.model);
        self.user_id.clone_from(&listing.user_id);
        self.icon_url.clone_from(&listing.icon_url);
        self.capabilities = listing.capabilities.clone();
        self.stale = false;
        *self != before
    }

    /// Merge a state report field by field. Returns `true` if the record's
    /// content changed; the poll timestamp alone does not count.
    pub fn merge(&mut self, update: DeviceStateUpdate, at: DateTime<Utc>) -> bool {
        let before = self.clone();

        if let Some(location) = update.location {
            self.last_location = Some(location);
        }
        if self.has(Capability::Battery) {
            if let Some(battery) = update.battery_percent {
                self.battery_percent = Some(battery);
            }
        }
        for (part, location) in update.sub_locations {
            self.sub_locations.insert(part, location);
        }
        self.last_poll_ok = update.answered;
        self.last_polled_at = Some(at);

        self.content_differs(&before)
    }

    /// Record a failed state fetch. Returns `true` if the record changed.
    pub fn mark_failed(&mut self, at: DateTime<Utc>) -> bool {
        let changed = self.last_poll_ok;
        self.last_poll_ok = false;
        self.last_polled_at = Some(at);
        changed
    }

    fn content_differs(&self, other: &Self) -> bool {
        let mut a = self.clone();
        a.last_polled_at = other.last_polled_at;
        a != *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn listing(id: &str, kind: DeviceKind) -> DeviceListing {
        DeviceListing {
            id: id.into(),
            display_name: format!("Device {id}"),
            kind,
            model: None,
            user_id: Some("owner".into()),
            icon_url: None,
            capabilities: Capabilities::for_kind(kind),
        }
    }

    fn at(lat: f64, lon: f64) -> DeviceLocation {
        DeviceLocation {
            latitude: lat,
            longitude: lon,
            timestamp: None,
            accuracy_m: None,
        }
    }

    #[test]
    fn earbuds_have_no_battery_and_nothing_stops_ringing() {
        let buds = Capabilities::for_kind(DeviceKind::Earbuds);
        assert!(buds.contains(Capability::Ring));
        assert!(!buds.contains(Capability::Battery));

        for kind in [DeviceKind::Tag, DeviceKind::Phone, DeviceKind::Watch] {
            assert!(!Capabilities::for_kind(kind).contains(Capability::StopRing));
        }
    }

    #[test]
    fn merge_keeps_fields_the_update_omits() {
        let mut record = DeviceRecord::from_listing(listing("A", DeviceKind::Tag));
        let now = Utc::now();

        record.merge(
            DeviceStateUpdate {
                location: Some(at(1.0, 1.0)),
                battery_percent: Some(80),
                answered: true,
                ..DeviceStateUpdate::default()
            },
            now,
        );
        let changed = record.merge(
            DeviceStateUpdate {
                battery_percent: Some(79),
                answered: true,
                ..DeviceStateUpdate::default()
            },
            now,
        );

        assert!(changed);
        assert_eq!(record.last_location, Some(at(1.0, 1.0)));
        assert_eq!(record.battery_percent, Some(79));
    }

    #[test]
    fn merge_without_new_data_is_not_a_change() {
        let mut record = DeviceRecord::from_listing(listing("A", DeviceKind::Phone));
        let empty = DeviceStateUpdate {
            answered: true,
            ..DeviceStateUpdate::default()
        };
        assert!(!record.merge(empty.clone(), Utc::now()));
        assert!(!record.merge(empty, Utc::now()));
        assert!(record.last_polled_at.is_some());
    }

    #[test]
    fn earbud_battery_reports_are_ignored() {
        let mut record = DeviceRecord::from_listing(listing("B", DeviceKind::Earbuds));
        record.merge(
            DeviceStateUpdate {
                battery_percent: Some(50),
                answered: true,
                ..DeviceStateUpdate::default()
            },
            Utc::now(),
        );
        assert_eq!(record.battery_percent, None);
    }

    #[test]
    fn sub_locations_merge_per_part() {
        let mut record = DeviceRecord::from_listing(listing("B", DeviceKind::Earbuds));
        record.merge(
            DeviceStateUpdate {
                sub_locations: BTreeMap::from([
                    ("left".into(), at(1.0, 1.0)),
                    ("right".into(), at(2.0, 2.0)),
                ]),
                answered: true,
                ..DeviceStateUpdate::default()
            },
            Utc::now(),
        );
        record.merge(
            DeviceStateUpdate {
                sub_locations: BTreeMap::from([("left".into(), at(3.0, 3.0))]),
                answered: true,
                ..DeviceStateUpdate::default()
            },
            Utc::now(),
        );

        assert_eq!(record.sub_locations["left"], at(3.0, 3.0));
        assert_eq!(record.sub_locations["right"], at(2.0, 2.0));
    }

    #[test]
    fn listing_refresh_clears_stale() {
        let mut record = DeviceRecord::from_listing(listing("A", DeviceKind::Tag));
        record.stale = true;
        assert!(record.apply_listing(&listing("A", DeviceKind::Tag)));
        assert!(!record.stale);
        assert!(!record.apply_listing(&listing("A", DeviceKind::Tag)));
    }
}
