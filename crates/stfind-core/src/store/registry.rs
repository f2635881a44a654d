use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use tokio::sync::watch;
use tracing::debug;

use crate::model::{DeviceListing, DeviceRecord, DeviceStateUpdate};
use crate::stream::DeviceStream;

/// Map of device id to record.
///
/// Uses `DashMap` for concurrent lookups and a `watch` channel carrying a
/// full snapshot, rebuilt after each batch of mutations. Records are never
/// removed by polling: devices that drop out of a listing are marked stale.
/// Only [`unregister`](Self::unregister) removes a record, and the id is
/// then ignored by later polls.
pub struct DeviceRegistry {
    devices: DashMap<String, Arc<DeviceRecord>>,
    ignored: DashSet<String>,
    snapshot: watch::Sender<Arc<Vec<Arc<DeviceRecord>>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            devices: DashMap::new(),
            ignored: DashSet::new(),
            snapshot,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.devices.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Current snapshot, sorted by id (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceRecord>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn is_ignored(&self, id: &str) -> bool {
        self.ignored.contains(id)
    }

    // ── Entity layer ─────────────────────────────────────────────────

    /// Remove a device and ignore it from now on.
    pub fn unregister(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.ignored.insert(id.to_owned());
        let removed = self.devices.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            debug!(device_id = id, "device unregistered");
            self.rebuild_snapshot();
        }
        removed
    }

    // ── Poller mutations ─────────────────────────────────────────────

    /// Reconcile with a fresh device listing. New devices are created,
    /// known ones refreshed, absent ones marked stale. Returns the ids whose
    /// records changed.
    pub(crate) fn apply_listing(&self, listings: &[DeviceListing]) -> Vec<String> {
        let mut changed = Vec::new();
        let listed: HashSet<&str> = listings.iter().map(|l| l.id.as_str()).collect();

        for listing in listings {
            if self.is_ignored(&listing.id) {
                continue;
            }
            match self.devices.get_mut(&listing.id) {
                Some(mut entry) => {
                    let mut record = DeviceRecord::clone(entry.value());
                    if record.apply_listing(listing) {
                        *entry = Arc::new(record);
                        changed.push(listing.id.clone());
                    }
                }
                None => {
                    debug!(device_id = %listing.id, kind = %listing.kind, "new device");
                    self.devices.insert(
                        listing.id.clone(),
                        Arc::new(DeviceRecord::from_listing(listing.clone())),
                    );
                    changed.push(listing.id.clone());
                }
            }
        }

        for mut entry in self.devices.iter_mut() {
            if !listed.contains(entry.key().as_str()) && !entry.stale {
                let mut record = DeviceRecord::clone(entry.value());
                record.stale = true;
                debug!(device_id = %record.id, "device missing from listing, marked stale");
                changed.push(record.id.clone());
                *entry = Arc::new(record);
            }
        }

        if !changed.is_empty() {
            self.rebuild_snapshot();
        }
        changed
    }

    /// Merge a state report into a known device. Returns `true` if the
    /// record's content changed. Unknown or unregistered ids are ignored.
    pub(crate) fn apply_update(
        &self,
        id: &str,
        update: DeviceStateUpdate,
        at: DateTime<Utc>,
    ) -> bool {
        self.modify(id, |record| record.merge(update, at))
    }

    /// Record a failed state fetch for a known device.
    pub(crate) fn mark_failed(&self, id: &str, at: DateTime<Utc>) -> bool {
        self.modify(id, |record| record.mark_failed(at))
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut DeviceRecord) -> bool) -> bool {
        let changed = {
            let Some(mut entry) = self.devices.get_mut(id) else {
                return false;
            };
            let mut record = DeviceRecord::clone(entry.value());
            let changed = f(&mut record);
            *entry = Arc::new(record);
            changed
        };
        // Poll timestamps move even without a content change.
        self.rebuild_snapshot();
        changed
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<DeviceRecord>> =
            self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id.cmp(&b.id));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
