// ── Poll cycles ──
//
// One cycle refreshes every tracked device. Cycles never overlap: a trigger
// that arrives while a cycle runs is skipped, not queued. The scheduling
// loop lives in `run_schedule`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::CoreError;
use crate::model::{DeviceListing, TrackerEvent};
use crate::store::DeviceRegistry;

/// Result of a [`Poller::poll_once`] call that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another cycle was already running; this trigger did nothing.
    Skipped,
    Completed(PollSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Devices whose state was fetched.
    pub polled: usize,
    /// Records whose content changed.
    pub updated: usize,
    /// Devices whose fetch failed transiently or was rejected.
    pub failed: usize,
    /// Whether the device list was refetched this cycle.
    pub listing_refreshed: bool,
}

struct PollState {
    cycle: u64,
    listings: Vec<DeviceListing>,
}

/// Refreshes the registry from the service.
pub struct Poller {
    api: Arc<ApiClient>,
    registry: Arc<DeviceRegistry>,
    events: broadcast::Sender<TrackerEvent>,
    state: Mutex<PollState>,
    refresh_cycles: u64,
}

impl Poller {
    pub fn new(
        api: Arc<ApiClient>,
        registry: Arc<DeviceRegistry>,
        events: broadcast::Sender<TrackerEvent>,
        device_list_refresh_cycles: u32,
    ) -> Self {
        Self {
            api,
            registry,
            events,
            state: Mutex::new(PollState {
                cycle: 0,
                listings: Vec::new(),
            }),
            refresh_cycles: u64::from(device_list_refresh_cycles.max(1)),
        }
    }

    /// Run one poll cycle unless one is already in flight.
    ///
    /// Fails with `AuthInvalid` without any request when there is no valid
    /// session, and aborts the cycle on the first auth rejection. A failed
    /// device-list fetch fails the cycle; per-device failures do not.
    pub async fn poll_once(&self) -> Result<PollOutcome, CoreError> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("poll cycle already running, skipping");
            return Ok(PollOutcome::Skipped);
        };

        if !self.api.sessions().is_valid() {
            debug!("no valid session, poll short-circuited");
            return Err(CoreError::no_session());
        }

        let mut summary = PollSummary::default();

        if state.cycle % self.refresh_cycles == 0 || state.listings.is_empty() {
            let listings = self.api.list_devices().await?;
            for id in self.registry.apply_listing(&listings) {
                self.emit_updated(id);
            }
            info!(devices = listings.len(), "device list refreshed");
            state.listings = listings;
            summary.listing_refreshed = true;
        }
        state.cycle += 1;

        for device in &state.listings {
            if self.registry.is_ignored(&device.id) {
                continue;
            }
            summary.polled += 1;

            match self.api.fetch_device_state(device).await {
                Ok(update) => {
                    if !update.answered {
                        warn!(device_id = %device.id, "service returned no operations");
                    }
                    if self.registry.apply_update(&device.id, update, Utc::now()) {
                        summary.updated += 1;
                        self.emit_updated(device.id.clone());
                    }
                }
                Err(e) if e.is_auth_invalid() => {
                    info!("session rejected, aborting poll cycle");
                    return Err(e);
                }
                Err(e) => {
                    summary.failed += 1;
                    if e.is_transient() {
                        info!(device_id = %device.id, error = %e, "device fetch failed, will retry next cycle");
                        if self.registry.mark_failed(&device.id, Utc::now()) {
                            self.emit_updated(device.id.clone());
                        }
                    } else {
                        warn!(device_id = %device.id, error = %e, "device fetch rejected, skipping");
                    }
                }
            }
        }

        debug!(
            polled = summary.polled,
            updated = summary.updated,
            failed = summary.failed,
            "poll cycle complete"
        );
        Ok(PollOutcome::Completed(summary))
    }

    fn emit_updated(&self, id: String) {
        let _ = self.events.send(TrackerEvent::DeviceUpdated { id });
    }
}

// ── Scheduling ───────────────────────────────────────────────────────

/// Poll every `interval` until cancelled.
///
/// While there is no valid session the loop idles on the session store and
/// runs a cycle as soon as a valid session is set. Missed ticks are skipped.
pub async fn run_schedule(poller: Arc<Poller>, interval: Duration, cancel: CancellationToken) {
    let mut generation = poller.api.sessions().subscribe();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if !poller.api.sessions().is_valid() {
            debug!("poller idle until a session is available");
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = generation.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match poller.poll_once().await {
            Ok(_) => {}
            Err(e) if e.is_auth_invalid() => {
                // Idle at the top of the loop; poll immediately once a new
                // session arrives.
                generation.borrow_and_update();
                ticker.reset_immediately();
            }
            Err(e) => warn!(error = %e, "poll cycle failed"),
        }
    }
    debug!("poll schedule stopped");
}
