// ── Authenticated API access ──
//
// Every authenticated call from the poller and the dispatcher goes through
// `ApiClient`. It loads the session fresh for each call and is the only
// place that turns an auth rejection into an invalidated session and a
// reauth event.

use std::sync::Arc;

use stfind_api::FindClient;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ActiveMode;
use crate::convert;
use crate::error::CoreError;
use crate::model::{DeviceListing, DeviceStateUpdate, Session, TrackerEvent};
use crate::session::SessionStore;

/// Session-enforcing wrapper around [`FindClient`].
pub struct ApiClient {
    find: FindClient,
    sessions: Arc<SessionStore>,
    events: broadcast::Sender<TrackerEvent>,
    active_mode: ActiveMode,
}

impl ApiClient {
    pub fn new(
        find: FindClient,
        sessions: Arc<SessionStore>,
        events: broadcast::Sender<TrackerEvent>,
        active_mode: ActiveMode,
    ) -> Self {
        Self {
            find,
            sessions,
            events,
            active_mode,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// All devices on the account, without location or battery.
    pub async fn list_devices(&self) -> Result<Vec<DeviceListing>, CoreError> {
        let session = self.session()?;
        let result = self.find.list_devices(&session.token).await;
        let devices = self.settle(&session, result)?;
        Ok(devices.into_iter().map(DeviceListing::from).collect())
    }

    /// Current state of one device.
    ///
    /// In active mode the service is first asked to locate the device. A
    /// failure of that request is logged and the last known state is read
    /// anyway, unless the session itself was rejected.
    pub async fn fetch_device_state(
        &self,
        device: &DeviceListing,
    ) -> Result<DeviceStateUpdate, CoreError> {
        let session = self.session()?;

        if self.active_mode.applies_to(device.kind) {
            let result = self
                .find
                .request_location_update(&session.token, &device.id, device.user_id.as_deref())
                .await;
            match self.settle(&session, result) {
                Ok(()) => {}
                Err(e) if e.is_auth_invalid() => return Err(e),
                Err(e) => debug!(device_id = %device.id, error = %e, "location request failed"),
            }
        }

        let result = self.find.device_operations(&session.token, &device.id).await;
        let ops = self.settle(&session, result)?;
        Ok(convert::state_update(&device.id, device.kind, &ops))
    }

    /// Ask the service to ring a device. Success means the request was
    /// accepted, not that the device rang.
    pub async fn ring_device(&self, id: &str, user_id: Option<&str>) -> Result<(), CoreError> {
        let session = self.session()?;
        let result = self.find.ring(&session.token, id, user_id).await;
        self.settle(&session, result)
    }

    // ── Choke point ──────────────────────────────────────────────────

    fn session(&self) -> Result<Arc<Session>, CoreError> {
        self.sessions.get_valid().ok_or_else(CoreError::no_session)
    }

    /// Classify a wire result. An auth rejection invalidates the session it
    /// was made with and, for the caller that performed the transition,
    /// emits the single reauth event.
    fn settle<T>(
        &self,
        session: &Arc<Session>,
        result: Result<T, stfind_api::Error>,
    ) -> Result<T, CoreError> {
        result.map_err(|err| {
            if err.is_auth_invalid() && self.sessions.invalidate_if_current(session) {
                warn!(error = %err, "session rejected, reauthentication required");
                let _ = self.events.send(TrackerEvent::ReauthRequired);
            }
            CoreError::from(err)
        })
    }
}
