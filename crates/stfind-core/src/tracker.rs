// ── Tracker facade ──
//
// Wires the session store, login flow, API client, registry, poller and
// dispatcher together and owns the background poll task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use stfind_api::{FindClient, LoginClient, TransportConfig};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::AuthFlow;
use crate::config::TrackerConfig;
use crate::dispatcher::{Dispatcher, RingOutcome};
use crate::error::CoreError;
use crate::model::{DeviceRecord, Session, TrackerEvent};
use crate::poller::{self, PollOutcome, Poller};
use crate::session::SessionStore;
use crate::store::DeviceRegistry;
use crate::stream::DeviceStream;

const EVENT_CHANNEL_SIZE: usize = 256;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<TrackerInner>`. Construction does no I/O;
/// call [`start`](Self::start) to launch the poll schedule.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    sessions: Arc<SessionStore>,
    registry: Arc<DeviceRegistry>,
    auth: AuthFlow,
    poller: Arc<Poller>,
    dispatcher: Dispatcher,
    event_tx: broadcast::Sender<TrackerEvent>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::new(config.timeout);
        let find = FindClient::new(config.endpoints.clone(), &transport)?;
        let login = LoginClient::new(config.endpoints.clone(), transport);

        let sessions = Arc::new(SessionStore::new());
        let registry = Arc::new(DeviceRegistry::new());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let api = Arc::new(ApiClient::new(
            find,
            Arc::clone(&sessions),
            event_tx.clone(),
            config.active_mode,
        ));
        let auth = AuthFlow::new(
            login,
            Arc::clone(&sessions),
            config.login_timeout,
            config.approval_poll_interval,
        );
        let poller = Arc::new(Poller::new(
            Arc::clone(&api),
            Arc::clone(&registry),
            event_tx.clone(),
            config.device_list_refresh_cycles,
        ));
        let dispatcher = Dispatcher::new(api, Arc::clone(&registry), event_tx.clone());

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                sessions,
                registry,
                auth,
                poller,
                dispatcher,
                event_tx,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.inner.sessions
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn auth(&self) -> &AuthFlow {
        &self.inner.auth
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Install a session persisted by an earlier run.
    pub fn restore_session(&self, token: SecretString, acquired_at: DateTime<Utc>) {
        self.inner
            .sessions
            .set(Session::restored(token, acquired_at));
        debug!(%acquired_at, "restored persisted session");
    }

    /// Spawn the background poll schedule. Calling it twice is a no-op.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        let interval = self.inner.config.effective_update_interval();
        handles.push(tokio::spawn(poller::run_schedule(
            Arc::clone(&self.inner.poller),
            interval,
            self.inner.cancel.clone(),
        )));
        info!(interval_secs = interval.as_secs(), "poll schedule started");
    }

    /// Cancel and join background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("tracker stopped");
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Run one poll cycle now (skipped if one is in flight).
    pub async fn poll_once(&self) -> Result<PollOutcome, CoreError> {
        self.inner.poller.poll_once().await
    }

    /// Ask the service to ring a device. See [`RingOutcome`] for what
    /// "accepted" means.
    pub async fn ring(&self, device_id: &str) -> Result<RingOutcome, CoreError> {
        self.inner.dispatcher.ring(device_id).await
    }

    /// Remove a device from the registry and stop polling it.
    pub fn unregister(&self, device_id: &str) -> Option<Arc<DeviceRecord>> {
        self.inner.registry.unregister(device_id)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<DeviceRecord>>> {
        self.inner.registry.snapshot()
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.registry.subscribe()
    }
}
