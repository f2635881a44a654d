// ── Command dispatch ──
//
// Ring requests run independently of the poll cycle and share the API
// client's auth handling.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::CoreError;
use crate::model::{Capability, TrackerEvent};
use crate::store::DeviceRegistry;

/// What the service said about a ring request.
///
/// `Accepted` only means the request was taken. The device rings only if a
/// companion device is within Bluetooth range of it, which cannot be
/// observed from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RingOutcome {
    Accepted,
    Rejected,
}

pub struct Dispatcher {
    api: Arc<ApiClient>,
    registry: Arc<DeviceRegistry>,
    events: broadcast::Sender<TrackerEvent>,
}

impl Dispatcher {
    pub fn new(
        api: Arc<ApiClient>,
        registry: Arc<DeviceRegistry>,
        events: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self {
            api,
            registry,
            events,
        }
    }

    /// Ask the service to ring `device_id`.
    ///
    /// Ids unknown to the registry are forwarded as-is. A known device
    /// without the ring capability is refused with `Unsupported`. A request
    /// the service refuses yields `Ok(Rejected)`; auth and transient
    /// failures are errors.
    pub async fn ring(&self, device_id: &str) -> Result<RingOutcome, CoreError> {
        let known = self.registry.get(device_id);
        if let Some(record) = &known {
            if !record.has(Capability::Ring) {
                let _ = self.events.send(TrackerEvent::RingResult {
                    id: device_id.to_owned(),
                    accepted: false,
                });
                return Err(CoreError::Unsupported {
                    operation: "ring".into(),
                    id: device_id.to_owned(),
                });
            }
        }
        let user_id = known.as_ref().and_then(|r| r.user_id.as_deref());

        let outcome = match self.api.ring_device(device_id, user_id).await {
            Ok(()) => RingOutcome::Accepted,
            Err(CoreError::PermanentRequest { message, .. }) => {
                warn!(device_id, %message, "ring request rejected");
                RingOutcome::Rejected
            }
            Err(e) => {
                let _ = self.events.send(TrackerEvent::RingResult {
                    id: device_id.to_owned(),
                    accepted: false,
                });
                return Err(e);
            }
        };

        info!(device_id, %outcome, "ring dispatched");
        let _ = self.events.send(TrackerEvent::RingResult {
            id: device_id.to_owned(),
            accepted: outcome == RingOutcome::Accepted,
        });
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use stfind_api::{Endpoints, FindClient, TransportConfig};
    use url::Url;
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ActiveMode;
    use crate::model::{Capabilities, DeviceKind, DeviceListing};
    use crate::session::SessionStore;

    #[tokio::test]
    async fn ring_without_capability_reports_refusal() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let endpoints = Endpoints::single(&Url::parse(&server.uri()).unwrap());
        let find =
            FindClient::new(endpoints, &TransportConfig::new(Duration::from_secs(5))).unwrap();
        let (events, mut rx) = broadcast::channel(8);
        let api = Arc::new(ApiClient::new(
            find,
            Arc::new(SessionStore::new()),
            events.clone(),
            ActiveMode::default(),
        ));
        let registry = Arc::new(DeviceRegistry::new());
        registry.apply_listing(&[DeviceListing {
            id: "mute".into(),
            display_name: "Mute".into(),
            kind: DeviceKind::Tag,
            model: None,
            user_id: None,
            icon_url: None,
            capabilities: [Capability::Track].into_iter().collect::<Capabilities>(),
        }]);
        let dispatcher = Dispatcher::new(api, registry, events);

        let result = dispatcher.ring("mute").await;

        assert!(
            matches!(result, Err(CoreError::Unsupported { ref id, .. }) if id == "mute"),
            "got: {result:?}"
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TrackerEvent::RingResult {
                id: "mute".into(),
                accepted: false
            }
        );
    }
}
