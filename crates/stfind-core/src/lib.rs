// stfind-core: Session lifecycle and device synchronization between
// stfind-api and its consumers (CLI, host integrations).

pub mod api;
pub mod auth;
pub mod config;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod poller;
pub mod session;
pub mod store;
pub mod stream;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::ApiClient;
pub use auth::AuthFlow;
pub use config::{ActiveMode, MIN_UPDATE_INTERVAL, TrackerConfig};
pub use dispatcher::{Dispatcher, RingOutcome};
pub use error::CoreError;
pub use poller::{PollOutcome, PollSummary, Poller};
pub use session::SessionStore;
pub use store::DeviceRegistry;
pub use stream::DeviceStream;
pub use tracker::Tracker;

pub use model::{
    AuthChallenge, AuthState, Capabilities, Capability, ChallengeInfo, DeviceKind, DeviceListing,
    DeviceLocation, DeviceRecord, DeviceStateUpdate, Session, TrackerEvent,
};
