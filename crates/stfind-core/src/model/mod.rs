// ── Domain model ──
//
// Canonical representation of tracked devices, sessions and login
// challenges. Wire types from stfind-api are converted into these in
// `crate::convert`; consumers only ever see this module's types.

pub mod challenge;
pub mod device;
pub mod event;
pub mod session;

pub use challenge::{AuthChallenge, AuthState, ChallengeInfo};
pub use device::{
    Capabilities, Capability, DeviceKind, DeviceListing, DeviceLocation, DeviceRecord,
    DeviceStateUpdate,
};
pub use event::TrackerEvent;
pub use session::Session;
