use serde::Serialize;

/// Events broadcast by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// The session was rejected. Emitted once per valid-to-invalid
    /// transition, however many calls failed at the same time.
    ReauthRequired,
    /// A device record changed.
    DeviceUpdated { id: String },
    /// Outcome of a ring request. `accepted` means the service took the
    /// request, not that the device rang.
    RingResult { id: String, accepted: bool },
}
