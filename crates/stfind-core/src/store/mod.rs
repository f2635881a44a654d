// ── Device registry ──
//
// Concurrent storage of device records with snapshot-based change
// notification. Mutated only by the poller.

mod registry;

pub use registry::DeviceRegistry;
