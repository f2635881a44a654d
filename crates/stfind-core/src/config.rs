// ── Runtime tracker configuration ──
//
// Polling cadence, timeouts and service endpoints. Never touches disk:
// the CLI (via stfind-config) or a host integration builds a
// `TrackerConfig` and hands it in.

use std::time::Duration;

use stfind_api::Endpoints;

use crate::model::DeviceKind;

/// The service is polled no more often than this.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(30);

/// Which device kinds get an explicit location request before each read.
///
/// Active mode makes the service contact the device, which drains its
/// battery; passive mode reads whatever the service last recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveMode {
    pub smarttags: bool,
    pub others: bool,
}

impl Default for ActiveMode {
    fn default() -> Self {
        Self {
            smarttags: true,
            others: false,
        }
    }
}

impl ActiveMode {
    pub fn applies_to(&self, kind: DeviceKind) -> bool {
        if kind == DeviceKind::Tag {
            self.smarttags
        } else {
            self.others
        }
    }
}

/// Configuration for a single tracked account.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Account and Find service base URLs.
    pub endpoints: Endpoints,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Time between scheduled poll cycles. Clamped to `MIN_UPDATE_INTERVAL`.
    pub update_interval: Duration,
    /// How long a login challenge stays open.
    pub login_timeout: Duration,
    /// Delay between approval status checks.
    pub approval_poll_interval: Duration,
    /// The device list is refetched every this many cycles.
    pub device_list_refresh_cycles: u32,
    pub active_mode: ActiveMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            timeout: Duration::from_secs(20),
            update_interval: Duration::from_secs(120),
            login_timeout: Duration::from_secs(120),
            approval_poll_interval: Duration::from_secs(2),
            device_list_refresh_cycles: 10,
            active_mode: ActiveMode::default(),
        }
    }
}

impl TrackerConfig {
    /// The update interval actually used by the scheduler.
    pub fn effective_update_interval(&self) -> Duration {
        self.update_interval.max(MIN_UPDATE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_interval_is_clamped() {
        let config = TrackerConfig {
            update_interval: Duration::from_secs(5),
            ..TrackerConfig::default()
        };
        assert_eq!(config.effective_update_interval(), MIN_UPDATE_INTERVAL);
    }

    #[test]
    fn active_mode_defaults_to_tags_only() {
        let mode = ActiveMode::default();
        assert!(mode.applies_to(DeviceKind::Tag));
        assert!(!mode.applies_to(DeviceKind::Phone));
        assert!(!mode.applies_to(DeviceKind::Earbuds));
    }
}
