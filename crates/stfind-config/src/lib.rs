//! Configuration and session persistence for stfind.
//!
//! A flat TOML file in the platform config directory merged with
//! `STFIND_`-prefixed environment variables, translated to
//! `stfind_core::TrackerConfig`. The session token is kept in the system
//! keyring, or in a private file when no keyring is available.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use stfind_api::Endpoints;
use stfind_core::{ActiveMode, MIN_UPDATE_INTERVAL, Session, TrackerConfig};

/// Environment variable that overrides any stored session token.
pub const SESSION_TOKEN_ENV: &str = "STFIND_SESSION_TOKEN";

const KEYRING_SERVICE: &str = "stfind";
const KEYRING_USER: &str = "session";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("stored session is unreadable: {0}")]
    SessionFormat(#[from] serde_json::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between poll cycles (minimum 30).
    pub update_interval_secs: u64,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// How long a QR login challenge stays open, in seconds.
    pub login_timeout_secs: u64,

    /// Seconds between login approval checks.
    pub approval_poll_interval_secs: u64,

    /// Refetch the device list every this many poll cycles.
    pub device_list_refresh_cycles: u32,

    /// Ask SmartTags for a fresh location on every poll.
    pub active_mode_smarttags: bool,

    /// Ask phones, tablets, watches and earbuds for a fresh location on
    /// every poll. Drains their batteries.
    pub active_mode_others: bool,

    /// Samsung account service base URL.
    pub account_url: String,

    /// SmartThings Find base URL.
    pub find_url: String,

    /// Default output format for the CLI.
    pub output: String,

    /// Default color mode for the CLI.
    pub color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_interval_secs: 120,
            timeout_secs: 20,
            login_timeout_secs: 120,
            approval_poll_interval_secs: 2,
            device_list_refresh_cycles: 10,
            active_mode_smarttags: true,
            active_mode_others: false,
            account_url: stfind_api::endpoints::DEFAULT_ACCOUNT_URL.into(),
            find_url: stfind_api::endpoints::DEFAULT_FIND_URL.into(),
            output: "table".into(),
            color: "auto".into(),
        }
    }
}

impl Config {
    /// Translate into the runtime configuration of the tracker.
    ///
    /// An update interval below the minimum is raised to it.
    pub fn to_tracker_config(&self) -> Result<TrackerConfig, ConfigError> {
        let account = parse_url("account_url", &self.account_url)?;
        let find = parse_url("find_url", &self.find_url)?;

        let mut update_interval = Duration::from_secs(self.update_interval_secs);
        if update_interval < MIN_UPDATE_INTERVAL {
            warn!(
                configured = self.update_interval_secs,
                minimum = MIN_UPDATE_INTERVAL.as_secs(),
                "update interval below minimum, clamping"
            );
            update_interval = MIN_UPDATE_INTERVAL;
        }

        if self.device_list_refresh_cycles == 0 {
            return Err(ConfigError::Validation {
                field: "device_list_refresh_cycles".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(TrackerConfig {
            endpoints: Endpoints::new(account, find),
            timeout: positive_secs("timeout_secs", self.timeout_secs)?,
            update_interval,
            login_timeout: positive_secs("login_timeout_secs", self.login_timeout_secs)?,
            approval_poll_interval: positive_secs(
                "approval_poll_interval_secs",
                self.approval_poll_interval_secs,
            )?,
            device_list_refresh_cycles: self.device_list_refresh_cycles,
            active_mode: ActiveMode {
                smarttags: self.active_mode_smarttags,
                others: self.active_mode_others,
            },
        })
    }
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "stfind", "stfind")
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("stfind");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the session file lives when no keyring is available.
pub fn session_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share").join("session.json"),
        |dirs| dirs.data_dir().join("session.json"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` and the environment. A missing file means
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("STFIND_").ignore(&["session_token"]))
        .extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Session persistence ─────────────────────────────────────────────

/// A session token read back from storage.
#[derive(Debug, Clone)]
pub struct PersistedSession {
    pub token: SecretString,
    pub acquired_at: DateTime<Utc>,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            acquired_at: session.acquired_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SessionRecord {
    token: String,
    acquired_at: DateTime<Utc>,
}

impl PersistedSession {
    fn encode(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(&SessionRecord {
            token: self.token.expose_secret().to_owned(),
            acquired_at: self.acquired_at,
        })?)
    }

    fn decode(raw: &str) -> Result<Self, ConfigError> {
        let record: SessionRecord = serde_json::from_str(raw)?;
        Ok(Self {
            token: SecretString::from(record.token),
            acquired_at: record.acquired_at,
        })
    }
}

/// Session storage in a plain file readable only by the owner.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<PersistedSession>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => PersistedSession::decode(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, session: &PersistedSession) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = session.encode()?;
        write_private(&self.path, encoded.as_bytes())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

fn keyring_entry() -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?)
}

/// Read the persisted session.
///
/// `STFIND_SESSION_TOKEN` wins over stored state; then the keyring, then
/// the session file.
pub fn load_session() -> Result<Option<PersistedSession>, ConfigError> {
    if let Ok(token) = std::env::var(SESSION_TOKEN_ENV) {
        if !token.is_empty() {
            debug!("using session token from environment");
            return Ok(Some(PersistedSession {
                token: SecretString::from(token),
                acquired_at: Utc::now(),
            }));
        }
    }

    match keyring_entry().and_then(|entry| Ok(entry.get_password()?)) {
        Ok(raw) => return PersistedSession::decode(&raw).map(Some),
        Err(ConfigError::Keyring(keyring::Error::NoEntry)) => {}
        Err(e) => debug!(error = %e, "keyring unavailable, trying session file"),
    }

    SessionFile::new(session_path()).load()
}

/// Persist `session` to the keyring, or the session file when the keyring
/// refuses.
pub fn save_session(session: &PersistedSession) -> Result<(), ConfigError> {
    let encoded = session.encode()?;
    match keyring_entry().and_then(|entry| Ok(entry.set_password(&encoded)?)) {
        Ok(()) => {
            debug!("session stored in keyring");
            // Drop any file left behind by a run without a keyring.
            SessionFile::new(session_path()).clear()
        }
        Err(e) => {
            warn!(error = %e, "keyring unavailable, storing session in file");
            SessionFile::new(session_path()).save(session)
        }
    }
}

/// Remove the persisted session from every backend.
pub fn clear_session() -> Result<(), ConfigError> {
    match keyring_entry().and_then(|entry| Ok(entry.delete_credential()?)) {
        Ok(()) | Err(ConfigError::Keyring(keyring::Error::NoEntry)) => {}
        Err(e) => debug!(error = %e, "keyring unavailable while clearing session"),
    }
    SessionFile::new(session_path()).clear()
}
