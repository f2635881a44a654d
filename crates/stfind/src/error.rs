//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use stfind_config::ConfigError;
use stfind_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Not logged in")]
    #[diagnostic(
        code(stfind::not_logged_in),
        help("Run: stfind login\nOr set STFIND_SESSION_TOKEN to an existing JSESSIONID.")
    )]
    NotLoggedIn,

    #[error("Session expired: {message}")]
    #[diagnostic(code(stfind::session_expired), help("Run: stfind login"))]
    SessionExpired { message: String },

    #[error("Login service unavailable: {message}")]
    #[diagnostic(
        code(stfind::auth_service_unavailable),
        help("The Samsung account service did not answer as expected. Try again later.")
    )]
    AuthServiceUnavailable { message: String },

    #[error("Login was not approved in time")]
    #[diagnostic(
        code(stfind::login_expired),
        help(
            "Open the link on a phone signed in to your Samsung account and approve it\n\
             before it expires. Raise login_timeout_secs for more time."
        )
    )]
    LoginExpired,

    #[error("Cancelled")]
    #[diagnostic(code(stfind::cancelled))]
    Cancelled,

    // ── Requests ─────────────────────────────────────────────────────
    #[error("SmartThings Find is unavailable: {message}")]
    #[diagnostic(
        code(stfind::service_unavailable),
        help("The failure looks temporary. Try again shortly.")
    )]
    ServiceUnavailable { message: String },

    #[error("Request rejected: {message}")]
    #[diagnostic(code(stfind::rejected))]
    Rejected { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{id}' not found")]
    #[diagnostic(
        code(stfind::not_found),
        help("Run: stfind devices list to see available devices")
    )]
    NotFound { id: String },

    #[error("Device '{id}' does not support {operation}")]
    #[diagnostic(code(stfind::unsupported))]
    Unsupported { operation: String, id: String },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(stfind::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(stfind::config),
        help("Check the config file (stfind config path) and STFIND_* variables.")
    )]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    #[diagnostic(code(stfind::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotLoggedIn
            | Self::SessionExpired { .. }
            | Self::AuthServiceUnavailable { .. } => exit_code::AUTH,
            Self::LoginExpired => exit_code::TIMEOUT,
            Self::Cancelled => exit_code::INTERRUPTED,
            Self::ServiceUnavailable { .. } => exit_code::CONNECTION,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Internal(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthServiceUnavailable { message } => {
                CliError::AuthServiceUnavailable { message }
            }
            CoreError::ChallengeExpired => CliError::LoginExpired,
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::AuthInvalid { message } => CliError::SessionExpired { message },
            CoreError::Transient { message, .. } => CliError::ServiceUnavailable { message },
            CoreError::PermanentRequest { message, .. } => CliError::Rejected { message },
            CoreError::DeviceNotFound { id } => CliError::NotFound { id },
            CoreError::Unsupported { operation, id } => CliError::Unsupported { operation, id },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
