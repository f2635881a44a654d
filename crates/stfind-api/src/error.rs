use thiserror::Error;

/// How a failure should be handled by the caller.
///
/// Every error produced by this crate maps onto exactly one class, so
/// callers never have to inspect status codes or bodies themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The session was rejected. Re-authentication is required.
    AuthInvalid,
    /// Network trouble, timeout or a 5xx. Retry later.
    Transient,
    /// The request itself was refused. Retrying will not help.
    Permanent,
}

/// Top-level error type for the `stfind-api` crate.
///
/// Covers every failure mode across both remote services: the account
/// service driving the QR login and the Find service serving devices.
/// `stfind-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The Find service rejected the session (401, `Logout` body, no CSRF).
    #[error("Session rejected: {message}")]
    AuthInvalid { message: String },

    /// The account service could not start or complete a login.
    #[error("Login service unavailable: {message}")]
    AuthServiceUnavailable { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP status ─────────────────────────────────────────────────
    /// The service answered with a 5xx.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The service refused the request with a non-auth 4xx.
    #[error("Request rejected (HTTP {status}): {message}")]
    Request { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A response had an unexpected shape (missing header, missing link).
    #[error("Unexpected response: {message}")]
    Protocol { message: String },
}

impl Error {
    /// Classify this error for retry and re-authentication decisions.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::AuthInvalid { .. } => FailureClass::AuthInvalid,
            Self::Transport(_) | Self::Server { .. } | Self::AuthServiceUnavailable { .. } => {
                FailureClass::Transient
            }
            Self::InvalidUrl(_)
            | Self::Tls(_)
            | Self::Request { .. }
            | Self::Deserialization { .. }
            | Self::Protocol { .. } => FailureClass::Permanent,
        }
    }

    /// Returns `true` if the session was rejected.
    pub fn is_auth_invalid(&self) -> bool {
        self.class() == FailureClass::AuthInvalid
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// HTTP status code, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Request { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
