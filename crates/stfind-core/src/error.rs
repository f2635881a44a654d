// ── Core error types ──
//
// User-facing errors from stfind-core. Consumers never see raw HTTP
// status codes or JSON failures; the `From<stfind_api::Error>` impl sorts
// wire errors into the auth / transient / permanent taxonomy.

use stfind_api::FailureClass;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Login service unavailable: {message}")]
    AuthServiceUnavailable { message: String },

    #[error("Login challenge expired before it was approved")]
    ChallengeExpired,

    #[error("Login cancelled")]
    Cancelled,

    #[error("Session invalid: {message}")]
    AuthInvalid { message: String },

    // ── Request failures ─────────────────────────────────────────────
    #[error("Temporary failure: {message}")]
    Transient {
        message: String,
        status: Option<u16>,
    },

    #[error("Request rejected: {message}")]
    PermanentRequest {
        message: String,
        status: Option<u16>,
    },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("{operation} is not supported by device {id}")]
    Unsupported { operation: String, id: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn no_session() -> Self {
        Self::AuthInvalid {
            message: "no valid session".into(),
        }
    }

    /// Returns `true` if the error means the user has to log in again.
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, Self::AuthInvalid { .. })
    }

    /// Returns `true` if the failure should clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<stfind_api::Error> for CoreError {
    fn from(err: stfind_api::Error) -> Self {
        let status = err.status();
        match err {
            stfind_api::Error::AuthServiceUnavailable { message } => {
                CoreError::AuthServiceUnavailable { message }
            }
            stfind_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            stfind_api::Error::Tls(message) => CoreError::Config { message },
            other => match other.class() {
                FailureClass::AuthInvalid => CoreError::AuthInvalid {
                    message: other.to_string(),
                },
                FailureClass::Transient => CoreError::Transient {
                    message: other.to_string(),
                    status,
                },
                FailureClass::Permanent => CoreError::PermanentRequest {
                    message: other.to_string(),
                    status,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_map_by_class() {
        let err: CoreError = stfind_api::Error::Server {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(matches!(
            err,
            CoreError::Transient {
                status: Some(502),
                ..
            }
        ));

        let err: CoreError = stfind_api::Error::Request {
            status: 400,
            message: "nope".into(),
        }
        .into();
        assert!(matches!(err, CoreError::PermanentRequest { .. }));

        let err: CoreError = stfind_api::Error::AuthInvalid {
            message: "Logout".into(),
        }
        .into();
        assert!(err.is_auth_invalid());
    }

    #[test]
    fn login_failures_stay_login_failures() {
        let err: CoreError = stfind_api::Error::AuthServiceUnavailable {
            message: "down".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthServiceUnavailable { .. }));
    }
}
