use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// The authenticated credential for the Find service.
///
/// The token is the `JSESSIONID` cookie value. It is wrapped in
/// `SecretString`, so `Debug` output redacts it.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SecretString,
    pub acquired_at: DateTime<Utc>,
    pub valid: bool,
}

impl Session {
    /// A fresh, valid session acquired now.
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            acquired_at: Utc::now(),
            valid: true,
        }
    }

    /// A session restored from persisted state. Validity is assumed until
    /// the service says otherwise.
    pub fn restored(token: SecretString, acquired_at: DateTime<Utc>) -> Self {
        Self {
            token,
            acquired_at,
            valid: true,
        }
    }

    pub(crate) fn invalidated(&self) -> Self {
        Self {
            valid: false,
            ..self.clone()
        }
    }
}
