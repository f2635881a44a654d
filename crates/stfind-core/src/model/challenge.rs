// ── Login challenge types ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use stfind_api::PendingLogin;

/// State of the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthState {
    Idle,
    ChallengePending,
    Approved,
    Expired,
    Cancelled,
    /// The account service failed while a challenge was pending.
    Failed,
}

impl AuthState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::ChallengePending)
    }
}

/// What a user needs to approve a login: the URI to open or scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeInfo {
    pub challenge_id: String,
    pub approval_uri: String,
    pub expires_at: DateTime<Utc>,
}

/// A single login attempt. Consumed by `AuthFlow::await_approval`; never
/// persisted.
#[derive(Debug)]
pub struct AuthChallenge {
    pub(crate) info: ChallengeInfo,
    pub(crate) deadline: tokio::time::Instant,
    pub(crate) login: PendingLogin,
}

impl AuthChallenge {
    pub fn challenge_id(&self) -> &str {
        &self.info.challenge_id
    }

    pub fn approval_uri(&self) -> &str {
        &self.info.approval_uri
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.info.expires_at
    }

    pub fn info(&self) -> &ChallengeInfo {
        &self.info
    }
}
