// ── QR login flow ──
//
// Drives the interactive login: open a challenge, wait (cancellably, with a
// deadline) for out-of-band approval, exchange it for a session and store
// it. Nothing is written to the session store unless the login succeeds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stfind_api::{ApprovalStatus, LoginClient, PendingLogin};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{AuthChallenge, AuthState, ChallengeInfo, Session};
use crate::session::SessionStore;

/// Login state machine.
///
/// `Idle -> ChallengePending -> Approved | Expired | Cancelled | Failed`.
/// Any terminal state may start over with [`begin_login`](Self::begin_login).
pub struct AuthFlow {
    login: LoginClient,
    sessions: Arc<SessionStore>,
    state: watch::Sender<AuthState>,
    challenge: watch::Sender<Option<ChallengeInfo>>,
    login_timeout: Duration,
    poll_interval: Duration,
}

impl AuthFlow {
    pub fn new(
        login: LoginClient,
        sessions: Arc<SessionStore>,
        login_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Idle);
        let (challenge, _) = watch::channel(None);
        Self {
            login,
            sessions,
            state,
            challenge,
            login_timeout,
            poll_interval,
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The challenge currently awaiting approval, for presenting its URI.
    pub fn pending_challenge(&self) -> watch::Receiver<Option<ChallengeInfo>> {
        self.challenge.subscribe()
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Open a new login challenge.
    pub async fn begin_login(&self) -> Result<AuthChallenge, CoreError> {
        let login = match self.login.start().await {
            Ok(login) => login,
            Err(e) => {
                warn!(error = %e, "could not open a login challenge");
                self.finish(AuthState::Failed);
                return Err(e.into());
            }
        };

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.login_timeout)
                .map_err(|e| CoreError::Config {
                    message: format!("login timeout out of range: {e}"),
                })?;
        let info = ChallengeInfo {
            challenge_id: login.key().to_owned(),
            approval_uri: login.approval_uri().to_owned(),
            expires_at,
        };

        self.challenge.send_replace(Some(info.clone()));
        self.state.send_replace(AuthState::ChallengePending);
        info!(challenge_id = %info.challenge_id, %expires_at, "waiting for login approval");

        Ok(AuthChallenge {
            info,
            deadline: tokio::time::Instant::now() + self.login_timeout,
            login,
        })
    }

    /// Wait for `challenge` to be approved and store the resulting session.
    ///
    /// Returns `ChallengeExpired` once the deadline passes and `Cancelled`
    /// when `cancel` fires. In both cases the session store is left as it
    /// was.
    pub async fn await_approval(
        &self,
        challenge: AuthChallenge,
        cancel: &CancellationToken,
    ) -> Result<Arc<Session>, CoreError> {
        let AuthChallenge {
            info,
            deadline,
            login,
        } = challenge;
        let exchange = approve_and_exchange(login, self.poll_interval);

        let token = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(challenge_id = %info.challenge_id, "login cancelled");
                self.finish(AuthState::Cancelled);
                return Err(CoreError::Cancelled);
            }
            () = tokio::time::sleep_until(deadline) => {
                info!(challenge_id = %info.challenge_id, "login challenge expired");
                self.finish(AuthState::Expired);
                return Err(CoreError::ChallengeExpired);
            }
            result = exchange => match result {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "login failed");
                    self.finish(AuthState::Failed);
                    return Err(e.into());
                }
            },
        };

        let session = self.sessions.set(Session::new(token));
        self.finish(AuthState::Approved);
        info!("login complete");
        Ok(session)
    }

    /// Run a full login: a fresh challenge, then wait for its approval.
    pub async fn reauthenticate(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Session>, CoreError> {
        let challenge = self.begin_login().await?;
        self.await_approval(challenge, cancel).await
    }

    fn finish(&self, state: AuthState) {
        self.challenge.send_replace(None);
        self.state.send_replace(state);
    }
}

/// Poll until approved, then trade the approval for the session cookie.
async fn approve_and_exchange(
    mut login: PendingLogin,
    interval: Duration,
) -> Result<secrecy::SecretString, stfind_api::Error> {
    login.prepare().await?;
    loop {
        tokio::time::sleep(interval).await;
        match login.poll_status().await? {
            ApprovalStatus::Pending => debug!("login not approved yet"),
            ApprovalStatus::Approved { next_url } => return login.complete(&next_url).await,
        }
    }
}
