//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use stfind_config::PersistedSession;
use stfind_core::{PollOutcome, PollSummary, Session, Tracker};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::Context;
use crate::error::CliError;
use crate::output;

/// Install the persisted session into `tracker`.
pub fn restore_session(tracker: &Tracker) -> Result<(), CliError> {
    let Some(stored) = stfind_config::load_session()? else {
        return Err(CliError::NotLoggedIn);
    };
    tracker.restore_session(stored.token, stored.acquired_at);
    Ok(())
}

/// Persist `session` for later runs.
pub fn persist_session(session: &Session) -> Result<(), CliError> {
    stfind_config::save_session(&PersistedSession::from(session))?;
    Ok(())
}

/// Drop a persisted session the service has rejected.
pub fn forget_session() {
    if let Err(e) = stfind_config::clear_session() {
        warn!(error = %e, "could not remove the stored session");
    }
}

/// Run a QR login, showing the approval link and a spinner until the user
/// approves it, the challenge expires, or Ctrl-C cancels it.
pub async fn interactive_login(
    tracker: &Tracker,
    ctx: &Context,
) -> Result<Arc<Session>, CliError> {
    let auth = tracker.auth();
    let challenge = auth.begin_login().await?;

    eprintln!("Approve this login on a phone signed in to your Samsung account:\n");
    eprintln!("  {}\n", challenge.approval_uri());

    let spinner = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Waiting for approval, expires at {}",
        challenge.expires_at().format("%H:%M:%S UTC")
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = auth.await_approval(challenge, &cancel).await;
    ctrl_c.abort();
    spinner.finish_and_clear();

    let session = result?;
    if !ctx.quiet {
        eprintln!("{}", output::ok_text("Logged in.", ctx.color));
    }
    Ok(session)
}

/// Wait before retrying a login after the auth service failed.
const LOGIN_RETRY_BACKOFF: Duration = Duration::from_secs(15);

/// How long to wait before starting a fresh login after `err`, or `None`
/// if the failure ends the login.
pub fn login_retry_delay(err: &CliError) -> Option<Duration> {
    match err {
        CliError::LoginExpired => Some(Duration::ZERO),
        CliError::AuthServiceUnavailable { .. } => Some(LOGIN_RETRY_BACKOFF),
        _ => None,
    }
}

/// Keep issuing login challenges until one is approved. Expired challenges
/// and auth service outages start a new challenge; Ctrl-C or any other
/// failure ends the loop.
pub async fn login_until_approved(
    tracker: &Tracker,
    ctx: &Context,
) -> Result<Arc<Session>, CliError> {
    loop {
        let err = match interactive_login(tracker, ctx).await {
            Ok(session) => return Ok(session),
            Err(e) => e,
        };
        let Some(delay) = login_retry_delay(&err) else {
            return Err(err);
        };

        if delay.is_zero() {
            eprintln!(
                "{}",
                output::warn_text("Login challenge expired, requesting a new one.", ctx.color)
            );
            continue;
        }
        warn!(error = %err, retry_in_secs = delay.as_secs(), "login failed, retrying");
        eprintln!(
            "{}",
            output::warn_text(
                &format!("{err}. Retrying in {}.", humantime::format_duration(delay)),
                ctx.color
            )
        );
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Err(CliError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Run one poll cycle for a one-shot command.
pub async fn poll(tracker: &Tracker) -> Result<PollSummary, CliError> {
    match tracker.poll_once().await {
        Ok(PollOutcome::Completed(summary)) => Ok(summary),
        Ok(PollOutcome::Skipped) => Err(CliError::Internal(
            "a poll cycle was already running".into(),
        )),
        Err(e) => {
            if e.is_auth_invalid() {
                forget_session();
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn expired_challenge_retries_at_once() {
        assert_eq!(
            login_retry_delay(&CliError::LoginExpired),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn auth_outage_retries_after_backoff() {
        let err = CliError::AuthServiceUnavailable {
            message: "HTTP 503".into(),
        };
        assert_eq!(login_retry_delay(&err), Some(LOGIN_RETRY_BACKOFF));
    }

    #[test]
    fn cancellation_and_other_failures_end_the_login() {
        assert_eq!(login_retry_delay(&CliError::Cancelled), None);
        assert_eq!(login_retry_delay(&CliError::NotLoggedIn), None);
        assert_eq!(
            login_retry_delay(&CliError::SessionExpired {
                message: "rejected".into()
            }),
            None
        );
    }
}
