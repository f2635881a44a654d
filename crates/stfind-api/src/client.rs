// Find service HTTP client
//
// Wraps `reqwest::Client` with session-cookie injection, per-session CSRF
// handling and response classification. Endpoint modules (devices,
// operations) are implemented as inherent methods in separate files to keep
// this module focused on transport mechanics.

use std::sync::{PoisonError, RwLock};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::endpoints::Endpoints;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Name of the session cookie issued by the Find service.
pub const SESSION_COOKIE: &str = "JSESSIONID";

/// CSRF token bound to the session it was issued for.
struct CsrfEntry {
    session: SecretString,
    token: String,
}

/// How a 404 from an endpoint should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotFound {
    /// The service answers 404 on this endpoint once the session is gone.
    MeansLoggedOut,
    Plain,
}

/// Raw HTTP client for the SmartThings Find service.
///
/// Holds no session of its own: every call takes the session token it
/// should authenticate with. The CSRF token the service requires is fetched
/// lazily per session and dropped whenever the service rejects it.
pub struct FindClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    csrf: RwLock<Option<CsrfEntry>>,
}

impl FindClient {
    /// Create a client from a `TransportConfig`. The session cookie is sent
    /// explicitly, so no cookie jar is attached.
    pub fn new(endpoints: Endpoints, transport: &TransportConfig) -> Result<Self, Error> {
        let config = TransportConfig {
            cookie_jar: None,
            ..transport.clone()
        };
        Ok(Self::with_client(config.build_client()?, endpoints))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            csrf: RwLock::new(None),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ── Session check / CSRF ─────────────────────────────────────────

    /// Verify the session and obtain a fresh CSRF token.
    ///
    /// `GET /chkLogin.do` answers 200 with a `_csrf` header for a live
    /// session. Anything else means the session is gone.
    pub async fn check_login(&self, session: &SecretString) -> Result<String, Error> {
        let url = self.endpoints.check_login()?;
        debug!("checking session at {}", url);

        let resp = self
            .http
            .get(url)
            .header(COOKIE, session_cookie(session))
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(Error::Server {
                status: status.as_u16(),
                message: preview(&resp.text().await.unwrap_or_default()),
            });
        }

        let token = resp
            .headers()
            .get("_csrf")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        match token {
            Some(token) if status.is_success() => {
                debug!("obtained CSRF token");
                self.store_csrf(session, token.clone());
                Ok(token)
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::AuthInvalid {
                    message: format!("session check failed (HTTP {status}): {}", preview(&body)),
                })
            }
        }
    }

    /// CSRF token for `session`, fetched on first use.
    pub(crate) async fn csrf_for(&self, session: &SecretString) -> Result<String, Error> {
        {
            let guard = self.csrf.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = guard.as_ref() {
                if entry.session.expose_secret() == session.expose_secret() {
                    return Ok(entry.token.clone());
                }
            }
        }
        self.check_login(session).await
    }

    fn store_csrf(&self, session: &SecretString, token: String) {
        *self.csrf.write().unwrap_or_else(PoisonError::into_inner) = Some(CsrfEntry {
            session: session.clone(),
            token,
        });
    }

    /// Forget the cached CSRF token so the next call fetches a new one.
    pub fn clear_csrf(&self) {
        trace!("dropping cached CSRF token");
        *self.csrf.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// POST a JSON body with the session cookie and return the raw body.
    ///
    /// Every authenticated call goes through here, so classification of
    /// auth rejections happens in exactly one place.
    pub(crate) async fn post_authenticated(
        &self,
        url: Url,
        session: &SecretString,
        body: &serde_json::Value,
        not_found: NotFound,
    ) -> Result<String, Error> {
        debug!("POST {}", url.path());

        let resp = self
            .http
            .post(url)
            .header(COOKIE, session_cookie(session))
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        self.classify(resp, not_found).await
    }

    /// POST and decode the JSON body.
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        session: &SecretString,
        body: &serde_json::Value,
        not_found: NotFound,
    ) -> Result<T, Error> {
        let text = self.post_authenticated(url, session, body, not_found).await?;
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&text)),
            body: text,
        })
    }

    /// Map a response onto the error taxonomy, returning the body on success.
    async fn classify(
        &self,
        resp: reqwest::Response,
        not_found: NotFound,
    ) -> Result<String, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            self.clear_csrf();
            return Err(Error::AuthInvalid {
                message: "session expired (HTTP 401)".into(),
            });
        }

        if status == StatusCode::NOT_FOUND && not_found == NotFound::MeansLoggedOut {
            self.clear_csrf();
            return Err(Error::AuthInvalid {
                message: "endpoint answered 404, session no longer accepted".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        // The service answers a bare `Logout` once the session is gone.
        if body.trim() == "Logout" {
            self.clear_csrf();
            return Err(Error::AuthInvalid {
                message: format!("service logged the session out (HTTP {status})"),
            });
        }

        if status.is_server_error() {
            return Err(Error::Server {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        if !status.is_success() {
            if status == StatusCode::FORBIDDEN {
                // Usually a stale CSRF token; fetch a new one next time.
                self.clear_csrf();
            }
            return Err(Error::Request {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        Ok(body)
    }
}

fn session_cookie(session: &SecretString) -> String {
    format!("{SESSION_COOKIE}={}", session.expose_secret())
}

/// First 200 characters of a body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> FindClient {
        let base = Url::parse("http://127.0.0.1:1/").unwrap();
        FindClient::with_client(reqwest::Client::new(), Endpoints::single(&base))
    }

    #[tokio::test]
    async fn csrf_cache_survives_a_poisoned_lock() {
        let client = client();
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = client.csrf.write().unwrap();
                    panic!("poison the CSRF lock");
                })
                .join();
        });
        assert!(client.csrf.is_poisoned());

        let session = SecretString::from("abc");
        client.store_csrf(&session, "token-1".into());
        assert_eq!(client.csrf_for(&session).await.unwrap(), "token-1");

        client.clear_csrf();
        assert!(client.csrf.read().unwrap_or_else(PoisonError::into_inner).is_none());
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(preview(&body).len(), 200);
    }
}
