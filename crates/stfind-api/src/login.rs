// Account service QR login
//
// The account service has no public login API. The Find web app drives a
// QR-code handshake through a handful of pages; this module replays those
// steps with a dedicated cookie jar per attempt. Scheduling (poll interval,
// deadline, cancellation) is left to the caller.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderName;
use secrecy::SecretString;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{SESSION_COOKIE, preview};
use crate::endpoints::Endpoints;
use crate::error::Error;
use crate::models::{QrPollResponse, SignInXhr};
use crate::transport::TransportConfig;

static APPROVAL_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://signin\.samsung\.com/key/[^'"]+"#).expect("valid approval URI regex")
});

static LOCATION_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location\.href\s*=\s*['"]([^'"]+)['"]"#)
        .expect("valid redirect regex")
});

const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Result of one approval status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalStatus {
    /// Not yet approved on the companion device.
    Pending,
    /// Approved. `next_url` is exchanged for the session cookie.
    Approved { next_url: String },
}

/// Starts QR login attempts against the account service.
#[derive(Debug, Clone)]
pub struct LoginClient {
    transport: TransportConfig,
    endpoints: Endpoints,
}

impl LoginClient {
    pub fn new(endpoints: Endpoints, transport: TransportConfig) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Open a new login attempt and extract the approval URI.
    ///
    /// Each attempt gets a fresh cookie jar, so an abandoned attempt never
    /// leaks cookies into the next one.
    pub async fn start(&self) -> Result<PendingLogin, Error> {
        let transport = self.transport.clone().with_cookie_jar();
        let jar = transport
            .cookie_jar
            .clone()
            .unwrap_or_else(|| Arc::new(Jar::default()));
        let http = transport.build_client()?;

        let state = uuid::Uuid::new_v4().simple().to_string();
        let gate = self.endpoints.sign_in_gate(&state)?;
        get_page(&http, gate, "pre-login").await?;
        debug!("pre-login page loaded");

        let page = get_page(&http, self.endpoints.qr_sign_in()?, "QR sign-in").await?;
        let approval_uri = APPROVAL_URI
            .find(&page)
            .map(|m| m.as_str().to_owned())
            .ok_or_else(|| Error::AuthServiceUnavailable {
                message: "QR sign-in page did not contain an approval link".into(),
            })?;
        let key = approval_uri
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();

        info!(key = %key, "login challenge issued");

        Ok(PendingLogin {
            http,
            jar,
            endpoints: self.endpoints.clone(),
            approval_uri,
            key,
            csrf: None,
        })
    }
}

/// An in-flight QR login: the account-service cookie jar plus the approval
/// URI to present to the user.
pub struct PendingLogin {
    http: reqwest::Client,
    jar: Arc<Jar>,
    endpoints: Endpoints,
    approval_uri: String,
    key: String,
    csrf: Option<String>,
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("approval_uri", &self.approval_uri)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PendingLogin {
    /// The URI the user opens (or scans) on a signed-in device.
    pub fn approval_uri(&self) -> &str {
        &self.approval_uri
    }

    /// The trailing key of the approval URI, unique per attempt.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fetch the CSRF token the status endpoint requires. Idempotent.
    pub async fn prepare(&mut self) -> Result<(), Error> {
        if self.csrf.is_some() {
            return Ok(());
        }
        let body = get_page(&self.http, self.endpoints.sign_in_xhr()?, "sign-in XHR").await?;
        let xhr: SignInXhr = serde_json::from_str(&body).map_err(|e| Error::AuthServiceUnavailable {
            message: format!("sign-in XHR was not JSON: {e}"),
        })?;
        let token = xhr
            .csrf
            .and_then(|c| c.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::AuthServiceUnavailable {
                message: "sign-in XHR carried no CSRF token".into(),
            })?;
        self.csrf = Some(token);
        Ok(())
    }

    /// Ask the account service whether the challenge was approved.
    ///
    /// Non-2xx answers are logged and read as still pending; only transport
    /// failures are errors.
    pub async fn poll_status(&mut self) -> Result<ApprovalStatus, Error> {
        self.prepare().await?;
        let csrf = self.csrf.clone().unwrap_or_default();

        let resp = self
            .http
            .post(self.endpoints.qr_poll()?)
            .header(CSRF_HEADER, csrf)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| Error::AuthServiceUnavailable {
                message: format!("approval status request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "approval status check failed, still polling");
            return Ok(ApprovalStatus::Pending);
        }

        let body = resp.text().await.map_err(|e| Error::AuthServiceUnavailable {
            message: format!("approval status body unreadable: {e}"),
        })?;
        let parsed: QrPollResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "approval status was not JSON, still polling");
                return Ok(ApprovalStatus::Pending);
            }
        };

        match (parsed.return_code.as_deref(), parsed.next_url) {
            (Some("SUCCESS"), Some(next_url)) if !next_url.is_empty() => {
                info!("login approved");
                Ok(ApprovalStatus::Approved { next_url })
            }
            (Some("SUCCESS"), _) => Err(Error::AuthServiceUnavailable {
                message: "approval reported success without a next URL".into(),
            }),
            (code, _) => {
                debug!(code = code.unwrap_or("<none>"), "approval pending");
                Ok(ApprovalStatus::Pending)
            }
        }
    }

    /// Exchange an approved challenge for the Find session cookie.
    ///
    /// Follows `next_url`, extracts the script redirect to the Find service,
    /// follows that, and reads `JSESSIONID` off the Find host.
    pub async fn complete(self, next_url: &str) -> Result<SecretString, Error> {
        let landing = self
            .endpoints
            .sign_in_complete(next_url)
            .map_err(|e| Error::AuthServiceUnavailable {
                message: format!("approval returned an unusable next URL: {e}"),
            })?;
        let page = get_page(&self.http, landing, "sign-in completion").await?;

        let redirect = LOCATION_REDIRECT
            .captures(&page)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned())
            .ok_or_else(|| Error::AuthServiceUnavailable {
                message: "sign-in completion page had no redirect".into(),
            })?;
        let redirect = self
            .endpoints
            .find
            .join(&redirect)
            .map_err(|e| Error::AuthServiceUnavailable {
                message: format!("sign-in completion redirect is not a URL: {e}"),
            })?;
        debug!(host = redirect.host_str().unwrap_or_default(), "following login redirect");

        let resp = self
            .http
            .get(redirect)
            .send()
            .await
            .map_err(|e| Error::AuthServiceUnavailable {
                message: format!("login redirect failed: {e}"),
            })?;
        if !resp.status().is_success() {
            return Err(Error::AuthServiceUnavailable {
                message: format!("login redirect answered HTTP {}", resp.status()),
            });
        }

        let from_response = resp
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_owned());
        let token = from_response
            .or_else(|| cookie_from_jar(&self.jar, &self.endpoints.find))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::AuthServiceUnavailable {
                message: format!("login finished without a {SESSION_COOKIE} cookie"),
            })?;

        info!("session cookie obtained");
        Ok(SecretString::from(token))
    }
}

async fn get_page(http: &reqwest::Client, url: Url, step: &str) -> Result<String, Error> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::AuthServiceUnavailable {
            message: format!("{step} request failed: {e}"),
        })?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::AuthServiceUnavailable {
        message: format!("{step} body unreadable: {e}"),
    })?;
    if !status.is_success() {
        return Err(Error::AuthServiceUnavailable {
            message: format!("{step} answered HTTP {status}: {}", preview(&body)),
        });
    }
    Ok(body)
}

fn cookie_from_jar(jar: &Jar, url: &Url) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_owned())
    })
}
