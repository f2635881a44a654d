use url::Url;

use crate::error::Error;

/// OAuth client id the Find web app uses with the account service.
pub const CLIENT_ID: &str = "ntly6zvfpn";

pub const DEFAULT_ACCOUNT_URL: &str = "https://account.samsung.com";
pub const DEFAULT_FIND_URL: &str = "https://smartthingsfind.samsung.com";

/// Base URLs of the two remote services.
///
/// Paths are fixed; only the hosts vary, which lets tests point both
/// services at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Samsung account service (QR login).
    pub account: Url,
    /// SmartThings Find service (devices, operations).
    pub find: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            account: Url::parse(DEFAULT_ACCOUNT_URL).expect("static account URL"),
            find: Url::parse(DEFAULT_FIND_URL).expect("static find URL"),
        }
    }
}

impl Endpoints {
    pub fn new(account: Url, find: Url) -> Self {
        Self { account, find }
    }

    /// Same host for both services. Used by tests.
    pub fn single(base: &Url) -> Self {
        Self {
            account: base.clone(),
            find: base.clone(),
        }
    }

    // ── Account service ─────────────────────────────────────────────

    /// Pre-login gate. Sets the initial account cookies for `state`.
    pub fn sign_in_gate(&self, state: &str) -> Result<Url, Error> {
        let mut url = join(&self.account, "/accounts/v1/FMM2/signInGate")?;
        let redirect = join(&self.find, "/login.do")?;
        let go_back = join(&self.find, "/login")?;
        url.query_pairs_mut()
            .append_pair("state", state)
            .append_pair("redirect_uri", redirect.as_str())
            .append_pair("response_type", "code")
            .append_pair("client_id", CLIENT_ID)
            .append_pair("scope", "iot.client")
            .append_pair("locale", "en_US")
            .append_pair("acr_values", "urn:samsungaccount:acr:basic")
            .append_pair("goBackURL", go_back.as_str());
        Ok(url)
    }

    /// "Sign in with QR code" page embedding the approval link.
    pub fn qr_sign_in(&self) -> Result<Url, Error> {
        join(&self.account, "/accounts/v1/FMM2/signInWithQrCode")
    }

    /// XHR bootstrap returning the CSRF token for approval polling.
    pub fn sign_in_xhr(&self) -> Result<Url, Error> {
        join(&self.account, "/accounts/v1/FMM2/signInXhr")
    }

    /// Approval status endpoint.
    pub fn qr_poll(&self) -> Result<Url, Error> {
        join(&self.account, "/accounts/v1/FMM2/signInWithQrCodeProc")
    }

    /// Resolve the `nextURL` handed out on approval (path-relative).
    pub fn sign_in_complete(&self, next_url: &str) -> Result<Url, Error> {
        join(&self.account, next_url)
    }

    // ── Find service ────────────────────────────────────────────────

    pub fn check_login(&self) -> Result<Url, Error> {
        join(&self.find, "/chkLogin.do")
    }

    pub fn device_list(&self, csrf: &str) -> Result<Url, Error> {
        with_csrf(join(&self.find, "/device/getDeviceList.do")?, csrf)
    }

    pub fn add_operation(&self, csrf: &str) -> Result<Url, Error> {
        with_csrf(join(&self.find, "/dm/addOperation.do")?, csrf)
    }

    pub fn set_last_select(&self, csrf: &str) -> Result<Url, Error> {
        with_csrf(join(&self.find, "/device/setLastSelect.do")?, csrf)
    }
}

fn join(base: &Url, path: &str) -> Result<Url, Error> {
    base.join(path).map_err(Error::InvalidUrl)
}

fn with_csrf(mut url: Url, csrf: &str) -> Result<Url, Error> {
    url.query_pairs_mut().append_pair("_csrf", csrf);
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn gate_url_carries_state_and_client() {
        let endpoints = Endpoints::default();
        let url = endpoints.sign_in_gate("abc123").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("state".into(), "abc123".into())));
        assert!(pairs.contains(&("client_id".into(), CLIENT_ID.into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://smartthingsfind.samsung.com/login.do".into()
        )));
    }

    #[test]
    fn find_urls_append_csrf() {
        let endpoints = Endpoints::default();
        let url = endpoints.device_list("tok").unwrap();
        assert_eq!(url.path(), "/device/getDeviceList.do");
        assert_eq!(url.query(), Some("_csrf=tok"));
    }

    #[test]
    fn next_url_resolves_against_account_host() {
        let endpoints = Endpoints::default();
        let url = endpoints
            .sign_in_complete("/accounts/v1/FMM2/signInComplete")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://account.samsung.com/accounts/v1/FMM2/signInComplete"
        );
    }
}
