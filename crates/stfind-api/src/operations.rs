// Remote device operations for FindClient
//
// Both commands go through `addOperation.do`. The service acknowledges the
// request; whether the device acts on it depends on a nearby relay device.

use secrecy::SecretString;
use serde_json::json;
use tracing::{debug, info};

use crate::client::{FindClient, NotFound};
use crate::error::Error;

/// Message shown on the device while it rings.
pub const RING_MESSAGE: &str = "stfind is ringing your device!";

impl FindClient {
    /// Ask the service to ring a device.
    ///
    /// `user_id` is the owner id from the device listing; the service accepts
    /// the request without it for the account's own devices.
    pub async fn ring(
        &self,
        session: &SecretString,
        device_id: &str,
        user_id: Option<&str>,
    ) -> Result<(), Error> {
        let mut body = json!({
            "dvceId": device_id,
            "operation": "RING",
            "status": "start",
            "lockMessage": RING_MESSAGE,
        });
        if let Some(user_id) = user_id {
            body["usrId"] = json!(user_id);
        }
        self.add_operation(session, &body).await?;
        info!(device_id, "ring request accepted");
        Ok(())
    }

    /// Ask the service to locate a device now (active mode).
    pub async fn request_location_update(
        &self,
        session: &SecretString,
        device_id: &str,
        user_id: Option<&str>,
    ) -> Result<(), Error> {
        let mut body = json!({
            "dvceId": device_id,
            "operation": "CHECK_CONNECTION_WITH_LOCATION",
        });
        if let Some(user_id) = user_id {
            body["usrId"] = json!(user_id);
        }
        self.add_operation(session, &body).await?;
        debug!(device_id, "location update requested");
        Ok(())
    }

    async fn add_operation(
        &self,
        session: &SecretString,
        body: &serde_json::Value,
    ) -> Result<(), Error> {
        let csrf = self.csrf_for(session).await?;
        let url = self.endpoints().add_operation(&csrf)?;
        self.post_authenticated(url, session, body, NotFound::Plain)
            .await
            .map(|_| ())
    }
}
