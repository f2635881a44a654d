// Device listing and device state endpoints for FindClient

use secrecy::SecretString;
use serde_json::json;
use tracing::debug;

use crate::client::{FindClient, NotFound};
use crate::error::Error;
use crate::models::{DeviceListResponse, DeviceOperations, FindDevice};

impl FindClient {
    /// List every device registered to the account.
    ///
    /// `POST /device/getDeviceList.do`. The service answers 404 here once
    /// the session is no longer accepted.
    pub async fn list_devices(&self, session: &SecretString) -> Result<Vec<FindDevice>, Error> {
        let csrf = self.csrf_for(session).await?;
        let url = self.endpoints().device_list(&csrf)?;
        let resp: DeviceListResponse = self
            .post_json(url, session, &json!({}), NotFound::MeansLoggedOut)
            .await?;
        debug!(count = resp.device_list.len(), "device list received");
        Ok(resp.device_list)
    }

    /// Latest operations (location, battery) recorded for one device.
    ///
    /// `POST /device/setLastSelect.do`.
    pub async fn device_operations(
        &self,
        session: &SecretString,
        device_id: &str,
    ) -> Result<DeviceOperations, Error> {
        let csrf = self.csrf_for(session).await?;
        let url = self.endpoints().set_last_select(&csrf)?;
        let body = json!({
            "dvceId": device_id,
            "removeDevice": [],
        });
        let ops: DeviceOperations = self.post_json(url, session, &body, NotFound::Plain).await?;
        debug!(device_id, operations = ops.operation.len(), "device state received");
        Ok(ops)
    }
}
