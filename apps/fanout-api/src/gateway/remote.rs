//! Remote gateway client: `POST {endpoint}/@connections/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use super::{GatewayError, PushError, PushGateway};

/// Pushes payloads through a connection-management HTTP endpoint.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpGateway {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let endpoint = Url::parse(endpoint).map_err(|e| GatewayError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(GatewayError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "not a base url".to_string(),
            });
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    fn connection_url(&self, connection_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        // Checked in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("@connections").push(connection_id);
        }
        url
    }
}

#[async_trait]
impl PushGateway for HttpGateway {
    async fn send(&self, connection_id: &str, data: &[u8]) -> Result<(), PushError> {
        let resp = self
            .client
            .post(self.connection_url(connection_id))
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| PushError::transient(connection_id, e.to_string()))?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::GONE => Err(PushError::StaleTarget(connection_id.to_string())),
            s => Err(PushError::transient(connection_id, format!("status {s}"))),
        }
    }
}
