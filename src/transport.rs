//! Sync transport
//!
//! Delivers a `SyncPayload` to the remote endpoint. Classification is by
//! variant only: any 2xx is a receipt, any other status is
//! `SyncError::Rejected`, and a request that got no response at all is
//! `SyncError::Transport`. No retries happen here.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::types::SyncPayload;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Successful delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReceipt {
    pub status: u16,
    pub request_id: Uuid,
    pub body: String,
}

/// Anything that can deliver a payload
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn send(&self, payload: &SyncPayload) -> Result<SyncReceipt, SyncError>;
}

/// HTTP transport posting JSON with a bearer credential
///
/// The client and any pooled connections are released when this is dropped.
pub struct HttpSyncTransport {
    client: Client,
    endpoint: Url,
    credential: SecretString,
}

impl HttpSyncTransport {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("vitalsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            credential: config.credential.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn send(&self, payload: &SyncPayload) -> Result<SyncReceipt, SyncError> {
        let body = serde_json::to_vec(payload)?;
        let request_id = Uuid::new_v4();

        debug!(%request_id, endpoint = %self.endpoint, bytes = body.len(), "sending sync payload");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(
                "Authorization",
                format!("Bearer {}", self.credential.expose_secret()),
            )
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(%request_id, error = %e, "sync request failed without a response");
                SyncError::Transport(e.to_string())
            })?;

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(%request_id, status = status.as_u16(), error = %e, "failed to read sync response body");
                String::new()
            }
        };

        if !status.is_success() {
            error!(%request_id, status = status.as_u16(), "sync rejected by endpoint");
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        info!(%request_id, status = status.as_u16(), "sync delivered");
        Ok(SyncReceipt {
            status: status.as_u16(),
            request_id,
            body: text,
        })
    }
}
