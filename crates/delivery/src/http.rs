//! HTTP delivery client
//!
//! Posts grants to an external fulfillment endpoint as JSON. Every call is
//! bounded by the client-wide timeout; a timeout is reported as a delivery
//! failure so the engine can compensate the reservation.

use async_trait::async_trait;
use prizebox_core::{Error, Result, Reward};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::channel::DeliveryChannel;

/// Default bound on a single delivery call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliverBody<'a> {
    user_id: &'a str,
    reward_id: i64,
    reward_name: &'a str,
}

/// HTTP client for an external reward fulfillment service
pub struct HttpDeliveryClient {
    http: Client,
    endpoint: String,
}

impl HttpDeliveryClient {
    /// Create a client posting to `{endpoint}/deliver` with the default
    /// timeout
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::DeliveryError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DeliveryChannel for HttpDeliveryClient {
    #[instrument(skip(self, reward), fields(reward_id = reward.id))]
    async fn deliver(&self, user_id: &str, reward: &Reward) -> Result<()> {
        let url = format!("{}/deliver", self.endpoint);
        debug!("Posting delivery to {}", url);

        let body = DeliverBody {
            user_id,
            reward_id: reward.id,
            reward_name: &reward.name,
        };

        // reqwest maps a client timeout into Err; From<reqwest::Error>
        // turns both into Error::DeliveryError
        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Delivery endpoint returned {}", status);
            return Err(Error::DeliveryError(format!(
                "delivery endpoint returned {status}"
            )));
        }

        debug!("Delivery accepted for user {}", user_id);
        Ok(())
    }
}
