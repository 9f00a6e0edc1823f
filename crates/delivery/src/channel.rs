//! Delivery channel trait and the local development channel

use async_trait::async_trait;
use prizebox_core::{Result, Reward};
use tracing::info;

/// External side effect that hands the reward to the user.
///
/// The engine treats any `Err` as a delivery failure: the quota reservation
/// is released and the request is rejected. Implementations must bound
/// themselves with a timeout; a call that hangs would hold a claim open
/// past its deadline.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, user_id: &str, reward: &Reward) -> Result<()>;
}

/// In-process channel that records the grant in the log and always
/// succeeds. Used by the CLI when no delivery endpoint is configured.
#[derive(Debug, Default)]
pub struct LocalDelivery;

#[async_trait]
impl DeliveryChannel for LocalDelivery {
    async fn deliver(&self, user_id: &str, reward: &Reward) -> Result<()> {
        info!("Delivered '{}' (reward {}) to user {}", reward.name, reward.id, user_id);
        Ok(())
    }
}
