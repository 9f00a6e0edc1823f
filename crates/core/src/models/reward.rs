//! Reward model - a finite-quantity grant attached to an event

use serde::{Deserialize, Serialize};

/// A claimable reward with a finite quota.
///
/// Invariant: `claimed_count <= total_quota` at all times, including under
/// concurrent claims. The quota ledger in the persistence crate is the only
/// writer of `claimed_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Owning event (many rewards per event)
    pub event_id: i64,
    pub total_quota: i64,
    pub claimed_count: i64,
}

impl Reward {
    pub fn remaining(&self) -> i64 {
        (self.total_quota - self.claimed_count).max(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.claimed_count >= self.total_quota
    }
}
