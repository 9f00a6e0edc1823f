//! Reward request executor
//!
//! Drives a claim from PENDING to a terminal state: record the attempt,
//! validate the admission rules, reserve a quota unit, deliver, then
//! approve. A failure after the reservation releases it before the request
//! is rejected. No lock is held across the delivery call.

use std::sync::Arc;

use chrono::Utc;
use prizebox_core::{Error, Principal, Result, RewardRequest};
use prizebox_delivery::DeliveryChannel;
use prizebox_persistence::sqlite::{self, ApproveOutcome, PendingInsert};
use prizebox_persistence::Database;
use tracing::{error, info, warn};

use crate::admission::{check_admissible, classify_open_request, Denial};
use crate::window::is_event_open;

/// Orchestrates claim processing against the store and the delivery channel
pub struct RequestEngine {
    db: Arc<Database>,
    delivery: Arc<dyn DeliveryChannel>,
}

impl RequestEngine {
    pub fn new(db: Arc<Database>, delivery: Arc<dyn DeliveryChannel>) -> Self {
        Self { db, delivery }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Submit a claim for `reward_id` on behalf of `user_id`.
    ///
    /// Business outcomes, approvals and rule rejections alike, come back as
    /// the persisted request in its terminal state; `Err` is reserved for
    /// infrastructure failures the caller may retry.
    pub async fn submit(&self, user_id: &str, reward_id: i64) -> Result<RewardRequest> {
        let pool = self.db.pool();

        // Record the attempt before any validation so every claim leaves
        // exactly one durable row, even if a later step dies.
        let request = match sqlite::insert_pending(pool, user_id, reward_id, Utc::now()).await? {
            PendingInsert::Created(request) => request,
            PendingInsert::DuplicateOpen => {
                // The open-request index fired: classify the existing row
                // for the reason and record this attempt as rejected.
                let denial = match sqlite::find_open_request(pool, user_id, reward_id).await? {
                    Some(open) => classify_open_request(&open),
                    // the open row closed in between; call it a pending dup
                    None => Denial::DuplicatePending,
                };
                info!(
                    "Claim by {} for reward {} refused: {}",
                    user_id, reward_id, denial
                );
                return sqlite::insert_rejected(
                    pool,
                    user_id,
                    reward_id,
                    None,
                    denial.reason(),
                    Utc::now(),
                )
                .await;
            }
        };

        match self.validate_and_grant(&request).await {
            Ok(terminal) => Ok(terminal),
            // storage failures stay retryable; masking them as a rejection
            // would turn an outage into a permanent denial
            Err(err) if err.is_retryable() => Err(err),
            Err(err) => {
                error!("Claim {} failed unexpectedly: {}", request.id, err);
                self.reject_with(&request, &err.to_string()).await
            }
        }
    }

    /// Validation and grant pipeline for a freshly recorded pending request.
    async fn validate_and_grant(&self, request: &RewardRequest) -> Result<RewardRequest> {
        let pool = self.db.pool();
        let user_id = request.user_id.as_str();

        let Some(reward) = sqlite::get_reward(pool, request.reward_id).await? else {
            return self.reject_with(request, Denial::RewardNotFound.reason()).await;
        };
        let Some(event) = sqlite::get_event(pool, reward.event_id).await? else {
            return self.reject_with(request, Denial::EventNotFound.reason()).await;
        };

        if !is_event_open(&event, Utc::now()) {
            return self.reject_with(request, Denial::EventNotActive.reason()).await;
        }

        // The same-reward dedup already held at insert time; the per-event
        // limit is checked here and again by the approval index below.
        let holds_grant = sqlite::has_grant_for_event(pool, user_id, event.id).await?;
        if let Some(denial) = check_admissible(None, holds_grant) {
            return self.reject_with(request, denial.reason()).await;
        }

        if !sqlite::try_reserve(pool, reward.id).await? {
            return self.reject_with(request, Denial::QuotaExhausted.reason()).await;
        }

        // A reservation is now held; every failure path below returns it.
        if let Err(err) = self.delivery.deliver(user_id, &reward).await {
            warn!("Delivery failed for claim {}: {}", request.id, err);
            self.release_reservation(reward.id).await;
            return self.reject_with(request, Denial::DeliveryFailed.reason()).await;
        }

        match sqlite::mark_approved(pool, request.id, event.id, Utc::now()).await? {
            ApproveOutcome::Approved(approved) => {
                info!(
                    "Claim {} approved: reward {} granted to user {}",
                    approved.id, reward.id, user_id
                );
                Ok(approved)
            }
            ApproveOutcome::EventSlotTaken => {
                // Lost the per-event race after delivery already ran. Grant
                // uniqueness holds; the stray delivery is logged.
                warn!(
                    "Claim {} lost the event {} slot after delivery; compensating",
                    request.id, event.id
                );
                self.release_reservation(reward.id).await;
                self.reject_with(request, Denial::EventLimitReached.reason())
                    .await
            }
            ApproveOutcome::NotPending => {
                // An operator closed the row mid-flight; honor that outcome.
                self.release_reservation(reward.id).await;
                sqlite::get_request(pool, request.id)
                    .await?
                    .ok_or(Error::RequestNotFound(request.id))
            }
        }
    }

    /// Manual approval of a pending request (review path). Runs the same
    /// reserve, deliver, approve tail as `submit`, with the same
    /// compensation on failure.
    pub async fn approve(&self, principal: &Principal, request_id: i64) -> Result<RewardRequest> {
        self.require_reviewer(principal)?;
        let pool = self.db.pool();

        let request = sqlite::get_request(pool, request_id)
            .await?
            .ok_or(Error::RequestNotFound(request_id))?;
        if request.status.is_terminal() {
            return Err(Error::InvalidTransition {
                id: request.id,
                status: request.status.to_string(),
            });
        }

        let reward = sqlite::get_reward(pool, request.reward_id)
            .await?
            .ok_or(Error::RewardNotFound(request.reward_id))?;

        if !sqlite::try_reserve(pool, reward.id).await? {
            return self
                .reject_with(&request, Denial::QuotaExhausted.reason())
                .await;
        }

        if let Err(err) = self.delivery.deliver(&request.user_id, &reward).await {
            warn!("Delivery failed for claim {}: {}", request.id, err);
            self.release_reservation(reward.id).await;
            return self
                .reject_with(&request, Denial::DeliveryFailed.reason())
                .await;
        }

        match sqlite::mark_approved(pool, request.id, reward.event_id, Utc::now()).await? {
            ApproveOutcome::Approved(approved) => {
                info!(
                    "Claim {} approved by {}: reward {} granted to user {}",
                    approved.id, principal.user_id, reward.id, request.user_id
                );
                Ok(approved)
            }
            ApproveOutcome::EventSlotTaken => {
                warn!(
                    "Claim {} lost the event {} slot after delivery; compensating",
                    request.id, reward.event_id
                );
                self.release_reservation(reward.id).await;
                self.reject_with(&request, Denial::EventLimitReached.reason())
                    .await
            }
            ApproveOutcome::NotPending => {
                self.release_reservation(reward.id).await;
                let current = sqlite::get_request(pool, request.id)
                    .await?
                    .ok_or(Error::RequestNotFound(request.id))?;
                Err(Error::InvalidTransition {
                    id: current.id,
                    status: current.status.to_string(),
                })
            }
        }
    }

    /// Manual rejection of a pending request (review path).
    pub async fn reject(
        &self,
        principal: &Principal,
        request_id: i64,
        reason: &str,
    ) -> Result<RewardRequest> {
        self.require_reviewer(principal)?;

        match sqlite::mark_rejected(self.db.pool(), request_id, reason, Utc::now()).await? {
            Some(rejected) => {
                info!(
                    "Claim {} rejected by {}: {}",
                    rejected.id, principal.user_id, reason
                );
                Ok(rejected)
            }
            None => {
                let current = sqlite::get_request(self.db.pool(), request_id)
                    .await?
                    .ok_or(Error::RequestNotFound(request_id))?;
                Err(Error::InvalidTransition {
                    id: current.id,
                    status: current.status.to_string(),
                })
            }
        }
    }

    /// Record a rejection on a pending row. If the row already went terminal
    /// (a concurrent reviewer, or our own earlier transition), the stored
    /// outcome is returned untouched.
    async fn reject_with(&self, request: &RewardRequest, reason: &str) -> Result<RewardRequest> {
        match sqlite::mark_rejected(self.db.pool(), request.id, reason, Utc::now()).await? {
            Some(rejected) => Ok(rejected),
            None => sqlite::get_request(self.db.pool(), request.id)
                .await?
                .ok_or(Error::RequestNotFound(request.id)),
        }
    }

    /// Best-effort compensation. A failed release leaves the counter high
    /// but never above the quota, so the central invariant survives.
    async fn release_reservation(&self, reward_id: i64) {
        match sqlite::release(self.db.pool(), reward_id).await {
            Ok(true) => {}
            Ok(false) => warn!("No reservation to release for reward {}", reward_id),
            Err(err) => error!(
                "Failed to release reservation for reward {}: {}",
                reward_id, err
            ),
        }
    }

    fn require_reviewer(&self, principal: &Principal) -> Result<()> {
        if !principal.role.can_review() {
            return Err(Error::Forbidden(format!(
                "role {} cannot review reward requests",
                principal.role
            )));
        }
        Ok(())
    }
}
