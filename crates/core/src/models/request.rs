//! Reward request record and its status lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Status of a reward request. `Pending` is the only state that may
/// transition; `Approved` and `Rejected` are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(Error::InvalidData(format!(
                "unknown request status: {other}"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's claim on a reward. One row is persisted per submit attempt and
/// kept indefinitely as the audit trail, rejected attempts included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRequest {
    pub id: i64,
    pub user_id: String,
    pub reward_id: i64,
    /// Owning event, stamped onto the row once the reward is resolved
    pub event_id: Option<i64>,
    pub status: RequestStatus,
    /// Set iff the request was rejected
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The request lifecycle as a tagged view over the flat record.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Pending,
    Approved {
        approved_at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
        rejected_at: DateTime<Utc>,
    },
}

/// A terminal transition applied to a pending request.
#[derive(Debug, Clone)]
pub enum Transition {
    Approve { at: DateTime<Utc> },
    Reject { reason: String, at: DateTime<Utc> },
}

impl RewardRequest {
    pub fn state(&self) -> RequestState {
        match self.status {
            RequestStatus::Pending => RequestState::Pending,
            RequestStatus::Approved => RequestState::Approved {
                approved_at: self.approved_at.unwrap_or(self.created_at),
            },
            RequestStatus::Rejected => RequestState::Rejected {
                reason: self.rejection_reason.clone().unwrap_or_default(),
                rejected_at: self.rejected_at.unwrap_or(self.created_at),
            },
        }
    }

    /// The single transition point: only a pending request may move, and it
    /// moves exactly once. The persistence layer enforces the same rule with
    /// conditional updates, so a lost race surfaces as `InvalidTransition`
    /// there as well.
    pub fn apply(&mut self, transition: Transition) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition {
                id: self.id,
                status: self.status.to_string(),
            });
        }
        match transition {
            Transition::Approve { at } => {
                self.status = RequestStatus::Approved;
                self.approved_at = Some(at);
            }
            Transition::Reject { reason, at } => {
                self.status = RequestStatus::Rejected;
                self.rejection_reason = Some(reason);
                self.rejected_at = Some(at);
            }
        }
        Ok(())
    }
}
