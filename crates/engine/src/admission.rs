//! Admission rules for reward claims
//!
//! Pure classification over already-fetched state. The racy variants of
//! these checks are backed by unique indexes in the persistence layer; this
//! module only decides which reason a turned-away claim gets.

use prizebox_core::{RequestStatus, RewardRequest};

/// Why a claim was turned away. `reason()` is the exact text recorded on
/// the rejected request row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    RewardNotFound,
    EventNotFound,
    EventNotActive,
    DuplicatePending,
    AlreadyGranted,
    EventLimitReached,
    QuotaExhausted,
    DeliveryFailed,
}

impl Denial {
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::RewardNotFound => "reward not found",
            Denial::EventNotFound => "event not found",
            Denial::EventNotActive => "event not active",
            Denial::DuplicatePending => "duplicate pending request",
            Denial::AlreadyGranted => "reward already granted",
            Denial::EventLimitReached => "one reward per event already granted",
            Denial::QuotaExhausted => "quota exhausted",
            Denial::DeliveryFailed => "delivery failed",
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Classify an existing open request for the same (user, reward): an
/// in-flight duplicate and an already granted reward get different reasons,
/// checked in that order.
pub fn classify_open_request(open: &RewardRequest) -> Denial {
    match open.status {
        RequestStatus::Approved => Denial::AlreadyGranted,
        _ => Denial::DuplicatePending,
    }
}

/// Dedup rules over fetched state, first failure wins: an open request for
/// the same reward, then the one-grant-per-event limit.
pub fn check_admissible(
    open_request: Option<&RewardRequest>,
    holds_event_grant: bool,
) -> Option<Denial> {
    if let Some(open) = open_request {
        return Some(classify_open_request(open));
    }
    if holds_event_grant {
        return Some(Denial::EventLimitReached);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(status: RequestStatus) -> RewardRequest {
        RewardRequest {
            id: 1,
            user_id: "u-1".into(),
            reward_id: 7,
            event_id: Some(3),
            status,
            rejection_reason: None,
            approved_at: None,
            rejected_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_duplicate_beats_event_limit() {
        let open = request(RequestStatus::Pending);
        assert_eq!(
            check_admissible(Some(&open), true),
            Some(Denial::DuplicatePending)
        );
    }

    #[test]
    fn approved_duplicate_has_its_own_reason() {
        let open = request(RequestStatus::Approved);
        assert_eq!(
            check_admissible(Some(&open), false),
            Some(Denial::AlreadyGranted)
        );
    }

    #[test]
    fn sibling_grant_hits_event_limit() {
        assert_eq!(check_admissible(None, true), Some(Denial::EventLimitReached));
    }

    #[test]
    fn clean_state_is_admissible() {
        assert_eq!(check_admissible(None, false), None);
    }
}
