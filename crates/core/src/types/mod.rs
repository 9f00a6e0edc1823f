//! Shared type definitions

use serde::{Deserialize, Serialize};

use crate::models::RequestStatus;

/// Composable filter for listing reward requests. Empty filter lists all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub event_id: Option<i64>,
    pub user_id: Option<String>,
}

impl RequestFilter {
    pub fn by_user(user_id: impl Into<String>) -> Self {
        RequestFilter {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn by_event(event_id: i64) -> Self {
        RequestFilter {
            event_id: Some(event_id),
            ..Default::default()
        }
    }

    pub fn by_status(status: RequestStatus) -> Self {
        RequestFilter {
            status: Some(status),
            ..Default::default()
        }
    }

    /// True when no criterion is set, i.e. the unscoped listing
    pub fn is_unscoped(&self) -> bool {
        self.status.is_none() && self.event_id.is_none() && self.user_id.is_none()
    }
}
