//! Event model - a time-boxed campaign that owns rewards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-boxed event. Rewards belong to exactly one event and can only be
/// claimed while the event window is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Operator toggle, independent of the time window
    pub is_active: bool,
}

impl Event {
    /// A window is well-formed only when it starts before it ends.
    pub fn has_valid_window(&self) -> bool {
        self.start_time < self.end_time
    }
}
