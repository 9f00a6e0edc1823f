//! Event window oracle

use chrono::{DateTime, Utc};
use prizebox_core::Event;

/// Whether the event admits claims at `now`: the operator toggle is on and
/// `now` falls inside the window, bounds included. A malformed window
/// (start at or after end) never opens.
pub fn is_event_open(event: &Event, now: DateTime<Utc>) -> bool {
    event.is_active
        && event.has_valid_window()
        && event.start_time <= now
        && now <= event.end_time
}
