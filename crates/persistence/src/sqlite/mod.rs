//! SQLite database management

mod connection;
mod events;
mod requests;
mod rewards;

pub use connection::Database;
pub use events::*;
pub use requests::*;
pub use rewards::*;

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{DateTime, Duration, Utc};

    use super::Database;

    pub async fn db() -> Database {
        Database::connect_in_memory().await.unwrap()
    }

    /// An event whose window is open around `Utc::now()`
    pub async fn seed_open_event(db: &Database) -> i64 {
        let now = Utc::now();
        seed_event(db, now - Duration::hours(1), now + Duration::hours(1), true).await
    }

    pub async fn seed_event(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        active: bool,
    ) -> i64 {
        super::insert_event(db.pool(), "test event", "", start, end, active)
            .await
            .unwrap()
    }

    pub async fn seed_reward(db: &Database, event_id: i64, quota: i64) -> i64 {
        super::insert_reward(db.pool(), "test reward", "", event_id, quota)
            .await
            .unwrap()
    }
}
