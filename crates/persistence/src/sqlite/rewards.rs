//! Reward catalog and quota ledger operations

use prizebox_core::{Error, Result, Reward};
use sqlx::SqlitePool;

/// Reward row stored in database
#[derive(Debug, sqlx::FromRow)]
struct RewardRow {
    id: i64,
    name: String,
    description: String,
    event_id: i64,
    total_quota: i64,
    claimed_count: i64,
}

impl From<RewardRow> for Reward {
    fn from(row: RewardRow) -> Self {
        Reward {
            id: row.id,
            name: row.name,
            description: row.description,
            event_id: row.event_id,
            total_quota: row.total_quota,
            claimed_count: row.claimed_count,
        }
    }
}

/// Create a new reward under an existing event
pub async fn insert_reward(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    event_id: i64,
    total_quota: i64,
) -> Result<i64> {
    if total_quota < 0 {
        return Err(Error::InvalidData("total quota cannot be negative".to_string()));
    }

    let owner = sqlx::query("SELECT 1 FROM events WHERE id = ?")
        .bind(event_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    if owner.is_none() {
        return Err(Error::EventNotFound(event_id));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO rewards (name, description, event_id, total_quota)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(event_id)
    .bind(total_quota)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

/// Get a specific reward by ID
pub async fn get_reward(pool: &SqlitePool, id: i64) -> Result<Option<Reward>> {
    let row: Option<RewardRow> = sqlx::query_as(
        r#"
        SELECT id, name, description, event_id, total_quota, claimed_count
        FROM rewards
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Reward::from))
}

/// List all rewards
pub async fn list_rewards(pool: &SqlitePool) -> Result<Vec<Reward>> {
    let rows: Vec<RewardRow> = sqlx::query_as(
        r#"
        SELECT id, name, description, event_id, total_quota, claimed_count
        FROM rewards
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Reward::from).collect())
}

/// All rewards belonging to one event
pub async fn rewards_for_event(pool: &SqlitePool, event_id: i64) -> Result<Vec<Reward>> {
    let rows: Vec<RewardRow> = sqlx::query_as(
        r#"
        SELECT id, name, description, event_id, total_quota, claimed_count
        FROM rewards
        WHERE event_id = ?
        ORDER BY id
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Reward::from).collect())
}

/// Delete a reward. Refused while any request references it, so the audit
/// trail never dangles.
pub async fn delete_reward(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM rewards
        WHERE id = ?
          AND NOT EXISTS (SELECT 1 FROM reward_requests WHERE reward_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return if get_reward(pool, id).await?.is_some() {
            Err(Error::Conflict(
                "reward has recorded requests and cannot be deleted".to_string(),
            ))
        } else {
            Err(Error::RewardNotFound(id))
        };
    }
    Ok(())
}

/// Reserve one unit of the reward's quota if any remain.
///
/// The availability read and the increment are a single conditional UPDATE
/// decided by `rows_affected`, so concurrent callers can never push
/// `claimed_count` past `total_quota`. Returns false when the quota is
/// exhausted (or the reward does not exist); no state changes in that case.
pub async fn try_reserve(pool: &SqlitePool, reward_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rewards
        SET claimed_count = claimed_count + 1
        WHERE id = ? AND claimed_count < total_quota
        "#,
    )
    .bind(reward_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() > 0)
}

/// Return one reserved unit, compensating a reservation whose later step
/// failed. The `claimed_count > 0` guard keeps the counter from going
/// negative if a release is ever replayed.
pub async fn release(pool: &SqlitePool, reward_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rewards
        SET claimed_count = claimed_count - 1
        WHERE id = ? AND claimed_count > 0
        "#,
    )
    .bind(reward_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::testutil;

    #[tokio::test]
    async fn reserve_stops_at_quota() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 3).await;

        for _ in 0..3 {
            assert!(try_reserve(db.pool(), reward_id).await.unwrap());
        }
        assert!(!try_reserve(db.pool(), reward_id).await.unwrap());

        let reward = get_reward(db.pool(), reward_id).await.unwrap().unwrap();
        assert_eq!(reward.claimed_count, 3);
        assert!(reward.is_exhausted());
    }

    #[tokio::test]
    async fn concurrent_reserves_never_overshoot() {
        let db = std::sync::Arc::new(testutil::db().await);
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 5).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                try_reserve(db.pool(), reward_id).await.unwrap()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 5);
        let reward = get_reward(db.pool(), reward_id).await.unwrap().unwrap();
        assert_eq!(reward.claimed_count, 5);
    }

    #[tokio::test]
    async fn release_restores_a_unit() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 1).await;

        assert!(try_reserve(db.pool(), reward_id).await.unwrap());
        assert!(!try_reserve(db.pool(), reward_id).await.unwrap());

        assert!(release(db.pool(), reward_id).await.unwrap());
        let reward = get_reward(db.pool(), reward_id).await.unwrap().unwrap();
        assert_eq!(reward.claimed_count, 0);

        // nothing reserved, nothing to release
        assert!(!release(db.pool(), reward_id).await.unwrap());
    }

    #[tokio::test]
    async fn zero_quota_never_reserves() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 0).await;

        assert!(!try_reserve(db.pool(), reward_id).await.unwrap());
    }

    #[tokio::test]
    async fn reward_requires_owning_event() {
        let db = testutil::db().await;
        let err = insert_reward(db.pool(), "orphan", "", 99, 10).await.unwrap_err();
        assert!(matches!(err, Error::EventNotFound(99)));
    }

    #[tokio::test]
    async fn delete_refused_while_referenced() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 1).await;

        crate::sqlite::insert_pending(db.pool(), "u-1", reward_id, chrono::Utc::now())
            .await
            .unwrap();

        let err = delete_reward(db.pool(), reward_id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let other = testutil::seed_reward(&db, event_id, 1).await;
        delete_reward(db.pool(), other).await.unwrap();
        assert!(get_reward(db.pool(), other).await.unwrap().is_none());
    }
}
