//! Reward request store
//!
//! The open-request and one-grant-per-event rules are enforced by partial
//! unique indexes (see `connection.rs`), so the racy paths show up here as
//! constraint violations rather than lost updates. Status transitions are
//! conditional updates keyed on `status = 'pending'`.

use chrono::{DateTime, Utc};
use prizebox_core::{Error, RequestFilter, RequestStatus, Result, RewardRequest};
use sqlx::SqlitePool;

/// Request row stored in database
#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: i64,
    user_id: String,
    reward_id: i64,
    event_id: Option<i64>,
    status: String,
    rejection_reason: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for RewardRequest {
    type Error = Error;

    fn try_from(row: RequestRow) -> Result<Self> {
        Ok(RewardRequest {
            id: row.id,
            user_id: row.user_id,
            reward_id: row.reward_id,
            event_id: row.event_id,
            status: RequestStatus::parse(&row.status)?,
            rejection_reason: row.rejection_reason,
            approved_at: row.approved_at,
            rejected_at: row.rejected_at,
            created_at: row.created_at,
        })
    }
}

const REQUEST_COLUMNS: &str = "id, user_id, reward_id, event_id, status, \
     rejection_reason, approved_at, rejected_at, created_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation)
        .unwrap_or(false)
}

/// Outcome of inserting the initial pending row for a claim.
#[derive(Debug)]
pub enum PendingInsert {
    /// Row created; the claim proceeds through validation
    Created(RewardRequest),
    /// The open-request index rejected the insert: the user already holds a
    /// pending or approved request for this reward
    DuplicateOpen,
}

/// Persist a new claim in the pending state.
pub async fn insert_pending(
    pool: &SqlitePool,
    user_id: &str,
    reward_id: i64,
    created_at: DateTime<Utc>,
) -> Result<PendingInsert> {
    let result = sqlx::query(
        r#"
        INSERT INTO reward_requests (user_id, reward_id, status, created_at)
        VALUES (?, ?, 'pending', ?)
        "#,
    )
    .bind(user_id)
    .bind(reward_id)
    .bind(created_at)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            let row = require_request(pool, done.last_insert_rowid()).await?;
            Ok(PendingInsert::Created(row))
        }
        Err(err) if is_unique_violation(&err) => Ok(PendingInsert::DuplicateOpen),
        Err(err) => Err(Error::DatabaseError(err.to_string())),
    }
}

/// Persist a request directly in the rejected state. Used when the duplicate
/// check fires at insert time, so the attempt still leaves an audit row.
pub async fn insert_rejected(
    pool: &SqlitePool,
    user_id: &str,
    reward_id: i64,
    event_id: Option<i64>,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<RewardRequest> {
    let result = sqlx::query(
        r#"
        INSERT INTO reward_requests
            (user_id, reward_id, event_id, status, rejection_reason, rejected_at, created_at)
        VALUES (?, ?, ?, 'rejected', ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(reward_id)
    .bind(event_id)
    .bind(reason)
    .bind(at)
    .bind(at)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    require_request(pool, result.last_insert_rowid()).await
}

/// The user's open (pending or approved) request for a reward, if any
pub async fn find_open_request(
    pool: &SqlitePool,
    user_id: &str,
    reward_id: i64,
) -> Result<Option<RewardRequest>> {
    let row: Option<RequestRow> = sqlx::query_as(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM reward_requests
        WHERE user_id = ? AND reward_id = ? AND status IN ('pending', 'approved')
        LIMIT 1
        "#
    ))
    .bind(user_id)
    .bind(reward_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(RewardRequest::try_from).transpose()
}

/// Whether the user already holds an approved request for any reward of the
/// event. Approved rows always carry `event_id`.
pub async fn has_grant_for_event(
    pool: &SqlitePool,
    user_id: &str,
    event_id: i64,
) -> Result<bool> {
    let hit = sqlx::query(
        r#"
        SELECT 1 FROM reward_requests
        WHERE user_id = ? AND event_id = ? AND status = 'approved'
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(hit.is_some())
}

/// Outcome of the approval transition.
#[derive(Debug)]
pub enum ApproveOutcome {
    Approved(RewardRequest),
    /// The row was not pending: already terminal, or missing
    NotPending,
    /// The one-grant-per-event index rejected the transition: a concurrent
    /// sibling claim won the event slot first
    EventSlotTaken,
}

/// Move a pending request to approved, stamping `approved_at` and the
/// owning event.
pub async fn mark_approved(
    pool: &SqlitePool,
    request_id: i64,
    event_id: i64,
    at: DateTime<Utc>,
) -> Result<ApproveOutcome> {
    let result = sqlx::query(
        r#"
        UPDATE reward_requests
        SET status = 'approved', approved_at = ?, event_id = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(at)
    .bind(event_id)
    .bind(request_id)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Ok(ApproveOutcome::NotPending),
        Ok(_) => {
            let row = require_request(pool, request_id).await?;
            Ok(ApproveOutcome::Approved(row))
        }
        Err(err) if is_unique_violation(&err) => Ok(ApproveOutcome::EventSlotTaken),
        Err(err) => Err(Error::DatabaseError(err.to_string())),
    }
}

/// Move a pending request to rejected with the given reason. Returns None
/// when the row was not pending.
pub async fn mark_rejected(
    pool: &SqlitePool,
    request_id: i64,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<Option<RewardRequest>> {
    let result = sqlx::query(
        r#"
        UPDATE reward_requests
        SET status = 'rejected', rejection_reason = ?, rejected_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(reason)
    .bind(at)
    .bind(request_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    require_request(pool, request_id).await.map(Some)
}

/// Get a specific request by ID
pub async fn get_request(pool: &SqlitePool, id: i64) -> Result<Option<RewardRequest>> {
    let row: Option<RequestRow> = sqlx::query_as(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM reward_requests
        WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(RewardRequest::try_from).transpose()
}

async fn require_request(pool: &SqlitePool, id: i64) -> Result<RewardRequest> {
    get_request(pool, id)
        .await?
        .ok_or(Error::RequestNotFound(id))
}

/// List requests matching the filter, newest first. An event criterion is
/// resolved through the event's reward ids, so rows recorded before the
/// reward was resolved are still found.
pub async fn list_requests(
    pool: &SqlitePool,
    filter: &RequestFilter,
) -> Result<Vec<RewardRequest>> {
    let mut query = format!(
        "SELECT {REQUEST_COLUMNS} FROM reward_requests WHERE 1 = 1"
    );

    if filter.status.is_some() {
        query.push_str(" AND status = ?");
    }
    if filter.event_id.is_some() {
        query.push_str(" AND reward_id IN (SELECT id FROM rewards WHERE event_id = ?)");
    }
    if filter.user_id.is_some() {
        query.push_str(" AND user_id = ?");
    }
    query.push_str(" ORDER BY created_at DESC, id DESC");

    let mut builder = sqlx::query_as::<_, RequestRow>(&query);
    if let Some(status) = filter.status {
        builder = builder.bind(status.as_str());
    }
    if let Some(event_id) = filter.event_id {
        builder = builder.bind(event_id);
    }
    if let Some(user_id) = &filter.user_id {
        builder = builder.bind(user_id.as_str());
    }

    let rows = builder
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(RewardRequest::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::testutil;

    #[tokio::test]
    async fn duplicate_open_request_is_refused_by_index() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 10).await;

        let first = insert_pending(db.pool(), "u-1", reward_id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(first, PendingInsert::Created(_)));

        let second = insert_pending(db.pool(), "u-1", reward_id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(second, PendingInsert::DuplicateOpen));

        // a different user is unaffected
        let other = insert_pending(db.pool(), "u-2", reward_id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(other, PendingInsert::Created(_)));
    }

    #[tokio::test]
    async fn rejected_rows_do_not_block_resubmission() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 10).await;

        let PendingInsert::Created(req) =
            insert_pending(db.pool(), "u-1", reward_id, Utc::now()).await.unwrap()
        else {
            panic!("expected created");
        };
        mark_rejected(db.pool(), req.id, "quota exhausted", Utc::now())
            .await
            .unwrap()
            .unwrap();

        let again = insert_pending(db.pool(), "u-1", reward_id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(again, PendingInsert::Created(_)));
    }

    #[tokio::test]
    async fn transitions_only_leave_pending() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_id = testutil::seed_reward(&db, event_id, 10).await;

        let PendingInsert::Created(req) =
            insert_pending(db.pool(), "u-1", reward_id, Utc::now()).await.unwrap()
        else {
            panic!("expected created");
        };

        let approved = mark_approved(db.pool(), req.id, event_id, Utc::now())
            .await
            .unwrap();
        let ApproveOutcome::Approved(row) = approved else {
            panic!("expected approved");
        };
        assert_eq!(row.status, RequestStatus::Approved);
        assert!(row.approved_at.is_some());
        assert_eq!(row.event_id, Some(event_id));

        // terminal rows refuse further transitions
        assert!(matches!(
            mark_approved(db.pool(), req.id, event_id, Utc::now()).await.unwrap(),
            ApproveOutcome::NotPending
        ));
        assert!(mark_rejected(db.pool(), req.id, "late", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn event_slot_is_exclusive_across_sibling_rewards() {
        let db = testutil::db().await;
        let event_id = testutil::seed_open_event(&db).await;
        let reward_a = testutil::seed_reward(&db, event_id, 10).await;
        let reward_b = testutil::seed_reward(&db, event_id, 10).await;

        let PendingInsert::Created(first) =
            insert_pending(db.pool(), "u-1", reward_a, Utc::now()).await.unwrap()
        else {
            panic!("expected created");
        };
        assert!(matches!(
            mark_approved(db.pool(), first.id, event_id, Utc::now()).await.unwrap(),
            ApproveOutcome::Approved(_)
        ));
        assert!(has_grant_for_event(db.pool(), "u-1", event_id).await.unwrap());

        let PendingInsert::Created(second) =
            insert_pending(db.pool(), "u-1", reward_b, Utc::now()).await.unwrap()
        else {
            panic!("expected created");
        };
        assert!(matches!(
            mark_approved(db.pool(), second.id, event_id, Utc::now()).await.unwrap(),
            ApproveOutcome::EventSlotTaken
        ));
    }

    #[tokio::test]
    async fn listing_composes_filters() {
        let db = testutil::db().await;
        let event_a = testutil::seed_open_event(&db).await;
        let event_b = testutil::seed_open_event(&db).await;
        let reward_a = testutil::seed_reward(&db, event_a, 10).await;
        let reward_b = testutil::seed_reward(&db, event_b, 10).await;

        let PendingInsert::Created(req_a) =
            insert_pending(db.pool(), "u-1", reward_a, Utc::now()).await.unwrap()
        else {
            panic!("expected created");
        };
        insert_pending(db.pool(), "u-2", reward_a, Utc::now()).await.unwrap();
        insert_pending(db.pool(), "u-1", reward_b, Utc::now()).await.unwrap();
        mark_approved(db.pool(), req_a.id, event_a, Utc::now()).await.unwrap();

        let all = list_requests(db.pool(), &RequestFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let by_user = list_requests(db.pool(), &RequestFilter::by_user("u-1")).await.unwrap();
        assert_eq!(by_user.len(), 2);

        let by_event = list_requests(db.pool(), &RequestFilter::by_event(event_a)).await.unwrap();
        assert_eq!(by_event.len(), 2);

        let pending = list_requests(
            db.pool(),
            &RequestFilter::by_status(RequestStatus::Pending),
        )
        .await
        .unwrap();
        assert_eq!(pending.len(), 2);

        let composed = list_requests(
            db.pool(),
            &RequestFilter {
                status: Some(RequestStatus::Approved),
                event_id: Some(event_a),
                user_id: Some("u-1".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(composed.len(), 1);
        assert_eq!(composed[0].id, req_a.id);
    }
}
