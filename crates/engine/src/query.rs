//! Read-only projections over the request audit trail

use prizebox_core::{Error, Principal, RequestFilter, RequestStatus, Result, RewardRequest};
use prizebox_persistence::sqlite;

use crate::executor::RequestEngine;

impl RequestEngine {
    /// List requests matching the filter, newest first. Listings not scoped
    /// to the caller's own user id require a reviewer role.
    pub async fn list(
        &self,
        principal: &Principal,
        filter: &RequestFilter,
    ) -> Result<Vec<RewardRequest>> {
        let self_scoped = filter.user_id.as_deref() == Some(principal.user_id.as_str());
        if !self_scoped && !principal.role.can_review() {
            return Err(Error::Forbidden(format!(
                "role {} can only list its own requests",
                principal.role
            )));
        }
        sqlite::list_requests(self.db().pool(), filter).await
    }

    pub async fn list_by_user(
        &self,
        principal: &Principal,
        user_id: &str,
    ) -> Result<Vec<RewardRequest>> {
        self.list(principal, &RequestFilter::by_user(user_id)).await
    }

    pub async fn list_by_event(
        &self,
        principal: &Principal,
        event_id: i64,
    ) -> Result<Vec<RewardRequest>> {
        self.list(principal, &RequestFilter::by_event(event_id)).await
    }

    pub async fn list_by_status(
        &self,
        principal: &Principal,
        status: RequestStatus,
    ) -> Result<Vec<RewardRequest>> {
        self.list(principal, &RequestFilter::by_status(status)).await
    }

    /// Fetch one request. Callers may always fetch their own; anyone else's
    /// requires a reviewer role.
    pub async fn get(&self, principal: &Principal, request_id: i64) -> Result<RewardRequest> {
        let request = sqlite::get_request(self.db().pool(), request_id)
            .await?
            .ok_or(Error::RequestNotFound(request_id))?;
        if request.user_id != principal.user_id && !principal.role.can_review() {
            return Err(Error::Forbidden(format!(
                "role {} can only view its own requests",
                principal.role
            )));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use prizebox_core::Role;
    use prizebox_delivery::LocalDelivery;
    use prizebox_persistence::Database;
    use std::sync::Arc;

    async fn engine_with_data() -> (Arc<Database>, RequestEngine, i64) {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let now = Utc::now();
        let event_id = sqlite::insert_event(
            db.pool(),
            "test event",
            "",
            now - Duration::hours(1),
            now + Duration::hours(1),
            true,
        )
        .await
        .unwrap();
        let reward_id = sqlite::insert_reward(db.pool(), "test reward", "", event_id, 10)
            .await
            .unwrap();

        let engine = RequestEngine::new(db.clone(), Arc::new(LocalDelivery));
        engine.submit("u-1", reward_id).await.unwrap();
        engine.submit("u-2", reward_id).await.unwrap();
        (db, engine, event_id)
    }

    #[tokio::test]
    async fn users_see_only_their_own_requests() {
        let (_db, engine, event_id) = engine_with_data().await;
        let user = Principal::new("u-1", Role::User);

        let own = engine.list_by_user(&user, "u-1").await.unwrap();
        assert_eq!(own.len(), 1);

        let err = engine.list_by_user(&user, "u-2").await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = engine.list_by_event(&user, event_id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn reviewers_see_everything() {
        let (_db, engine, event_id) = engine_with_data().await;
        let auditor = Principal::new("aud-1", Role::Auditor);

        let all = engine.list(&auditor, &RequestFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let by_event = engine.list_by_event(&auditor, event_id).await.unwrap();
        assert_eq!(by_event.len(), 2);

        let approved = engine
            .list_by_status(&auditor, RequestStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.len(), 2);
    }

    #[tokio::test]
    async fn get_enforces_ownership() {
        let (_db, engine, _event_id) = engine_with_data().await;
        let auditor = Principal::new("aud-1", Role::Auditor);
        let all = engine.list(&auditor, &RequestFilter::default()).await.unwrap();
        let someone_elses = all.iter().find(|r| r.user_id == "u-2").unwrap();

        let user = Principal::new("u-1", Role::User);
        let err = engine.get(&user, someone_elses.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let theirs = engine
            .get(&Principal::new("u-2", Role::User), someone_elses.id)
            .await
            .unwrap();
        assert_eq!(theirs.id, someone_elses.id);

        let missing = engine.get(&auditor, 9999).await.unwrap_err();
        assert!(matches!(missing, Error::RequestNotFound(9999)));
    }
}
