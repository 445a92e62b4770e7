//! Following service.

use crate::services::notification::NotificationService;
use chrono::Utc;
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{
    entities::following,
    repositories::{FollowingRepository, UserRepository},
};
use sea_orm::Set;

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    user_repo: UserRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        following_repo: FollowingRepository,
        user_repo: UserRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            following_repo,
            user_repo,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow a user.
    ///
    /// Repeat calls are not errors: the edge stays unique and the follow
    /// notification fires only when the edge is newly created.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        // Can't follow yourself
        if follower_id == followee_id {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }

        // Target must exist
        let _followee = self.user_repo.get_by_id(followee_id).await?;

        // Already following: idempotent no-op
        if self
            .following_repo
            .is_following(follower_id, followee_id)
            .await?
        {
            return Ok(());
        }

        let model = following::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        self.following_repo.create(model).await?;

        if let Err(e) = self
            .notification_service
            .notify_follow(followee_id, follower_id)
            .await
        {
            tracing::warn!(error = %e, "Failed to create follow notification");
        }

        Ok(())
    }

    /// Unfollow a user. Idempotent; no notification.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let _followee = self.user_repo.get_by_id(followee_id).await?;

        self.following_repo
            .delete_by_pair(follower_id, followee_id)
            .await
    }

    /// Check if a user is following another.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.following_repo
            .is_following(follower_id, followee_id)
            .await
    }

    /// Get followers of a user.
    pub async fn get_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        self.following_repo
            .find_followers(user_id, limit, until_id)
            .await
    }

    /// Get users that a user is following.
    pub async fn get_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        self.following_repo
            .find_following(user_id, limit, until_id)
            .await
    }

    /// Count followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        self.following_repo.count_followers(user_id).await
    }

    /// Count users that a user is following.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        self.following_repo.count_following(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ripple_db::entities::user;
    use ripple_db::repositories::NotificationRepository;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn empty_db() -> Arc<sea_orm::DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn service_with(
        following_db: Arc<sea_orm::DatabaseConnection>,
        user_db: Arc<sea_orm::DatabaseConnection>,
    ) -> FollowingService {
        FollowingService::new(
            FollowingRepository::new(following_db),
            UserRepository::new(user_db),
            NotificationService::new(NotificationRepository::new(empty_db())),
        )
    }

    fn create_test_user(id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_lowercase(),
            email: format!("{id}@example.com"),
            password_hash: "hash".to_string(),
            bio: None,
            birth_date: None,
            avatar_id: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_following(id: &str, follower_id: &str, followee_id: &str) -> following::Model {
        following::Model {
            id: id.to_string(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_follow_yourself_returns_error() {
        let service = service_with(empty_db(), empty_db());
        let result = service.follow("user1", "user1").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_follow_missing_target_returns_not_found() {
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let service = service_with(empty_db(), user_db);
        let result = service.follow("user1", "ghost").await;

        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_follow_twice_is_idempotent() {
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("user2")]])
                .into_connection(),
        );
        // Edge already exists: no insert is attempted
        let following_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_following("f1", "user1", "user2")]])
                .into_connection(),
        );

        let service = service_with(following_db, user_db);
        let result = service.follow("user1", "user2").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_is_following() {
        let following_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_following("f1", "user1", "user2")]])
                .into_connection(),
        );

        let service = service_with(following_db, empty_db());
        assert!(service.is_following("user1", "user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_not_following() {
        let following_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .into_connection(),
        );

        let service = service_with(following_db, empty_db());
        assert!(!service.is_following("user1", "user2").await.unwrap());
    }
}
