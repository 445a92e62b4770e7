//! Like toggle service.

use crate::services::notification::NotificationService;
use chrono::Utc;
use ripple_common::{AppResult, IdGenerator};
use ripple_db::{
    entities::post_like,
    repositories::{PostLikeRepository, PostRepository},
};
use sea_orm::Set;

/// Result of a like toggle.
#[derive(Debug, Clone, Copy)]
pub struct LikeOutcome {
    /// New state: is the post now liked by the user?
    pub liked: bool,
    /// Recomputed like count for the post.
    pub likes_count: u64,
}

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    like_repo: PostLikeRepository,
    post_repo: PostRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub const fn new(
        like_repo: PostLikeRepository,
        post_repo: PostRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            like_repo,
            post_repo,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Toggle a like: delete it if present, create it otherwise.
    ///
    /// Repeat calls flip the state back and forth; the unique
    /// (user, post) constraint is the backstop against duplicates.
    pub async fn toggle(&self, user_id: &str, post_id: &str) -> AppResult<LikeOutcome> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let liked = if self.like_repo.has_liked(user_id, post_id).await? {
            self.like_repo
                .delete_by_user_and_post(user_id, post_id)
                .await?;
            false
        } else {
            let model = post_like::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user_id.to_string()),
                post_id: Set(post_id.to_string()),
                created_at: Set(Utc::now().into()),
            };
            self.like_repo.create(model).await?;

            if let Err(e) = self
                .notification_service
                .notify_like(&post.user_id, user_id, post_id)
                .await
            {
                tracing::warn!(error = %e, "Failed to create like notification");
            }

            true
        };

        let likes_count = self.like_repo.count_by_post(post_id).await?;

        Ok(LikeOutcome { liked, likes_count })
    }

    /// Check if a user has liked a post.
    pub async fn has_liked(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        self.like_repo.has_liked(user_id, post_id).await
    }

    /// Count likes on a post.
    pub async fn count(&self, post_id: &str) -> AppResult<u64> {
        self.like_repo.count_by_post(post_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ripple_db::entities::post;
    use ripple_db::repositories::NotificationRepository;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_post(id: &str, user_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            text: "hello".to_string(),
            image_id: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_toggle_missing_post_is_not_found() {
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );
        let like_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let notif_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = LikeService::new(
            PostLikeRepository::new(like_db),
            PostRepository::new(post_db),
            NotificationService::new(NotificationRepository::new(notif_db)),
        );

        let result = service.toggle("user1", "missing").await;
        assert!(matches!(
            result,
            Err(ripple_common::AppError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_unlike_on_existing_like() {
        let post = create_test_post("p1", "author");
        let like = post_like::Model {
            id: "l1".to_string(),
            user_id: "user1".to_string(),
            post_id: "p1".to_string(),
            created_at: Utc::now().into(),
        };

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );
        // has_liked lookup, delete lookup, then the count query
        let like_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[like.clone()], [like.clone()]])
                .append_exec_results([sea_orm::MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[maplit_count(0)]])
                .into_connection(),
        );
        let notif_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = LikeService::new(
            PostLikeRepository::new(like_db),
            PostRepository::new(post_db),
            NotificationService::new(NotificationRepository::new(notif_db)),
        );

        let outcome = service.toggle("user1", "p1").await.unwrap();
        assert!(!outcome.liked);
        assert_eq!(outcome.likes_count, 0);
    }

    fn maplit_count(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        let mut map = std::collections::BTreeMap::new();
        map.insert("num_items", sea_orm::Value::BigInt(Some(n)));
        map
    }
}
