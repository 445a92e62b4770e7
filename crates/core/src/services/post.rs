//! Post service.

use chrono::Utc;
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{
    entities::post,
    repositories::{FollowingRepository, PostRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Input for creating a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 4096))]
    pub text: String,
    pub image_id: Option<String>,
}

/// Input for updating a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
    #[validate(length(min = 1, max = 4096))]
    pub text: Option<String>,
    pub image_id: Option<String>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    following_repo: FollowingRepository,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, following_repo: FollowingRepository) -> Self {
        Self {
            post_repo,
            following_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new post.
    pub async fn create(&self, author_id: &str, input: CreatePostInput) -> AppResult<post::Model> {
        input.validate()?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(author_id.to_string()),
            text: Set(input.text),
            image_id: Set(input.image_id),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.post_repo.create(model).await
    }

    /// Get a post by ID.
    pub async fn get(&self, id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(id).await
    }

    /// The feed: posts by followed users plus the requester's own posts.
    /// With `show_all`, every post is returned instead.
    pub async fn feed(
        &self,
        user_id: &str,
        show_all: bool,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<post::Model>> {
        if show_all {
            return self.post_repo.find_all(limit, until_id).await;
        }

        let mut author_ids = self.following_repo.followee_ids(user_id).await?;
        author_ids.push(user_id.to_string());

        self.post_repo
            .find_by_authors(&author_ids, limit, until_id)
            .await
    }

    /// List posts by a single author.
    pub async fn list_by_user(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_by_user(user_id, limit, until_id).await
    }

    /// Update a post. Author-only.
    pub async fn update(
        &self,
        actor_id: &str,
        post_id: &str,
        input: UpdatePostInput,
    ) -> AppResult<post::Model> {
        input.validate()?;

        let post = self.post_repo.get_by_id(post_id).await?;

        if post.user_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this post".to_string(),
            ));
        }

        let mut active: post::ActiveModel = post.into();

        if let Some(text) = input.text {
            active.text = Set(text);
        }
        if let Some(image_id) = input.image_id {
            active.image_id = Set(Some(image_id));
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.post_repo.update(active).await
    }

    /// Delete a post. Author-only.
    pub async fn delete(&self, actor_id: &str, post_id: &str) -> AppResult<()> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.user_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this post".to_string(),
            ));
        }

        self.post_repo.delete(post_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn empty_db() -> Arc<sea_orm::DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

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
    async fn test_update_by_non_author_is_forbidden() {
        let post = create_test_post("p1", "author");

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );

        let service = PostService::new(
            PostRepository::new(post_db),
            FollowingRepository::new(empty_db()),
        );
        let result = service
            .update(
                "intruder",
                "p1",
                UpdatePostInput {
                    text: Some("hacked".to_string()),
                    image_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_by_non_author_is_forbidden() {
        let post = create_test_post("p1", "author");

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );

        let service = PostService::new(
            PostRepository::new(post_db),
            FollowingRepository::new(empty_db()),
        );
        let result = service.delete("intruder", "p1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_empty_text_is_validation_error() {
        let service = PostService::new(
            PostRepository::new(empty_db()),
            FollowingRepository::new(empty_db()),
        );

        let result = service
            .create(
                "author",
                CreatePostInput {
                    text: String::new(),
                    image_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
