//! Comment service with threaded reply assembly.

use chrono::Utc;
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{
    entities::comment,
    repositories::{CommentRepository, PostRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

/// Maximum reply nesting rendered into the thread tree. Replies below
/// this depth are elided from the tree rather than recursed into.
pub const MAX_REPLY_DEPTH: usize = 8;

/// Input for creating a comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    #[validate(length(max = 2048))]
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub parent_id: Option<String>,
}

/// A comment with its nested replies.
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub comment: comment::Model,
    pub replies: Vec<CommentNode>,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository, post_repo: PostRepository) -> Self {
        Self {
            comment_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a comment on a post, optionally as a reply to another comment.
    pub async fn create(
        &self,
        author_id: &str,
        post_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        // Comment cannot be completely empty
        let has_text = input
            .text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_text && input.image_id.is_none() {
            return Err(AppError::Validation(
                "Comment must have text or an image".to_string(),
            ));
        }

        let _post = self.post_repo.get_by_id(post_id).await?;

        // A reply parent must exist and belong to the same post
        if let Some(ref parent_id) = input.parent_id {
            let parent = self
                .comment_repo
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Comment not found: {parent_id}")))?;

            if parent.post_id != post_id {
                return Err(AppError::Validation(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            user_id: Set(author_id.to_string()),
            text: Set(input.text),
            image_id: Set(input.image_id),
            parent_id: Set(input.parent_id),
            created_at: Set(Utc::now().into()),
        };

        self.comment_repo.create(model).await
    }

    /// Edit a comment's text. Author-only.
    pub async fn update(
        &self,
        actor_id: &str,
        comment_id: &str,
        text: String,
    ) -> AppResult<comment::Model> {
        if text.trim().is_empty() {
            return Err(AppError::Validation(
                "Comment text cannot be empty".to_string(),
            ));
        }

        let comment = self
            .comment_repo
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {comment_id}")))?;

        if comment.user_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        let mut active: comment::ActiveModel = comment.into();
        active.text = Set(Some(text));

        self.comment_repo.update(active).await
    }

    /// Delete a comment. Author-only.
    pub async fn delete(&self, actor_id: &str, comment_id: &str) -> AppResult<()> {
        let comment = self
            .comment_repo
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {comment_id}")))?;

        if comment.user_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }

        self.comment_repo.delete(comment_id).await
    }

    /// Load the threaded comment tree for a post: top-level comments with
    /// nested replies, depth-capped at [`MAX_REPLY_DEPTH`].
    pub async fn thread_for_post(&self, post_id: &str) -> AppResult<Vec<CommentNode>> {
        let comments = self.comment_repo.find_by_post(post_id).await?;
        Ok(build_thread(comments, MAX_REPLY_DEPTH))
    }

    /// Count comments on a post.
    pub async fn count_for_post(&self, post_id: &str) -> AppResult<u64> {
        self.comment_repo.count_by_post(post_id).await
    }
}

/// Assemble a flat comment list into a tree of top-level comments with
/// nested replies. `max_depth` bounds recursion: a reply whose depth
/// exceeds the cap is dropped from the tree.
#[must_use]
pub fn build_thread(comments: Vec<comment::Model>, max_depth: usize) -> Vec<CommentNode> {
    let mut children: HashMap<Option<String>, Vec<comment::Model>> = HashMap::new();
    for c in comments {
        children.entry(c.parent_id.clone()).or_default().push(c);
    }

    attach_replies(&None, &mut children, max_depth)
}

fn attach_replies(
    parent_id: &Option<String>,
    children: &mut HashMap<Option<String>, Vec<comment::Model>>,
    remaining_depth: usize,
) -> Vec<CommentNode> {
    let Some(level) = children.remove(parent_id) else {
        return Vec::new();
    };

    level
        .into_iter()
        .map(|comment| {
            let replies = if remaining_depth == 0 {
                Vec::new()
            } else {
                attach_replies(
                    &Some(comment.id.clone()),
                    children,
                    remaining_depth - 1,
                )
            };
            CommentNode { comment, replies }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_comment(id: &str, parent_id: Option<&str>) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            text: Some(format!("comment {id}")),
            image_id: None,
            parent_id: parent_id.map(std::string::ToString::to_string),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_build_thread_nests_replies() {
        let comments = vec![
            make_comment("c1", None),
            make_comment("c2", Some("c1")),
            make_comment("c3", Some("c2")),
            make_comment("c4", None),
        ];

        let tree = build_thread(comments, MAX_REPLY_DEPTH);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, "c1");
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment.id, "c2");
        assert_eq!(tree[0].replies[0].replies[0].comment.id, "c3");
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_build_thread_caps_depth() {
        // Chain c0 <- c1 <- c2 <- ... <- c11
        let mut comments = vec![make_comment("c0", None)];
        for i in 1..=11 {
            comments.push(make_comment(&format!("c{i}"), Some(&format!("c{}", i - 1))));
        }

        let tree = build_thread(comments, 3);

        // Depth 0 = top-level; replies at depth 4 and beyond are elided
        let mut node = &tree[0];
        let mut depth = 0;
        while let Some(next) = node.replies.first() {
            node = next;
            depth += 1;
        }
        assert_eq!(depth, 3);
    }

    #[test]
    fn test_build_thread_empty() {
        let tree = build_thread(Vec::new(), MAX_REPLY_DEPTH);
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_forbidden() {
        use ripple_db::repositories::{CommentRepository, PostRepository};
        use sea_orm::{DatabaseBackend, MockDatabase};
        use std::sync::Arc;

        let comment_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[make_comment("c1", None)]])
                .into_connection(),
        );
        let post_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service =
            CommentService::new(CommentRepository::new(comment_db), PostRepository::new(post_db));
        let result = service.update("intruder", "c1", "edited".to_string()).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_empty_comment_is_validation_error() {
        use ripple_db::repositories::{CommentRepository, PostRepository};
        use sea_orm::{DatabaseBackend, MockDatabase};
        use std::sync::Arc;

        let db1 = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let db2 = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = CommentService::new(CommentRepository::new(db1), PostRepository::new(db2));
        let result = service
            .create(
                "u1",
                "p1",
                CreateCommentInput {
                    text: Some("   ".to_string()),
                    image_id: None,
                    parent_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
