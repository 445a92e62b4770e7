//! Notification service.
//!
//! Three producers (like, comment, follow) each write one row for the
//! recipient. Self-notifications are suppressed. Pull-only: no push
//! delivery, clients poll the listing endpoints.

use chrono::Utc;
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};
use sea_orm::Set;

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a like notification.
    pub async fn notify_like(
        &self,
        recipient_id: &str,
        actor_id: &str,
        post_id: &str,
    ) -> AppResult<Option<notification::Model>> {
        self.create_internal(
            recipient_id,
            actor_id,
            NotificationType::Like,
            Some(post_id),
            None,
        )
        .await
    }

    /// Create a comment notification with a snapshot of the comment text.
    pub async fn notify_comment(
        &self,
        recipient_id: &str,
        actor_id: &str,
        post_id: &str,
        comment_text: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        self.create_internal(
            recipient_id,
            actor_id,
            NotificationType::Comment,
            Some(post_id),
            comment_text,
        )
        .await
    }

    /// Create a follow notification.
    pub async fn notify_follow(
        &self,
        recipient_id: &str,
        actor_id: &str,
    ) -> AppResult<Option<notification::Model>> {
        self.create_internal(recipient_id, actor_id, NotificationType::Follow, None, None)
            .await
    }

    /// Internal helper to create notifications. Self-notifications are
    /// suppressed (no row written).
    async fn create_internal(
        &self,
        recipient_id: &str,
        actor_id: &str,
        notification_type: NotificationType,
        post_id: Option<&str>,
        comment_text: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        if recipient_id == actor_id {
            return Ok(None);
        }

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            recipient_id: Set(recipient_id.to_string()),
            actor_id: Set(actor_id.to_string()),
            notification_type: Set(notification_type),
            post_id: Set(post_id.map(std::string::ToString::to_string)),
            comment_text: Set(comment_text.map(std::string::ToString::to_string)),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        };

        self.notification_repo.create(model).await.map(Some)
    }

    /// Get notifications for a recipient.
    pub async fn list(
        &self,
        recipient_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_recipient(recipient_id, limit, until_id, unread_only)
            .await
    }

    /// Mark a notification as read. Idempotent; fails only if the
    /// notification does not belong to the requester.
    pub async fn mark_as_read(&self, recipient_id: &str, notification_id: &str) -> AppResult<()> {
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Notification not found: {notification_id}"))
            })?;

        if notification.recipient_id != recipient_id {
            return Err(AppError::NotFound(format!(
                "Notification not found: {notification_id}"
            )));
        }

        if !notification.is_read {
            self.notification_repo.mark_as_read(notification_id).await?;
        }
        Ok(())
    }

    /// Mark all notifications as read for a recipient.
    pub async fn mark_all_as_read(&self, recipient_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(recipient_id).await
    }

    /// Count unread notifications for a recipient.
    pub async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(recipient_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_notification(
        id: &str,
        recipient_id: &str,
        is_read: bool,
    ) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            recipient_id: recipient_id.to_string(),
            actor_id: "actor".to_string(),
            notification_type: NotificationType::Like,
            post_id: Some("p1".to_string()),
            comment_text: None,
            is_read,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_self_notification_suppressed() {
        // No query results appended: a write would fail the mock
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = NotificationService::new(NotificationRepository::new(db));
        let result = service.notify_like("user1", "user1", "p1").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mark_as_read_wrong_recipient_is_not_found() {
        let notification = create_test_notification("n1", "user1", false);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[notification]])
                .into_connection(),
        );

        let service = NotificationService::new(NotificationRepository::new(db));
        let result = service.mark_as_read("someone-else", "n1").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_as_read_already_read_is_idempotent() {
        let notification = create_test_notification("n1", "user1", true);

        // Only the lookup query: no update is issued for an already-read row
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[notification]])
                .into_connection(),
        );

        let service = NotificationService::new(NotificationRepository::new(db));
        let result = service.mark_as_read("user1", "n1").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mark_as_read_missing_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<notification::Model>::new()])
                .into_connection(),
        );

        let service = NotificationService::new(NotificationRepository::new(db));
        let result = service.mark_as_read("user1", "missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
