//! Messaging services for direct and group messages.
//!
//! Message lifecycle: created, then optionally edited (sender-only,
//! sets `is_edited`) and/or revoked (sender-only, terminal, allowed only
//! within [`REVOKE_WINDOW_SECS`] of creation), and marked read by the
//! recipient (one-way flip).

use crate::services::event_publisher::EventPublisherService;
use chrono::{DateTime, FixedOffset, Utc};
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{
    entities::{group_message, message},
    repositories::{GroupMessageRepository, GroupRepository, MessageRepository, UserRepository},
};
use sea_orm::Set;
use std::collections::HashMap;

/// Seconds after creation during which the sender may revoke a message.
pub const REVOKE_WINDOW_SECS: i64 = 120;

/// Input for creating a message.
#[derive(Debug, Clone, Default)]
pub struct CreateMessageInput {
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub file_id: Option<String>,
}

impl CreateMessageInput {
    /// A message must carry at least one of text, image or file.
    fn is_empty(&self) -> bool {
        let no_text = self.text.as_deref().is_none_or(|t| t.trim().is_empty());
        no_text && self.image_id.is_none() && self.file_id.is_none()
    }
}

/// Input for editing a message.
#[derive(Debug, Clone, Default)]
pub struct UpdateMessageInput {
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub file_id: Option<String>,
}

/// Conversation summary for the aggregated thread list.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub partner_id: String,
    pub last_message: message::Model,
    pub unread_count: u64,
}

/// Check the revoke time window. At exactly the boundary the revoke is
/// still allowed.
fn within_revoke_window(created_at: DateTime<FixedOffset>, now: DateTime<Utc>) -> bool {
    (now - created_at.with_timezone(&Utc)).num_seconds() <= REVOKE_WINDOW_SECS
}

/// Aggregate a user's full message history into one entry per counterpart,
/// keeping the most recent message and the count of unread messages from
/// that counterpart, sorted by last-message time descending.
///
/// One O(n) pass over the full history; the aggregation itself is not
/// paginated.
#[must_use]
pub fn aggregate_conversations(user_id: &str, history: &[message::Model]) -> Vec<ConversationSummary> {
    let mut latest: HashMap<String, message::Model> = HashMap::new();
    let mut unread: HashMap<String, u64> = HashMap::new();

    for msg in history {
        let partner_id = if msg.sender_id == user_id {
            msg.recipient_id.clone()
        } else if msg.recipient_id == user_id {
            msg.sender_id.clone()
        } else {
            continue;
        };

        // Unread counts only messages directed at the requester
        if msg.recipient_id == user_id && !msg.is_read {
            *unread.entry(partner_id.clone()).or_default() += 1;
        }

        match latest.get(&partner_id) {
            Some(existing) if existing.created_at >= msg.created_at => {}
            _ => {
                latest.insert(partner_id, msg.clone());
            }
        }
    }

    let mut summaries: Vec<ConversationSummary> = latest
        .into_iter()
        .map(|(partner_id, last_message)| {
            let unread_count = unread.get(&partner_id).copied().unwrap_or(0);
            ConversationSummary {
                partner_id,
                last_message,
                unread_count,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
    summaries
}

/// Direct messaging service.
#[derive(Clone)]
pub struct MessagingService {
    message_repo: MessageRepository,
    user_repo: UserRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl MessagingService {
    /// Create a new messaging service.
    #[must_use]
    pub const fn new(message_repo: MessageRepository, user_repo: UserRepository) -> Self {
        Self {
            message_repo,
            user_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Send a message to another user.
    pub async fn send(
        &self,
        sender_id: &str,
        recipient_id: &str,
        input: CreateMessageInput,
    ) -> AppResult<message::Model> {
        if input.is_empty() {
            return Err(AppError::Validation(
                "Message must have text, an image or a file".to_string(),
            ));
        }

        if sender_id == recipient_id {
            return Err(AppError::Validation(
                "Cannot send a message to yourself".to_string(),
            ));
        }

        // Recipient must exist
        let _recipient = self.user_repo.get_by_id(recipient_id).await?;

        let now = Utc::now();
        let model = message::ActiveModel {
            id: Set(self.id_gen.generate()),
            sender_id: Set(sender_id.to_string()),
            recipient_id: Set(recipient_id.to_string()),
            text: Set(input.text),
            image_id: Set(input.image_id),
            file_id: Set(input.file_id),
            is_read: Set(false),
            is_edited: Set(false),
            is_revoked: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let message = self.message_repo.create(model).await?;

        // Fire-and-forget broadcast to the recipient's topic
        if let Some(ref event_publisher) = self.event_publisher {
            if let Err(e) = event_publisher.publish_direct_message(&message).await {
                tracing::warn!(error = %e, "Failed to publish direct message event");
            }
        }

        Ok(message)
    }

    /// Get messages exchanged with another user, chronological.
    pub async fn conversation(
        &self,
        user_id: &str,
        partner_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<message::Model>> {
        self.message_repo
            .find_conversation(user_id, partner_id, limit, until_id)
            .await
    }

    /// Aggregate the user's history into one entry per counterpart.
    pub async fn list_conversations(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
        let history = self.message_repo.find_all_for_user(user_id).await?;
        Ok(aggregate_conversations(user_id, &history))
    }

    /// Get a message by ID.
    pub async fn get(&self, message_id: &str) -> AppResult<message::Model> {
        self.message_repo.get_by_id(message_id).await
    }

    /// Edit a message. Sender-only; a revoked message cannot be edited.
    pub async fn edit(
        &self,
        actor_id: &str,
        message_id: &str,
        input: UpdateMessageInput,
    ) -> AppResult<message::Model> {
        let message = self.message_repo.get_by_id(message_id).await?;

        if message.sender_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the sender can edit this message".to_string(),
            ));
        }

        if message.is_revoked {
            return Err(AppError::Conflict(
                "Cannot edit a revoked message".to_string(),
            ));
        }

        let mut active: message::ActiveModel = message.into();

        if let Some(text) = input.text {
            active.text = Set(Some(text));
        }
        if let Some(image_id) = input.image_id {
            active.image_id = Set(Some(image_id));
        }
        if let Some(file_id) = input.file_id {
            active.file_id = Set(Some(file_id));
        }
        active.is_edited = Set(true);
        active.updated_at = Set(Utc::now().into());

        self.message_repo.update(active).await
    }

    /// Delete a message. Sender-only hard delete.
    pub async fn delete(&self, actor_id: &str, message_id: &str) -> AppResult<()> {
        let message = self.message_repo.get_by_id(message_id).await?;

        if message.sender_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the sender can delete this message".to_string(),
            ));
        }

        self.message_repo.delete(message_id).await
    }

    /// Revoke a message. Sender-only, terminal, time-boxed to
    /// [`REVOKE_WINDOW_SECS`] after creation.
    pub async fn revoke(&self, actor_id: &str, message_id: &str) -> AppResult<message::Model> {
        let message = self.message_repo.get_by_id(message_id).await?;

        if message.sender_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the sender can revoke this message".to_string(),
            ));
        }

        if message.is_revoked {
            return Err(AppError::Conflict("Message already revoked".to_string()));
        }

        if !within_revoke_window(message.created_at, Utc::now()) {
            return Err(AppError::Validation(format!(
                "Messages can only be revoked within {REVOKE_WINDOW_SECS} seconds"
            )));
        }

        if message.text.is_none() && message.image_id.is_none() && message.file_id.is_none() {
            return Err(AppError::Validation(
                "Message has no content to revoke".to_string(),
            ));
        }

        let mut active: message::ActiveModel = message.into();
        active.is_revoked = Set(true);
        active.updated_at = Set(Utc::now().into());

        self.message_repo.update(active).await
    }

    /// Mark a message as read. Recipient-only; one-way flip.
    pub async fn mark_read(&self, actor_id: &str, message_id: &str) -> AppResult<message::Model> {
        let message = self.message_repo.get_by_id(message_id).await?;

        if message.recipient_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the recipient can mark this message read".to_string(),
            ));
        }

        if message.is_read {
            return Ok(message);
        }

        let sender_id = message.sender_id.clone();
        let mut active: message::ActiveModel = message.into();
        active.is_read = Set(true);

        let updated = self.message_repo.update(active).await?;

        if let Some(ref event_publisher) = self.event_publisher {
            if let Err(e) = event_publisher
                .publish_message_read(&sender_id, &updated.id, actor_id)
                .await
            {
                tracing::warn!(error = %e, "Failed to publish read receipt");
            }
        }

        Ok(updated)
    }
}

/// Group messaging service.
#[derive(Clone)]
pub struct GroupMessagingService {
    group_message_repo: GroupMessageRepository,
    group_repo: GroupRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl GroupMessagingService {
    /// Create a new group messaging service.
    #[must_use]
    pub const fn new(group_message_repo: GroupMessageRepository, group_repo: GroupRepository) -> Self {
        Self {
            group_message_repo,
            group_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Send a message to a group. Requires current membership.
    pub async fn send(
        &self,
        sender_id: &str,
        group_id: &str,
        input: CreateMessageInput,
    ) -> AppResult<group_message::Model> {
        if input.is_empty() {
            return Err(AppError::Validation(
                "Message must have text, an image or a file".to_string(),
            ));
        }

        let _group = self.group_repo.get_by_id(group_id).await?;

        if !self.group_repo.is_member(group_id, sender_id).await? {
            return Err(AppError::Forbidden(
                "Only members can post to this group".to_string(),
            ));
        }

        let now = Utc::now();
        let model = group_message::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id.to_string()),
            sender_id: Set(sender_id.to_string()),
            text: Set(input.text),
            image_id: Set(input.image_id),
            file_id: Set(input.file_id),
            is_read: Set(false),
            is_edited: Set(false),
            is_revoked: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let message = self.group_message_repo.create(model).await?;

        if let Some(ref event_publisher) = self.event_publisher {
            if let Err(e) = event_publisher.publish_group_message(&message).await {
                tracing::warn!(error = %e, "Failed to publish group message event");
            }
        }

        Ok(message)
    }

    /// List messages in a group. Requires membership.
    pub async fn list(
        &self,
        actor_id: &str,
        group_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<group_message::Model>> {
        if !self.group_repo.is_member(group_id, actor_id).await? {
            return Err(AppError::Forbidden(
                "Only members can read this group".to_string(),
            ));
        }

        self.group_message_repo
            .find_by_group(group_id, limit, until_id)
            .await
    }

    /// Latest message in a group, for the group conversation listing.
    pub async fn latest_message(&self, group_id: &str) -> AppResult<Option<group_message::Model>> {
        self.group_message_repo.find_latest_in_group(group_id).await
    }

    /// Edit a group message. Sender-only; a revoked message cannot be edited.
    pub async fn edit(
        &self,
        actor_id: &str,
        message_id: &str,
        input: UpdateMessageInput,
    ) -> AppResult<group_message::Model> {
        let message = self.group_message_repo.get_by_id(message_id).await?;

        if message.sender_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the sender can edit this message".to_string(),
            ));
        }

        if message.is_revoked {
            return Err(AppError::Conflict(
                "Cannot edit a revoked message".to_string(),
            ));
        }

        let mut active: group_message::ActiveModel = message.into();

        if let Some(text) = input.text {
            active.text = Set(Some(text));
        }
        if let Some(image_id) = input.image_id {
            active.image_id = Set(Some(image_id));
        }
        if let Some(file_id) = input.file_id {
            active.file_id = Set(Some(file_id));
        }
        active.is_edited = Set(true);
        active.updated_at = Set(Utc::now().into());

        self.group_message_repo.update(active).await
    }

    /// Delete a group message. Sender-only.
    pub async fn delete(&self, actor_id: &str, message_id: &str) -> AppResult<()> {
        let message = self.group_message_repo.get_by_id(message_id).await?;

        if message.sender_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the sender can delete this message".to_string(),
            ));
        }

        self.group_message_repo.delete(message_id).await
    }

    /// Revoke a group message. Same guards as the direct-message revoke.
    pub async fn revoke(&self, actor_id: &str, message_id: &str) -> AppResult<group_message::Model> {
        let message = self.group_message_repo.get_by_id(message_id).await?;

        if message.sender_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the sender can revoke this message".to_string(),
            ));
        }

        if message.is_revoked {
            return Err(AppError::Conflict("Message already revoked".to_string()));
        }

        if !within_revoke_window(message.created_at, Utc::now()) {
            return Err(AppError::Validation(format!(
                "Messages can only be revoked within {REVOKE_WINDOW_SECS} seconds"
            )));
        }

        if message.text.is_none() && message.image_id.is_none() && message.file_id.is_none() {
            return Err(AppError::Validation(
                "Message has no content to revoke".to_string(),
            ));
        }

        let mut active: group_message::ActiveModel = message.into();
        active.is_revoked = Set(true);
        active.updated_at = Set(Utc::now().into());

        self.group_message_repo.update(active).await
    }

    /// Mark a group message as read. Any member may flip it; one-way.
    pub async fn mark_read(
        &self,
        actor_id: &str,
        message_id: &str,
    ) -> AppResult<group_message::Model> {
        let message = self.group_message_repo.get_by_id(message_id).await?;

        if !self.group_repo.is_member(&message.group_id, actor_id).await? {
            return Err(AppError::Forbidden(
                "Only members can mark this message read".to_string(),
            ));
        }

        if message.is_read {
            return Ok(message);
        }

        let mut active: group_message::ActiveModel = message.into();
        active.is_read = Set(true);

        self.group_message_repo.update(active).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn make_message(
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        created_at: DateTime<Utc>,
        is_read: bool,
    ) -> message::Model {
        message::Model {
            id: id.to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            text: Some("hi".to_string()),
            image_id: None,
            file_id: None,
            is_read,
            is_edited: false,
            is_revoked: false,
            created_at: created_at.into(),
            updated_at: created_at.into(),
        }
    }

    fn empty_db() -> Arc<sea_orm::DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn service_with_message(msg: message::Model) -> MessagingService {
        let message_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[msg]])
                .into_connection(),
        );
        MessagingService::new(
            MessageRepository::new(message_db),
            UserRepository::new(empty_db()),
        )
    }

    // === revoke window ===

    #[test]
    fn test_within_revoke_window_inside() {
        let now = Utc::now();
        let created: DateTime<FixedOffset> = (now - Duration::seconds(30)).into();
        assert!(within_revoke_window(created, now));
    }

    #[test]
    fn test_within_revoke_window_at_boundary() {
        let now = Utc::now();
        let created: DateTime<FixedOffset> = (now - Duration::seconds(REVOKE_WINDOW_SECS)).into();
        assert!(within_revoke_window(created, now));
    }

    #[test]
    fn test_within_revoke_window_expired() {
        let now = Utc::now();
        let created: DateTime<FixedOffset> =
            (now - Duration::seconds(REVOKE_WINDOW_SECS + 1)).into();
        assert!(!within_revoke_window(created, now));
    }

    // === send validation ===

    #[tokio::test]
    async fn test_send_empty_message_is_validation_error() {
        let service = MessagingService::new(
            MessageRepository::new(empty_db()),
            UserRepository::new(empty_db()),
        );

        let result = service
            .send("user1", "user2", CreateMessageInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_whitespace_only_text_is_validation_error() {
        let service = MessagingService::new(
            MessageRepository::new(empty_db()),
            UserRepository::new(empty_db()),
        );

        let input = CreateMessageInput {
            text: Some("   ".to_string()),
            ..Default::default()
        };
        let result = service.send("user1", "user2", input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_to_self_is_validation_error() {
        let service = MessagingService::new(
            MessageRepository::new(empty_db()),
            UserRepository::new(empty_db()),
        );

        let input = CreateMessageInput {
            text: Some("hello me".to_string()),
            ..Default::default()
        };
        let result = service.send("user1", "user1", input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    // === lifecycle guards ===

    #[tokio::test]
    async fn test_edit_by_non_sender_is_forbidden() {
        let msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        let service = service_with_message(msg);

        let result = service
            .edit("recipient", "m1", UpdateMessageInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_by_non_sender_is_forbidden() {
        let msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        let service = service_with_message(msg);

        let result = service.delete("recipient", "m1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_revoke_by_non_sender_is_forbidden() {
        let msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        let service = service_with_message(msg);

        let result = service.revoke("recipient", "m1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_revoke_already_revoked_is_conflict() {
        let mut msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        msg.is_revoked = true;
        let service = service_with_message(msg);

        let result = service.revoke("sender", "m1").await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_revoke_after_window_is_validation_error() {
        let created = Utc::now() - Duration::seconds(REVOKE_WINDOW_SECS + 5);
        let msg = make_message("m1", "sender", "recipient", created, false);
        let service = service_with_message(msg);

        let result = service.revoke("sender", "m1").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_revoke_empty_message_is_validation_error() {
        let mut msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        msg.text = None;
        let service = service_with_message(msg);

        let result = service.revoke("sender", "m1").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_edit_revoked_message_is_conflict() {
        let mut msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        msg.is_revoked = true;
        let service = service_with_message(msg);

        let result = service
            .edit("sender", "m1", UpdateMessageInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mark_read_by_non_recipient_is_forbidden() {
        let msg = make_message("m1", "sender", "recipient", Utc::now(), false);
        let service = service_with_message(msg);

        let result = service.mark_read("sender", "m1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_mark_read_already_read_is_idempotent() {
        let msg = make_message("m1", "sender", "recipient", Utc::now(), true);
        let service = service_with_message(msg);

        let result = service.mark_read("recipient", "m1").await.unwrap();

        assert!(result.is_read);
    }

    // === conversation aggregation ===

    #[test]
    fn test_aggregate_conversations_uses_latest_message() {
        let t1 = Utc::now() - Duration::minutes(10);
        let t2 = Utc::now() - Duration::minutes(5);

        // A→B at t1, B→A at t2 (unread by A)
        let history = vec![
            make_message("m1", "A", "B", t1, true),
            make_message("m2", "B", "A", t2, false),
        ];

        let summaries = aggregate_conversations("A", &history);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].partner_id, "B");
        assert_eq!(summaries[0].last_message.id, "m2");
        assert_eq!(summaries[0].unread_count, 1);
    }

    #[test]
    fn test_aggregate_conversations_unread_counts_only_inbound() {
        let t = Utc::now();

        // Two unread messages sent BY the requester must not count
        let history = vec![
            make_message("m1", "A", "B", t - Duration::minutes(3), false),
            make_message("m2", "A", "B", t - Duration::minutes(2), false),
            make_message("m3", "B", "A", t - Duration::minutes(1), false),
        ];

        let summaries = aggregate_conversations("A", &history);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 1);
    }

    #[test]
    fn test_aggregate_conversations_sorted_by_recency() {
        let t = Utc::now();

        let history = vec![
            make_message("m1", "A", "B", t - Duration::minutes(30), true),
            make_message("m2", "C", "A", t - Duration::minutes(5), false),
            make_message("m3", "A", "D", t - Duration::minutes(10), true),
        ];

        let summaries = aggregate_conversations("A", &history);

        let partners: Vec<&str> = summaries.iter().map(|s| s.partner_id.as_str()).collect();
        assert_eq!(partners, vec!["C", "D", "B"]);
    }

    #[test]
    fn test_aggregate_conversations_empty_history() {
        let summaries = aggregate_conversations("A", &[]);
        assert!(summaries.is_empty());
    }

    // === group messaging guards ===

    #[tokio::test]
    async fn test_group_send_empty_message_is_validation_error() {
        let service = GroupMessagingService::new(
            GroupMessageRepository::new(empty_db()),
            GroupRepository::new(empty_db()),
        );

        let result = service
            .send("user1", "g1", CreateMessageInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_group_list_by_non_member_is_forbidden() {
        use ripple_db::entities::group_member;

        let group_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_member::Model>::new()])
                .into_connection(),
        );

        let service = GroupMessagingService::new(
            GroupMessageRepository::new(empty_db()),
            GroupRepository::new(group_db),
        );

        let result = service.list("outsider", "g1", 50, None).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
