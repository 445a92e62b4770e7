//! Direct message repository.

use std::sync::Arc;

use crate::entities::{message, Message};
use ripple_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Direct message repository for database operations.
#[derive(Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a message by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<message::Model>> {
        Message::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a message by ID, failing if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<message::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message not found: {id}")))
    }

    /// Create a new message.
    pub async fn create(&self, model: message::ActiveModel) -> AppResult<message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a message.
    pub async fn update(&self, model: message::ActiveModel) -> AppResult<message::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a message by ID.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Message::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find messages exchanged between two users, chronological.
    pub async fn find_conversation(
        &self,
        user_id: &str,
        partner_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<message::Model>> {
        let mut query = Message::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(message::Column::SenderId.eq(user_id))
                            .add(message::Column::RecipientId.eq(partner_id)),
                    )
                    .add(
                        Condition::all()
                            .add(message::Column::SenderId.eq(partner_id))
                            .add(message::Column::RecipientId.eq(user_id)),
                    ),
            )
            .order_by_asc(message::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(message::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load the full message history of a user (sent or received).
    ///
    /// Unbounded: the conversation-list aggregation scans the whole
    /// history on every request.
    pub async fn find_all_for_user(&self, user_id: &str) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(
                Condition::any()
                    .add(message::Column::SenderId.eq(user_id))
                    .add(message::Column::RecipientId.eq(user_id)),
            )
            .order_by_asc(message::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count unread messages sent by `partner_id` to `user_id`.
    pub async fn count_unread_from(&self, user_id: &str, partner_id: &str) -> AppResult<u64> {
        Message::find()
            .filter(message::Column::SenderId.eq(partner_id))
            .filter(message::Column::RecipientId.eq(user_id))
            .filter(message::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
