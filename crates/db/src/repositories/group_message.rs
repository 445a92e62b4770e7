//! Group message repository.

use std::sync::Arc;

use crate::entities::{group_message, GroupMessage};
use ripple_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Group message repository for database operations.
#[derive(Clone)]
pub struct GroupMessageRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupMessageRepository {
    /// Create a new group message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a group message by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<group_message::Model>> {
        GroupMessage::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a group message by ID, failing if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<group_message::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group message not found: {id}")))
    }

    /// Create a new group message.
    pub async fn create(&self, model: group_message::ActiveModel) -> AppResult<group_message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a group message.
    pub async fn update(&self, model: group_message::ActiveModel) -> AppResult<group_message::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a group message by ID.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        GroupMessage::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List messages in a group, chronological.
    pub async fn find_by_group(
        &self,
        group_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<group_message::Model>> {
        let mut query = GroupMessage::find()
            .filter(group_message::Column::GroupId.eq(group_id))
            .order_by_asc(group_message::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(group_message::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the latest message in a group.
    pub async fn find_latest_in_group(
        &self,
        group_id: &str,
    ) -> AppResult<Option<group_message::Model>> {
        GroupMessage::find()
            .filter(group_message::Column::GroupId.eq(group_id))
            .order_by_desc(group_message::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_group_message(id: &str, group_id: &str, sender_id: &str) -> group_message::Model {
        group_message::Model {
            id: id.to_string(),
            group_id: group_id.to_string(),
            sender_id: sender_id.to_string(),
            text: Some("hello group".to_string()),
            image_id: None,
            file_id: None,
            is_read: false,
            is_edited: false,
            is_revoked: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_group() {
        let m1 = create_test_group_message("m1", "g1", "user1");
        let m2 = create_test_group_message("m2", "g1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[m1, m2]])
                .into_connection(),
        );

        let repo = GroupMessageRepository::new(db);
        let result = repo.find_by_group("g1", 50, None).await.unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_find_latest_in_group_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_message::Model>::new()])
                .into_connection(),
        );

        let repo = GroupMessageRepository::new(db);
        let result = repo.find_latest_in_group("g1").await.unwrap();

        assert!(result.is_none());
    }
}
