//! Group chat repository, covering groups and their memberships.

use std::sync::Arc;

use crate::entities::{group_chat, group_member, GroupChat, GroupMember};
use ripple_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};

/// Group chat repository for database operations.
#[derive(Clone)]
pub struct GroupRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupRepository {
    /// Create a new group repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a group by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<group_chat::Model>> {
        GroupChat::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a group by ID, failing if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<group_chat::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group not found: {id}")))
    }

    /// Create a new group.
    pub async fn create(&self, model: group_chat::ActiveModel) -> AppResult<group_chat::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a group.
    pub async fn update(&self, model: group_chat::ActiveModel) -> AppResult<group_chat::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a group by ID.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        GroupChat::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ==================== Membership ====================

    /// Find a membership row.
    pub async fn find_member(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Option<group_member::Model>> {
        GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is a member of a group.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.find_member(group_id, user_id).await?.is_some())
    }

    /// Add a member to a group.
    pub async fn add_member(
        &self,
        model: group_member::ActiveModel,
    ) -> AppResult<group_member::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove a member from a group.
    pub async fn remove_member(&self, group_id: &str, user_id: &str) -> AppResult<()> {
        let member = self.find_member(group_id, user_id).await?;
        if let Some(m) = member {
            m.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// List members of a group, oldest first.
    pub async fn list_members(&self, group_id: &str) -> AppResult<Vec<group_member::Model>> {
        GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .order_by_asc(group_member::Column::JoinedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count members of a group.
    pub async fn count_members(&self, group_id: &str) -> AppResult<u64> {
        GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every group a user belongs to.
    pub async fn find_joined_by_user(&self, user_id: &str) -> AppResult<Vec<group_chat::Model>> {
        let memberships = GroupMember::find()
            .filter(group_member::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let group_ids: Vec<String> = memberships.into_iter().map(|m| m.group_id).collect();
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        GroupChat::find()
            .filter(group_chat::Column::Id.is_in(group_ids))
            .order_by_desc(group_chat::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List the group IDs a user belongs to (for websocket topic enumeration).
    pub async fn joined_group_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let memberships = GroupMember::find()
            .filter(group_member::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(memberships.into_iter().map(|m| m.group_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_group(id: &str, created_by: &str) -> group_chat::Model {
        group_chat::Model {
            id: id.to_string(),
            name: "team".to_string(),
            description: None,
            avatar_id: None,
            created_by: created_by.to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_member(id: &str, group_id: &str, user_id: &str) -> group_member::Model {
        group_member::Model {
            id: id.to_string(),
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            joined_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_chat::Model>::new()])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_is_member_true() {
        let member = create_test_member("gm1", "g1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[member.clone()]])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.is_member("g1", "user1").await.unwrap();

        assert!(result);
    }

    #[tokio::test]
    async fn test_is_member_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_member::Model>::new()])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.is_member("g1", "user2").await.unwrap();

        assert!(!result);
    }

    #[tokio::test]
    async fn test_find_joined_by_user_empty() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_member::Model>::new()])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.find_joined_by_user("user1").await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_joined_group_ids() {
        let m1 = create_test_member("gm1", "g1", "user1");
        let m2 = create_test_member("gm2", "g2", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[m1, m2]])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.joined_group_ids("user1").await.unwrap();

        assert_eq!(result, vec!["g1".to_string(), "g2".to_string()]);
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let group = create_test_group("g1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group.clone()]])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.find_by_id("g1").await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().created_by, "user1");
    }
}
