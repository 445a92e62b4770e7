//! Stored file repository.

use std::sync::Arc;

use crate::entities::{stored_file, StoredFile};
use ripple_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Stored file repository for database operations.
#[derive(Clone)]
pub struct StoredFileRepository {
    db: Arc<DatabaseConnection>,
}

impl StoredFileRepository {
    /// Create a new stored file repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a stored file by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<stored_file::Model>> {
        StoredFile::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a stored file by ID, failing if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<stored_file::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File not found: {id}")))
    }

    /// Create a new stored file row.
    pub async fn create(&self, model: stored_file::ActiveModel) -> AppResult<stored_file::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a stored file row.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        StoredFile::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List files uploaded by a user.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<stored_file::Model>> {
        StoredFile::find()
            .filter(stored_file::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
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

    fn create_test_file(id: &str, user_id: &str) -> stored_file::Model {
        stored_file::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            size: 1024,
            url: "/files/photo.png".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let file = create_test_file("f1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[file.clone()]])
                .into_connection(),
        );

        let repo = StoredFileRepository::new(db);
        let result = repo.find_by_id("f1").await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().content_type, "image/png");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<stored_file::Model>::new()])
                .into_connection(),
        );

        let repo = StoredFileRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
