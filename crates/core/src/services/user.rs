//! User service.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{NaiveDate, Utc};
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 128))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for updating a user profile.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 128))]
    pub username: Option<String>,

    #[validate(length(max = 500))]
    pub bio: Option<String>,

    pub birth_date: Option<NaiveDate>,

    /// Avatar stored-file ID (validated by the API layer).
    pub avatar_id: Option<String>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user.
    pub async fn create(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        // Check if username is taken
        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Validation("Username already taken".to_string()));
        }

        // Check if email is taken
        if self.user_repo.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::Validation("Email already registered".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            email: Set(input.email),
            password_hash: Set(password_hash),
            bio: Set(None),
            birth_date: Set(None),
            avatar_id: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.user_repo.create(model).await
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Authenticate a user by email and password.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        verify_password(password, &user.password_hash)?;

        Ok(user)
    }

    /// Update a user's profile.
    pub async fn update(&self, user_id: &str, input: UpdateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(username) = input.username {
            // Reject a rename onto an existing name (other than our own)
            if let Some(existing) = self.user_repo.find_by_username(&username).await? {
                if existing.id != user_id {
                    return Err(AppError::Validation("Username already taken".to_string()));
                }
            }
            active.username_lower = Set(username.to_lowercase());
            active.username = Set(username);
        }
        if let Some(bio) = input.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(birth_date) = input.birth_date {
            active.birth_date = Set(Some(birth_date));
        }
        if let Some(avatar_id) = input.avatar_id {
            active.avatar_id = Set(Some(avatar_id));
        }

        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// List users, excluding the requester.
    pub async fn list(&self, requester_id: &str, limit: u64, offset: u64) -> AppResult<Vec<user::Model>> {
        self.user_repo.list_excluding(requester_id, limit, offset).await
    }

    /// Substring search over username, email and bio.
    pub async fn search(
        &self,
        requester_id: &str,
        query: &str,
        limit: u64,
    ) -> AppResult<Vec<user::Model>> {
        if query.trim().is_empty() {
            return self.user_repo.list_excluding(requester_id, limit, 0).await;
        }
        self.user_repo.search(query, requester_id, limit).await
    }
}

/// Hash a password with argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against an argon2 hash.
fn verify_password(password: &str, hash: &str) -> AppResult<()> {
    let parsed = PasswordHash::new(hash).map_err(|_| AppError::Unauthorized)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str, email: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: email.to_string(),
            password_hash: hash_password("password123").unwrap(),
            bio: None,
            birth_date: None,
            avatar_id: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash).is_ok());
        assert!(verify_password("wrong-password", &hash).is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_taken_username() {
        let existing = create_test_user("u1", "alice", "alice@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let service = UserService::new(UserRepository::new(db));
        let result = service
            .create(CreateUserInput {
                username: "alice".to_string(),
                email: "new@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_taken_email() {
        let existing = create_test_user("u1", "alice", "alice@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // username check comes back empty, email check hits
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[existing]])
                .into_connection(),
        );

        let service = UserService::new(UserRepository::new(db));
        let result = service
            .create(CreateUserInput {
                username: "bob".to_string(),
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_short_password() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = UserService::new(UserRepository::new(db));
        let result = service
            .create(CreateUserInput {
                username: "carol".to_string(),
                email: "carol@example.com".to_string(),
                password: "short".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_email() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let service = UserService::new(UserRepository::new(db));
        let result = service.authenticate("ghost@example.com", "whatever").await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let existing = create_test_user("u1", "alice", "alice@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let service = UserService::new(UserRepository::new(db));
        let result = service.authenticate("alice@example.com", "wrong-password").await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
