//! Group chat service.

use chrono::Utc;
use ripple_common::{AppError, AppResult, IdGenerator};
use ripple_db::{
    entities::{group_chat, group_member},
    repositories::{GroupRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Input for creating a group.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
    pub avatar_id: Option<String>,
}

/// Input for updating a group.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupInput {
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
    pub avatar_id: Option<String>,
}

/// Service for managing group chats and their memberships.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository, user_repo: UserRepository) -> Self {
        Self {
            group_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a group by ID.
    pub async fn get(&self, id: &str) -> AppResult<group_chat::Model> {
        self.group_repo.get_by_id(id).await
    }

    /// Create a group. The creator becomes its first member.
    pub async fn create(
        &self,
        creator_id: &str,
        input: CreateGroupInput,
    ) -> AppResult<group_chat::Model> {
        input.validate()?;

        let now = Utc::now();
        let group_id = self.id_gen.generate();

        let model = group_chat::ActiveModel {
            id: Set(group_id.clone()),
            name: Set(input.name),
            description: Set(input.description),
            avatar_id: Set(input.avatar_id),
            created_by: Set(creator_id.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let group = self.group_repo.create(model).await?;

        let member = group_member::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id),
            user_id: Set(creator_id.to_string()),
            joined_at: Set(now.into()),
        };
        self.group_repo.add_member(member).await?;

        Ok(group)
    }

    /// Update a group. Creator-only.
    pub async fn update(
        &self,
        actor_id: &str,
        group_id: &str,
        input: UpdateGroupInput,
    ) -> AppResult<group_chat::Model> {
        input.validate()?;

        let group = self.group_repo.get_by_id(group_id).await?;

        if group.created_by != actor_id {
            return Err(AppError::Forbidden(
                "Only the creator can edit this group".to_string(),
            ));
        }

        let mut active: group_chat::ActiveModel = group.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(avatar_id) = input.avatar_id {
            active.avatar_id = Set(Some(avatar_id));
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.group_repo.update(active).await
    }

    /// Delete a group. Creator-only.
    pub async fn delete(&self, actor_id: &str, group_id: &str) -> AppResult<()> {
        let group = self.group_repo.get_by_id(group_id).await?;

        if group.created_by != actor_id {
            return Err(AppError::Forbidden(
                "Only the creator can delete this group".to_string(),
            ));
        }

        self.group_repo.delete(group_id).await
    }

    /// Add a member. Creator-only; adding an existing member is an error.
    pub async fn add_member(
        &self,
        actor_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<group_member::Model> {
        let group = self.group_repo.get_by_id(group_id).await?;

        if group.created_by != actor_id {
            return Err(AppError::Forbidden(
                "Only the creator can add members".to_string(),
            ));
        }

        let _user = self.user_repo.get_by_id(user_id).await?;

        if self.group_repo.is_member(group_id, user_id).await? {
            return Err(AppError::Validation(
                "User is already a member".to_string(),
            ));
        }

        let model = group_member::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id.to_string()),
            user_id: Set(user_id.to_string()),
            joined_at: Set(Utc::now().into()),
        };

        self.group_repo.add_member(model).await
    }

    /// Remove a member.
    ///
    /// The creator may remove anyone but themselves; a non-creator member
    /// may remove only themselves. The creator cannot leave: there is no
    /// ownership-transfer path.
    pub async fn remove_member(
        &self,
        actor_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        let group = self.group_repo.get_by_id(group_id).await?;

        if user_id == group.created_by {
            return Err(AppError::Forbidden(
                "The creator cannot be removed from the group".to_string(),
            ));
        }

        if actor_id != group.created_by && actor_id != user_id {
            return Err(AppError::Forbidden(
                "Members can only remove themselves".to_string(),
            ));
        }

        if !self.group_repo.is_member(group_id, user_id).await? {
            return Err(AppError::NotFound("User is not a member".to_string()));
        }

        self.group_repo.remove_member(group_id, user_id).await
    }

    /// List groups the user belongs to.
    pub async fn list_joined(&self, user_id: &str) -> AppResult<Vec<group_chat::Model>> {
        self.group_repo.find_joined_by_user(user_id).await
    }

    /// List members of a group. Requires membership.
    pub async fn list_members(
        &self,
        actor_id: &str,
        group_id: &str,
    ) -> AppResult<Vec<group_member::Model>> {
        if !self.group_repo.is_member(group_id, actor_id).await? {
            return Err(AppError::Forbidden(
                "Only members can list this group".to_string(),
            ));
        }

        self.group_repo.list_members(group_id).await
    }

    /// Check membership.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        self.group_repo.is_member(group_id, user_id).await
    }

    /// The group IDs a user belongs to, for websocket topic enumeration.
    pub async fn joined_group_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.group_repo.joined_group_ids(user_id).await
    }
}
