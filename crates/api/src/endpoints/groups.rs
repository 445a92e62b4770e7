//! Group chat endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ripple_common::AppResult;
use ripple_db::entities::{group_chat, group_message};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create groups router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route(
            "/{group_id}",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/{group_id}/members", get(list_members).post(add_member))
        .route("/{group_id}/members/{user_id}", delete(remove_member))
        .route("/{group_id}/messages", get(list_messages).post(send_message))
        .route(
            "/messages/{message_id}",
            axum::routing::put(edit_message).delete(delete_message),
        )
        .route("/messages/{message_id}/revoke", post(revoke_message))
        .route("/messages/{message_id}/read", post(mark_read))
}

/// Group response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<GroupMessageResponse>,
}

/// Group message response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageResponse {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub file: Option<String>,
    pub is_read: bool,
    pub is_edited: bool,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

async fn group_message_response(state: &AppState, msg: group_message::Model) -> GroupMessageResponse {
    let resolve = |id: Option<String>| async move {
        match id {
            Some(file_id) => match state.attachment_service.get(&file_id).await {
                Ok(file) => Some(state.absolute_url(&file.url)),
                Err(_) => None,
            },
            None => None,
        }
    };

    let image = resolve(msg.image_id.clone()).await;
    let file = resolve(msg.file_id.clone()).await;

    GroupMessageResponse {
        id: msg.id,
        group_id: msg.group_id,
        sender_id: msg.sender_id,
        text: msg.text,
        image,
        file,
        is_read: msg.is_read,
        is_edited: msg.is_edited,
        is_revoked: msg.is_revoked,
        created_at: msg.created_at.into(),
        updated_at: msg.updated_at.into(),
    }
}

async fn group_response(
    state: &AppState,
    group: group_chat::Model,
    last_message: Option<group_message::Model>,
) -> GroupResponse {
    let avatar = match group.avatar_id {
        Some(ref avatar_id) => match state.attachment_service.get(avatar_id).await {
            Ok(file) => Some(state.absolute_url(&file.url)),
            Err(_) => None,
        },
        None => None,
    };

    let last_message = match last_message {
        Some(msg) => Some(group_message_response(state, msg).await),
        None => None,
    };

    GroupResponse {
        id: group.id,
        name: group.name,
        description: group.description,
        avatar,
        created_by: group.created_by,
        created_at: group.created_at.into(),
        last_message,
    }
}

/// Group list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupListResponse {
    pub groups: Vec<GroupResponse>,
}

/// List every group the user belongs to, each with its latest message.
async fn list_groups(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<GroupListResponse>> {
    let groups = state.group_service.list_joined(&user.id).await?;

    let mut responses = Vec::with_capacity(groups.len());
    for group in groups {
        let last_message = state
            .group_messaging_service
            .latest_message(&group.id)
            .await?;
        responses.push(group_response(&state, group, last_message).await);
    }

    Ok(ApiResponse::ok(GroupListResponse { groups: responses }))
}

/// Create group request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub avatar_id: Option<String>,
}

/// Create a group; the creator becomes the first member.
async fn create_group(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> AppResult<ApiResponse<GroupResponse>> {
    info!(creator = %user.id, "Creating group");

    if let Some(ref avatar_id) = req.avatar_id {
        state
            .attachment_service
            .require_kind(avatar_id, ripple_core::AttachmentKind::Image)
            .await?;
    }

    let input = ripple_core::CreateGroupInput {
        name: req.name,
        description: req.description,
        avatar_id: req.avatar_id,
    };

    let group = state.group_service.create(&user.id, input).await?;

    Ok(ApiResponse::ok(group_response(&state, group, None).await))
}

/// Get a group by ID. Requires membership.
async fn get_group(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<ApiResponse<GroupResponse>> {
    let group = state.group_service.get(&group_id).await?;

    if !state.group_service.is_member(&group_id, &user.id).await? {
        return Err(ripple_common::AppError::Forbidden(
            "Only members can view this group".to_string(),
        ));
    }

    let last_message = state
        .group_messaging_service
        .latest_message(&group.id)
        .await?;

    Ok(ApiResponse::ok(
        group_response(&state, group, last_message).await,
    ))
}

/// Update group request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_id: Option<String>,
}

/// Update a group. Creator-only.
async fn update_group(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> AppResult<ApiResponse<GroupResponse>> {
    let input = ripple_core::UpdateGroupInput {
        name: req.name,
        description: req.description,
        avatar_id: req.avatar_id,
    };

    let group = state.group_service.update(&user.id, &group_id, input).await?;

    Ok(ApiResponse::ok(group_response(&state, group, None).await))
}

/// Delete a group. Creator-only.
async fn delete_group(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    info!(actor = %user.id, group = %group_id, "Deleting group");

    state.group_service.delete(&user.id, &group_id).await?;

    Ok(ApiResponse::ok(()))
}

/// Group member response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberResponse {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Member list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberListResponse {
    pub members: Vec<GroupMemberResponse>,
}

/// List group members. Requires membership.
async fn list_members(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<ApiResponse<GroupMemberListResponse>> {
    let members = state.group_service.list_members(&user.id, &group_id).await?;

    let members = members
        .into_iter()
        .map(|m| GroupMemberResponse {
            user_id: m.user_id,
            joined_at: m.joined_at.into(),
        })
        .collect();

    Ok(ApiResponse::ok(GroupMemberListResponse { members }))
}

/// Add member request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: String,
}

/// Add a member. Creator-only.
async fn add_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<ApiResponse<GroupMemberResponse>> {
    info!(actor = %user.id, group = %group_id, member = %req.user_id, "Adding group member");

    let member = state
        .group_service
        .add_member(&user.id, &group_id, &req.user_id)
        .await?;

    Ok(ApiResponse::ok(GroupMemberResponse {
        user_id: member.user_id,
        joined_at: member.joined_at.into(),
    }))
}

/// Remove a member: the creator may remove anyone but themselves; a
/// member may remove only themselves.
async fn remove_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<()>> {
    info!(actor = %user.id, group = %group_id, member = %user_id, "Removing group member");

    state
        .group_service
        .remove_member(&user.id, &group_id, &user_id)
        .await?;

    Ok(ApiResponse::ok(()))
}

/// Message list query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    50
}

/// Group message list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageListResponse {
    pub messages: Vec<GroupMessageResponse>,
}

/// List messages in a group. Requires membership.
async fn list_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<GroupMessagesQuery>,
) -> AppResult<ApiResponse<GroupMessageListResponse>> {
    let messages = state
        .group_messaging_service
        .list(&user.id, &group_id, query.limit, query.until_id.as_deref())
        .await?;

    let mut responses = Vec::with_capacity(messages.len());
    for msg in messages {
        responses.push(group_message_response(&state, msg).await);
    }

    Ok(ApiResponse::ok(GroupMessageListResponse {
        messages: responses,
    }))
}

/// Send group message request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGroupMessageRequest {
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub file_id: Option<String>,
}

/// Send a message to a group. Requires membership.
async fn send_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<SendGroupMessageRequest>,
) -> AppResult<ApiResponse<GroupMessageResponse>> {
    info!(sender = %user.id, group = %group_id, "Sending group message");

    if let Some(ref image_id) = req.image_id {
        state
            .attachment_service
            .require_kind(image_id, ripple_core::AttachmentKind::Image)
            .await?;
    }
    if let Some(ref file_id) = req.file_id {
        state
            .attachment_service
            .require_kind(file_id, ripple_core::AttachmentKind::Document)
            .await?;
    }

    let input = ripple_core::CreateMessageInput {
        text: req.text,
        image_id: req.image_id,
        file_id: req.file_id,
    };

    let message = state
        .group_messaging_service
        .send(&user.id, &group_id, input)
        .await?;

    Ok(ApiResponse::ok(group_message_response(&state, message).await))
}

/// Edit group message request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditGroupMessageRequest {
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub file_id: Option<String>,
}

/// Edit a group message. Sender-only.
async fn edit_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<EditGroupMessageRequest>,
) -> AppResult<ApiResponse<GroupMessageResponse>> {
    let input = ripple_core::UpdateMessageInput {
        text: req.text,
        image_id: req.image_id,
        file_id: req.file_id,
    };

    let message = state
        .group_messaging_service
        .edit(&user.id, &message_id, input)
        .await?;

    Ok(ApiResponse::ok(group_message_response(&state, message).await))
}

/// Delete a group message. Sender-only.
async fn delete_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    info!(actor = %user.id, message = %message_id, "Deleting group message");

    state
        .group_messaging_service
        .delete(&user.id, &message_id)
        .await?;

    Ok(ApiResponse::ok(()))
}

/// Revoke a group message. Sender-only, time-boxed.
async fn revoke_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<GroupMessageResponse>> {
    info!(actor = %user.id, message = %message_id, "Revoking group message");

    let message = state
        .group_messaging_service
        .revoke(&user.id, &message_id)
        .await?;

    Ok(ApiResponse::ok(group_message_response(&state, message).await))
}

/// Mark a group message as read. Any member.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<GroupMessageResponse>> {
    let message = state
        .group_messaging_service
        .mark_read(&user.id, &message_id)
        .await?;

    Ok(ApiResponse::ok(group_message_response(&state, message).await))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_group_response_serialization() {
        let response = GroupResponse {
            id: "g1".to_string(),
            name: "team".to_string(),
            description: None,
            avatar: None,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            last_message: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"createdBy\":\"u1\""));
    }
}
