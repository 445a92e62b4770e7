//! Direct messaging endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ripple_common::AppResult;
use ripple_db::entities::message;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    endpoints::users::{user_summary, UserSummaryResponse},
    extractors::AuthUser,
    middleware::AppState,
    response::ApiResponse,
};

/// Create messaging router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/messages", post(send_message))
        .route("/messages/{message_id}", axum::routing::put(edit_message).delete(delete_message))
        .route("/messages/{message_id}/revoke", post(revoke_message))
        .route("/messages/{message_id}/read", post(mark_read))
        .route("/history/{user_id}", get(get_conversation))
}

/// Message response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub file: Option<String>,
    pub is_read: bool,
    pub is_edited: bool,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) async fn message_response(
    state: &AppState,
    msg: message::Model,
) -> MessageResponse {
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

    MessageResponse {
        id: msg.id,
        sender_id: msg.sender_id,
        recipient_id: msg.recipient_id,
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

/// One aggregated conversation entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub user: UserSummaryResponse,
    pub last_message: MessageResponse,
    pub unread_count: u64,
}

/// Conversation list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationResponse>,
}

/// List the authenticated user's conversations, most recent first.
async fn list_conversations(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ConversationListResponse>> {
    let summaries = state.messaging_service.list_conversations(&user.id).await?;

    let mut conversations = Vec::with_capacity(summaries.len());
    for summary in summaries {
        // Counterparts deleted since their last message are skipped
        let Ok(partner) = state.user_service.get(&summary.partner_id).await else {
            continue;
        };

        conversations.push(ConversationResponse {
            user: user_summary(&state, &partner).await?,
            last_message: message_response(&state, summary.last_message).await,
            unread_count: summary.unread_count,
        });
    }

    Ok(ApiResponse::ok(ConversationListResponse { conversations }))
}

/// Conversation history query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    50
}

/// Message list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
}

/// Get messages exchanged with another user.
async fn get_conversation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> AppResult<ApiResponse<MessageListResponse>> {
    let messages = state
        .messaging_service
        .conversation(&user.id, &user_id, query.limit, query.until_id.as_deref())
        .await?;

    let mut responses = Vec::with_capacity(messages.len());
    for msg in messages {
        responses.push(message_response(&state, msg).await);
    }

    Ok(ApiResponse::ok(MessageListResponse { messages: responses }))
}

/// Send message request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub file_id: Option<String>,
}

/// Send a direct message.
async fn send_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<ApiResponse<MessageResponse>> {
    info!(sender = %user.id, recipient = %req.recipient_id, "Sending message");

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
        .messaging_service
        .send(&user.id, &req.recipient_id, input)
        .await?;

    Ok(ApiResponse::ok(message_response(&state, message).await))
}

/// Edit message request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub file_id: Option<String>,
}

/// Edit a message. Sender-only.
async fn edit_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<EditMessageRequest>,
) -> AppResult<ApiResponse<MessageResponse>> {
    let input = ripple_core::UpdateMessageInput {
        text: req.text,
        image_id: req.image_id,
        file_id: req.file_id,
    };

    let message = state
        .messaging_service
        .edit(&user.id, &message_id, input)
        .await?;

    Ok(ApiResponse::ok(message_response(&state, message).await))
}

/// Delete a message. Sender-only.
async fn delete_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    info!(actor = %user.id, message = %message_id, "Deleting message");

    state.messaging_service.delete(&user.id, &message_id).await?;

    Ok(ApiResponse::ok(()))
}

/// Revoke a message. Sender-only, time-boxed.
async fn revoke_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<MessageResponse>> {
    info!(actor = %user.id, message = %message_id, "Revoking message");

    let message = state.messaging_service.revoke(&user.id, &message_id).await?;

    Ok(ApiResponse::ok(message_response(&state, message).await))
}

/// Mark a message as read. Recipient-only.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<MessageResponse>> {
    let message = state
        .messaging_service
        .mark_read(&user.id, &message_id)
        .await?;

    Ok(ApiResponse::ok(message_response(&state, message).await))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_response_serialization() {
        let response = MessageResponse {
            id: "m1".to_string(),
            sender_id: "u1".to_string(),
            recipient_id: "u2".to_string(),
            text: Some("Hello!".to_string()),
            image: None,
            file: None,
            is_read: false,
            is_edited: false,
            is_revoked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"text\":\"Hello!\""));
        assert!(json.contains("\"isRead\":false"));
        assert!(json.contains("\"isRevoked\":false"));
    }
}
