//! Notification endpoints. Pull-only: clients poll these listings.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use ripple_common::AppResult;
use ripple_db::entities::notification::{self, NotificationType};
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{notification_id}/read", post(mark_read))
}

/// Notification response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub actor_id: String,
    pub notification_type: NotificationType,
    pub post_id: Option<String>,
    pub comment_text: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notification::Model> for NotificationResponse {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            actor_id: n.actor_id,
            notification_type: n.notification_type,
            post_id: n.post_id,
            comment_text: n.comment_text,
            is_read: n.is_read,
            created_at: n.created_at.into(),
        }
    }
}

/// Listing query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
}

const fn default_limit() -> u64 {
    50
}

/// Notification list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
}

/// List the authenticated user's notifications, newest first.
async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<ApiResponse<NotificationListResponse>> {
    let notifications = state
        .notification_service
        .list(
            &user.id,
            query.limit,
            query.until_id.as_deref(),
            query.unread_only,
        )
        .await?;

    let notifications = notifications
        .into_iter()
        .map(NotificationResponse::from)
        .collect();

    Ok(ApiResponse::ok(NotificationListResponse { notifications }))
}

/// Mark a single notification as read. Idempotent.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state
        .notification_service
        .mark_as_read(&user.id, &notification_id)
        .await?;

    Ok(ApiResponse::ok(()))
}

/// Mark-all response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub marked: u64,
}

/// Mark every unread notification as read.
async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MarkAllReadResponse>> {
    let marked = state.notification_service.mark_all_as_read(&user.id).await?;

    Ok(ApiResponse::ok(MarkAllReadResponse { marked }))
}

/// Unread count response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Count unread notifications.
async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let count = state.notification_service.count_unread(&user.id).await?;

    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_response_serialization() {
        let response = NotificationResponse {
            id: "n1".to_string(),
            actor_id: "u2".to_string(),
            notification_type: NotificationType::Like,
            post_id: Some("p1".to_string()),
            comment_text: None,
            is_read: false,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"notificationType\":\"like\""));
        assert!(json.contains("\"isRead\":false"));
    }
}
