//! User profile endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use ripple_common::AppResult;
use ripple_db::entities::user;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/search", get(search_users))
        .route("/me", put(update_me))
        .route("/{user_id}", get(get_user))
}

/// Slim user representation for listings and embeddings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryResponse {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Full user profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub avatar: Option<String>,
    pub followers_count: u64,
    pub following_count: u64,
    pub is_following: bool,
}

/// Resolve a user's avatar to an absolute URL, if set.
pub(crate) async fn avatar_url(state: &AppState, user: &user::Model) -> AppResult<Option<String>> {
    let Some(ref avatar_id) = user.avatar_id else {
        return Ok(None);
    };

    match state.attachment_service.get(avatar_id).await {
        Ok(file) => Ok(Some(state.absolute_url(&file.url))),
        Err(_) => Ok(None),
    }
}

/// Build a slim user summary.
pub(crate) async fn user_summary(
    state: &AppState,
    user: &user::Model,
) -> AppResult<UserSummaryResponse> {
    Ok(UserSummaryResponse {
        id: user.id.clone(),
        username: user.username.clone(),
        bio: user.bio.clone(),
        avatar: avatar_url(state, user).await?,
    })
}

/// Build a full user profile relative to an optional viewer.
pub(crate) async fn user_detail(
    state: &AppState,
    user: &user::Model,
    viewer_id: Option<&str>,
) -> AppResult<UserDetailResponse> {
    let followers_count = state.following_service.count_followers(&user.id).await?;
    let following_count = state.following_service.count_following(&user.id).await?;

    let is_following = match viewer_id {
        Some(viewer_id) if viewer_id != user.id => {
            state
                .following_service
                .is_following(viewer_id, &user.id)
                .await?
        }
        _ => false,
    };

    Ok(UserDetailResponse {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        bio: user.bio.clone(),
        birth_date: user.birth_date,
        avatar: avatar_url(state, user).await?,
        followers_count,
        following_count,
        is_following,
    })
}

/// List query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

/// User list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserSummaryResponse>,
}

/// List users, excluding the requester.
async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<ApiResponse<UserListResponse>> {
    let users = state
        .user_service
        .list(&user.id, query.limit, query.offset)
        .await?;

    let mut summaries = Vec::with_capacity(users.len());
    for u in &users {
        summaries.push(user_summary(&state, u).await?);
    }

    Ok(ApiResponse::ok(UserListResponse { users: summaries }))
}

/// Search query.
#[derive(Debug, Deserialize)]
pub struct SearchUsersQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

/// Substring search over username, email and bio.
async fn search_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchUsersQuery>,
) -> AppResult<ApiResponse<UserListResponse>> {
    let users = state
        .user_service
        .search(&user.id, &query.q, query.limit)
        .await?;

    let mut summaries = Vec::with_capacity(users.len());
    for u in &users {
        summaries.push(user_summary(&state, u).await?);
    }

    Ok(ApiResponse::ok(UserListResponse { users: summaries }))
}

/// Get a user profile by ID.
async fn get_user(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<UserDetailResponse>> {
    let user = state.user_service.get(&user_id).await?;
    let detail = user_detail(&state, &user, Some(&viewer.id)).await?;

    Ok(ApiResponse::ok(detail))
}

/// Update profile request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub avatar_id: Option<String>,
}

/// Update the authenticated user's profile.
async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<ApiResponse<UserDetailResponse>> {
    // An avatar must reference an uploaded image
    if let Some(ref avatar_id) = req.avatar_id {
        state
            .attachment_service
            .require_kind(avatar_id, ripple_core::AttachmentKind::Image)
            .await?;
    }

    let input = ripple_core::UpdateUserInput {
        username: req.username,
        bio: req.bio,
        birth_date: req.birth_date,
        avatar_id: req.avatar_id,
    };

    let updated = state.user_service.update(&user.id, input).await?;
    let detail = user_detail(&state, &updated, Some(&user.id)).await?;

    Ok(ApiResponse::ok(detail))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_detail_serialization() {
        let response = UserDetailResponse {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            bio: None,
            birth_date: None,
            avatar: None,
            followers_count: 3,
            following_count: 1,
            is_following: true,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"followersCount\":3"));
        assert!(json.contains("\"isFollowing\":true"));
    }
}
