//! Follow graph endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use ripple_common::AppResult;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    endpoints::users::{user_summary, UserSummaryResponse},
    extractors::AuthUser,
    middleware::AppState,
    response::ApiResponse,
};

/// Create following router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}/follow", post(follow))
        .route("/{user_id}/unfollow", post(unfollow))
        .route("/{user_id}/followers", get(list_followers))
        .route("/{user_id}/following", get(list_following))
}

/// Follow state response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub following: bool,
}

/// Follow a user. Repeat calls are not errors.
async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<FollowResponse>> {
    info!(follower = %user.id, followee = %user_id, "Following user");

    state.following_service.follow(&user.id, &user_id).await?;

    Ok(ApiResponse::ok(FollowResponse { following: true }))
}

/// Unfollow a user. Idempotent.
async fn unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<FollowResponse>> {
    info!(follower = %user.id, followee = %user_id, "Unfollowing user");

    state.following_service.unfollow(&user.id, &user_id).await?;

    Ok(ApiResponse::ok(FollowResponse { following: false }))
}

/// Pagination query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowListQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    50
}

/// Follower/following list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowListResponse {
    pub users: Vec<UserSummaryResponse>,
}

/// List the followers of a user.
async fn list_followers(
    AuthUser(_viewer): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FollowListQuery>,
) -> AppResult<ApiResponse<FollowListResponse>> {
    let edges = state
        .following_service
        .get_followers(&user_id, query.limit, query.until_id.as_deref())
        .await?;

    let mut users = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Ok(follower) = state.user_service.get(&edge.follower_id).await {
            users.push(user_summary(&state, &follower).await?);
        }
    }

    Ok(ApiResponse::ok(FollowListResponse { users }))
}

/// List the users a user is following.
async fn list_following(
    AuthUser(_viewer): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FollowListQuery>,
) -> AppResult<ApiResponse<FollowListResponse>> {
    let edges = state
        .following_service
        .get_following(&user_id, query.limit, query.until_id.as_deref())
        .await?;

    let mut users = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Ok(followee) = state.user_service.get(&edge.followee_id).await {
            users.push(user_summary(&state, &followee).await?);
        }
    }

    Ok(ApiResponse::ok(FollowListResponse { users }))
}
