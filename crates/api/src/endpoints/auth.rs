//! Authentication endpoints.

use axum::{extract::State, routing::post, Json, Router};
use ripple_common::AppResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    endpoints::users::{user_detail, UserDetailResponse},
    extractors::AuthUser,
    middleware::AppState,
    response::ApiResponse,
};

/// Register request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 128))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Auth response: the user plus a token pair.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserDetailResponse,
    pub access: String,
    pub refresh: String,
}

/// Create a new user account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    req.validate()?;

    let input = ripple_core::CreateUserInput {
        username: req.username,
        email: req.email,
        password: req.password,
    };

    let user = state.user_service.create(input).await?;
    let pair = state.auth_service.issue_pair(&user.id)?;

    tracing::info!(user_id = %user.id, "Registered new user");

    let user = user_detail(&state, &user, None).await?;

    Ok(ApiResponse::ok(AuthResponse {
        user,
        access: pair.access,
        refresh: pair.refresh,
    }))
}

/// Login request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign in to an existing account.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let user = state
        .user_service
        .authenticate(&req.email, &req.password)
        .await?;

    let pair = state.auth_service.issue_pair(&user.id)?;
    let user = user_detail(&state, &user, None).await?;

    Ok(ApiResponse::ok(AuthResponse {
        user,
        access: pair.access,
        refresh: pair.refresh,
    }))
}

/// Refresh request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh response: a new token pair.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
}

/// Exchange a refresh token for a new pair.
async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiResponse<RefreshResponse>> {
    let pair = state.auth_service.refresh(&req.refresh)?;

    Ok(ApiResponse::ok(RefreshResponse {
        access: pair.access,
        refresh: pair.refresh,
    }))
}

/// Get the authenticated user's profile.
async fn me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserDetailResponse>> {
    let detail = user_detail(&state, &user, Some(&user.id)).await?;
    Ok(ApiResponse::ok(detail))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", axum::routing::get(me))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let bad = RegisterRequest {
            username: "alice".to_string(),
            email: "not-an-email".to_string(),
            password: "password123".to_string(),
        };
        assert!(bad.validate().is_err());

        let good = RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(good.validate().is_ok());
    }
}
