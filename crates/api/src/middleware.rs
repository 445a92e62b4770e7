//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use ripple_core::{
    AttachmentService, AuthService, CommentService, FollowingService, GroupMessagingService,
    GroupService, LikeService, MessagingService, NotificationService, PostService, UserService,
};

use crate::streaming::ChatHub;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub following_service: FollowingService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub like_service: LikeService,
    pub notification_service: NotificationService,
    pub messaging_service: MessagingService,
    pub group_service: GroupService,
    pub group_messaging_service: GroupMessagingService,
    pub attachment_service: AttachmentService,
    pub chat_hub: ChatHub,
    /// Public URL of this instance, for absolute attachment URLs.
    pub public_url: String,
}

impl AppState {
    /// Resolve a storage-relative URL to an absolute one.
    #[must_use]
    pub fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.public_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

/// Authentication middleware.
///
/// Verifies a `Bearer` access token and stashes the resolved user in the
/// request extensions for [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                if let Ok(user_id) = state.auth_service.verify_access(token) {
                    if let Ok(user) = state.user_service.get(&user_id).await {
                        req.extensions_mut().insert(user);
                    }
                }
            }
        }
    }

    next.run(req).await
}
