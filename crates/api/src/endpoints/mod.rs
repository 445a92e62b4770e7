//! API endpoints.

mod auth;
mod files;
mod following;
mod groups;
mod messaging;
mod notifications;
mod posts;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/users", users::router())
        .nest("/following", following::router())
        .nest("/posts", posts::router())
        .nest("/notifications", notifications::router())
        .nest("/messaging", messaging::router())
        .nest("/groups", groups::router())
        .nest("/files", files::router())
}
