//! Post, comment and like endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ripple_common::AppResult;
use ripple_core::CommentNode;
use ripple_db::entities::{comment, post};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create posts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed).post(create_post))
        .route("/{post_id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{post_id}/comments", get(list_comments).post(create_comment))
        .route("/{post_id}/like", post(toggle_like))
        .route(
            "/comments/{comment_id}",
            axum::routing::put(update_comment).delete(delete_comment),
        )
        .route("/user/{user_id}", get(list_user_posts))
}

/// Post response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub author_id: String,
    pub author: String,
    pub is_following: bool,
    pub text: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub comments_count: u64,
    pub likes_count: u64,
    pub is_liked: bool,
}

/// Build a post DTO relative to the viewer.
async fn post_response(
    state: &AppState,
    viewer_id: &str,
    post: post::Model,
) -> AppResult<PostResponse> {
    let author = state.user_service.get(&post.user_id).await?;

    let is_following = if viewer_id == author.id {
        false
    } else {
        state
            .following_service
            .is_following(viewer_id, &author.id)
            .await?
    };

    let likes_count = state.like_service.count(&post.id).await?;
    let is_liked = state.like_service.has_liked(viewer_id, &post.id).await?;
    let comments_count = state.comment_service.count_for_post(&post.id).await?;

    let image = match post.image_id {
        Some(ref image_id) => match state.attachment_service.get(image_id).await {
            Ok(file) => Some(state.absolute_url(&file.url)),
            Err(_) => None,
        },
        None => None,
    };

    Ok(PostResponse {
        id: post.id,
        author_id: author.id,
        author: author.username,
        is_following,
        text: post.text,
        image,
        created_at: post.created_at.into(),
        updated_at: post.updated_at.map(Into::into),
        comments_count,
        likes_count,
        is_liked,
    })
}

async fn post_responses(
    state: &AppState,
    viewer_id: &str,
    posts: Vec<post::Model>,
) -> AppResult<Vec<PostResponse>> {
    let mut responses = Vec::with_capacity(posts.len());
    for p in posts {
        responses.push(post_response(state, viewer_id, p).await?);
    }
    Ok(responses)
}

/// Feed query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    /// Return every post instead of the following-filtered feed.
    #[serde(default)]
    pub all: bool,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    20
}

/// Post list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
}

/// The feed: posts by followed users plus self, or all posts.
async fn feed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<PostListResponse>> {
    let posts = state
        .post_service
        .feed(&user.id, query.all, query.limit, query.until_id.as_deref())
        .await?;

    let posts = post_responses(&state, &user.id, posts).await?;

    Ok(ApiResponse::ok(PostListResponse { posts }))
}

/// Create post request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub text: String,
    pub image_id: Option<String>,
}

/// Create a new post.
async fn create_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    info!(author = %user.id, "Creating post");

    if let Some(ref image_id) = req.image_id {
        state
            .attachment_service
            .require_kind(image_id, ripple_core::AttachmentKind::Image)
            .await?;
    }

    let input = ripple_core::CreatePostInput {
        text: req.text,
        image_id: req.image_id,
    };

    let created = state.post_service.create(&user.id, input).await?;
    let response = post_response(&state, &user.id, created).await?;

    Ok(ApiResponse::ok(response))
}

/// Get a post by ID.
async fn get_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.get(&post_id).await?;
    let response = post_response(&state, &user.id, post).await?;

    Ok(ApiResponse::ok(response))
}

/// Update post request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub text: Option<String>,
    pub image_id: Option<String>,
}

/// Update a post. Author-only.
async fn update_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    let input = ripple_core::UpdatePostInput {
        text: req.text,
        image_id: req.image_id,
    };

    let updated = state.post_service.update(&user.id, &post_id, input).await?;
    let response = post_response(&state, &user.id, updated).await?;

    Ok(ApiResponse::ok(response))
}

/// Delete a post. Author-only.
async fn delete_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    info!(actor = %user.id, post = %post_id, "Deleting post");

    state.post_service.delete(&user.id, &post_id).await?;

    Ok(ApiResponse::ok(()))
}

/// List posts by a single user.
async fn list_user_posts(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<PostListResponse>> {
    // 404 for unknown users rather than an empty list
    let _user = state.user_service.get(&user_id).await?;

    let posts = state
        .post_service
        .list_by_user(&user_id, query.limit, query.until_id.as_deref())
        .await?;

    let posts = post_responses(&state, &viewer.id, posts).await?;

    Ok(ApiResponse::ok(PostListResponse { posts }))
}

// ==================== Comments ====================

/// Comment response with nested replies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub author_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<CommentResponse>,
}

/// Build a comment DTO with its nested replies. Boxed because the
/// thread tree recurses (depth is already capped by the service).
fn comment_response<'a>(
    state: &'a AppState,
    node: CommentNode,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = AppResult<CommentResponse>> + Send + 'a>> {
    Box::pin(async move {
        let image = match node.comment.image_id {
            Some(ref image_id) => match state.attachment_service.get(image_id).await {
                Ok(file) => Some(state.absolute_url(&file.url)),
                Err(_) => None,
            },
            None => None,
        };

        let mut replies = Vec::with_capacity(node.replies.len());
        for reply in node.replies {
            replies.push(comment_response(state, reply).await?);
        }

        Ok(CommentResponse {
            id: node.comment.id,
            author_id: node.comment.user_id,
            text: node.comment.text,
            image,
            parent_id: node.comment.parent_id,
            created_at: node.comment.created_at.into(),
            replies,
        })
    })
}

fn flat_comment_response(comment: comment::Model) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        author_id: comment.user_id,
        text: comment.text,
        image: None,
        parent_id: comment.parent_id,
        created_at: comment.created_at.into(),
        replies: Vec::new(),
    }
}

/// Comment list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
}

/// List the threaded comments on a post.
async fn list_comments(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<CommentListResponse>> {
    let thread = state.comment_service.thread_for_post(&post_id).await?;

    let mut comments = Vec::with_capacity(thread.len());
    for node in thread {
        comments.push(comment_response(&state, node).await?);
    }

    Ok(ApiResponse::ok(CommentListResponse { comments }))
}

/// Create comment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: Option<String>,
    pub image_id: Option<String>,
    pub parent_id: Option<String>,
}

/// Comment on a post, optionally as a reply.
async fn create_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    info!(author = %user.id, post = %post_id, "Creating comment");

    if let Some(ref image_id) = req.image_id {
        state
            .attachment_service
            .require_kind(image_id, ripple_core::AttachmentKind::Image)
            .await?;
    }

    let input = ripple_core::CreateCommentInput {
        text: req.text.clone(),
        image_id: req.image_id,
        parent_id: req.parent_id,
    };

    let created = state
        .comment_service
        .create(&user.id, &post_id, input)
        .await?;

    // Notify the post author, with a snapshot of the comment text
    let post = state.post_service.get(&post_id).await?;
    if let Err(e) = state
        .notification_service
        .notify_comment(&post.user_id, &user.id, &post_id, created.text.as_deref())
        .await
    {
        tracing::warn!(error = %e, "Failed to create comment notification");
    }

    Ok(ApiResponse::ok(flat_comment_response(created)))
}

/// Update comment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    pub text: String,
}

/// Edit a comment. Author-only.
async fn update_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let updated = state
        .comment_service
        .update(&user.id, &comment_id, req.text)
        .await?;

    Ok(ApiResponse::ok(flat_comment_response(updated)))
}

/// Delete a comment. Author-only.
async fn delete_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    info!(actor = %user.id, comment = %comment_id, "Deleting comment");

    state.comment_service.delete(&user.id, &comment_id).await?;

    Ok(ApiResponse::ok(()))
}

// ==================== Likes ====================

/// Like toggle response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: u64,
}

/// Toggle a like on a post.
async fn toggle_like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<LikeResponse>> {
    let outcome = state.like_service.toggle(&user.id, &post_id).await?;

    Ok(ApiResponse::ok(LikeResponse {
        liked: outcome.liked,
        likes_count: outcome.likes_count,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_post_response_serialization() {
        let response = PostResponse {
            id: "p1".to_string(),
            author_id: "u1".to_string(),
            author: "alice".to_string(),
            is_following: false,
            text: "hello".to_string(),
            image: None,
            created_at: Utc::now(),
            updated_at: None,
            comments_count: 0,
            likes_count: 1,
            is_liked: true,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"likesCount\":1"));
        assert!(json.contains("\"isLiked\":true"));
    }

    #[test]
    fn test_comment_response_nests_replies() {
        let reply = CommentResponse {
            id: "c2".to_string(),
            author_id: "u2".to_string(),
            text: Some("reply".to_string()),
            image: None,
            parent_id: Some("c1".to_string()),
            created_at: Utc::now(),
            replies: Vec::new(),
        };
        let top = CommentResponse {
            id: "c1".to_string(),
            author_id: "u1".to_string(),
            text: Some("top".to_string()),
            image: None,
            parent_id: None,
            created_at: Utc::now(),
            replies: vec![reply],
        };

        let json = serde_json::to_string(&top).unwrap();
        assert!(json.contains("\"replies\":[{"));
        assert!(json.contains("\"parentId\":\"c1\""));
    }
}
