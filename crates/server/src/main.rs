//! ripple server entry point.

#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use ripple_api::{chat_handler, middleware::AppState, router as api_router, ChatHub};
use ripple_common::{Config, LocalStorage};
use ripple_core::{
    AttachmentService, AuthService, CommentService, EventPublisherService, FollowingService,
    GroupMessagingService, GroupService, LikeService, MessagingService, NotificationService,
    PostService, UserService,
};
use ripple_db::repositories::{
    CommentRepository, FollowingRepository, GroupMessageRepository, GroupRepository,
    MessageRepository, NotificationRepository, PostLikeRepository, PostRepository,
    StoredFileRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting ripple server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database and run migrations
    let db = ripple_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    ripple_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let following_repo = FollowingRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let post_like_repo = PostLikeRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let message_repo = MessageRepository::new(Arc::clone(&db));
    let group_repo = GroupRepository::new(Arc::clone(&db));
    let group_message_repo = GroupMessageRepository::new(Arc::clone(&db));
    let stored_file_repo = StoredFileRepository::new(Arc::clone(&db));

    // Initialize storage backend
    let storage = Arc::new(LocalStorage::new(
        PathBuf::from(&config.storage.upload_dir),
        "/files".to_string(),
    ));

    // Initialize the real-time hub first so the messaging services can
    // publish into it
    let chat_hub = ChatHub::new();
    let event_publisher: EventPublisherService = Arc::new(chat_hub.clone());

    // Initialize services
    let auth_service = AuthService::new(
        &config.auth.token_secret,
        config.auth.access_ttl_secs,
        config.auth.refresh_ttl_secs,
    );
    let user_service = UserService::new(user_repo.clone());
    let notification_service = NotificationService::new(notification_repo);
    let following_service = FollowingService::new(
        following_repo.clone(),
        user_repo.clone(),
        notification_service.clone(),
    );
    let post_service = PostService::new(post_repo.clone(), following_repo);
    let comment_service = CommentService::new(comment_repo, post_repo.clone());
    let like_service = LikeService::new(
        post_like_repo,
        post_repo,
        notification_service.clone(),
    );

    let mut messaging_service = MessagingService::new(message_repo, user_repo.clone());
    messaging_service.set_event_publisher(event_publisher.clone());

    let group_service = GroupService::new(group_repo.clone(), user_repo);

    let mut group_messaging_service =
        GroupMessagingService::new(group_message_repo, group_repo);
    group_messaging_service.set_event_publisher(event_publisher);

    let attachment_service = AttachmentService::new(stored_file_repo, storage);

    // Create app state
    let state = AppState {
        auth_service,
        user_service,
        following_service,
        post_service,
        comment_service,
        like_service,
        notification_service,
        messaging_service,
        group_service,
        group_messaging_service,
        attachment_service,
        chat_hub,
        public_url: config.server.url.clone(),
    };

    // Build router
    let app = Router::new()
        .route("/ws/chat", get(chat_handler))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            ripple_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
