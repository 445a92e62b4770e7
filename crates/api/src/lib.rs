//! HTTP API layer for ripple.
//!
//! This crate provides the REST API and the real-time chat channel:
//!
//! - **Endpoints**: auth, users, follow graph, posts, notifications,
//!   messaging, groups, file uploads
//! - **Extractors**: authenticated-user extraction from request extensions
//! - **Middleware**: bearer-token authentication
//! - **Streaming**: the websocket chat session and its in-process topic hub
//!
//! Built on Axum 0.8 with a Tower middleware stack.

// Allow dead_code for API compatibility fields in request structs
#![allow(dead_code)]

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use endpoints::router;
pub use streaming::{chat_handler, ChatHub};
