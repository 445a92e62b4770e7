//! WebSocket chat channel.
//!
//! A single upgrade path authenticated by a `token` query parameter.
//! Each session joins one topic per delivery target: `user:{id}` for
//! direct messages and read receipts, `group:{id}` for every group the
//! user belongs to, enumerated at connect time. Membership changes after
//! connect are not reflected until reconnect, except through an explicit
//! `join_group` frame.
//!
//! Delivery is fire-and-forget broadcast: no acknowledgement, no
//! redelivery, no ordering beyond the per-topic channel. A missed
//! broadcast is lost for that session; the persisted row remains the
//! source of truth.

#![allow(missing_docs)]

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use ripple_common::{AppError, AppResult};
use ripple_core::{ChatEvent, CreateMessageInput, EventPublisher};
use ripple_db::entities::{group_message, message, user};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamMap};
use tracing::{info, warn};

use crate::middleware::AppState;

/// Per-topic broadcast capacity. A slow consumer that lags loses the
/// overwritten events permanently.
const TOPIC_CAPACITY: usize = 256;

/// Chat connection query parameters.
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    /// Access token passed as a query parameter (not a header).
    pub token: Option<String>,
}

/// In-process publish/subscribe hub keyed by topic.
///
/// Topics are created lazily on subscribe or publish and pruned when the
/// last subscriber is gone.
#[derive(Clone, Default)]
pub struct ChatHub {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<ChatEvent>>>>,
}

impl ChatHub {
    /// Create a new hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Topic name for a user's direct-message stream.
    #[must_use]
    pub fn user_topic(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    /// Topic name for a group's stream.
    #[must_use]
    pub fn group_topic(group_id: &str) -> String {
        format!("group:{group_id}")
    }

    /// Subscribe to a topic, creating it if needed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<ChatEvent> {
        let mut topics = self.topics.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a topic. Fire-and-forget: events on topics with
    /// no live subscriber are dropped, and the empty topic is pruned.
    pub fn publish(&self, topic: &str, event: ChatEvent) {
        let mut topics = self.topics.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(sender) = topics.get(topic) {
            if sender.send(event).is_err() {
                // No receivers left
                topics.remove(topic);
            }
        }
    }

    /// Number of live topics (for tests and diagnostics).
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl EventPublisher for ChatHub {
    async fn publish_direct_message(&self, message: &message::Model) -> AppResult<()> {
        self.publish(
            &Self::user_topic(&message.recipient_id),
            ChatEvent::DirectMessage(message.clone()),
        );
        Ok(())
    }

    async fn publish_group_message(&self, message: &group_message::Model) -> AppResult<()> {
        self.publish(
            &Self::group_topic(&message.group_id),
            ChatEvent::GroupMessage(message.clone()),
        );
        Ok(())
    }

    async fn publish_message_read(
        &self,
        sender_id: &str,
        message_id: &str,
        reader_id: &str,
    ) -> AppResult<()> {
        self.publish(
            &Self::user_topic(sender_id),
            ChatEvent::MessageRead {
                message_id: message_id.to_string(),
                reader_id: reader_id.to_string(),
            },
        );
        Ok(())
    }
}

/// Client-to-server frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Send a direct message.
    PrivateMessage {
        recipient_id: String,
        text: String,
    },
    /// Send a group message (live membership is re-checked).
    GroupMessage { group_id: String, text: String },
    /// Mark a direct message as read.
    Read { message_id: String },
    /// Late-join a group's topic (membership-checked).
    JoinGroup { group_id: String },
}

/// Server-to-client frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A direct message (echo to the sender, delivery to the recipient).
    PrivateMessage { message: message::Model },
    /// A group message broadcast.
    GroupMessage { message: group_message::Model },
    /// A read receipt for a message this user sent.
    Read {
        message_id: String,
        reader_id: String,
    },
    /// Acknowledgement of a `join_group` frame.
    Joined { group_id: String },
    /// A rejected inbound frame.
    Error { message: String },
}

impl ServerFrame {
    fn from_event(event: ChatEvent) -> Self {
        match event {
            ChatEvent::DirectMessage(message) => Self::PrivateMessage { message },
            ChatEvent::GroupMessage(message) => Self::GroupMessage { message },
            ChatEvent::MessageRead {
                message_id,
                reader_id,
            } => Self::Read {
                message_id,
                reader_id,
            },
        }
    }
}

/// WebSocket handler for the chat channel.
///
/// Anonymous or invalid tokens are rejected before the upgrade.
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ChatQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(token) = query.token else {
        return AppError::Unauthorized.into_response();
    };

    let user = match state.auth_service.verify_access(&token) {
        Ok(user_id) => match state.user_service.get(&user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Chat auth failed: unknown user");
                return AppError::Unauthorized.into_response();
            }
        },
        Err(_) => {
            warn!("Chat auth failed: invalid token");
            return AppError::Unauthorized.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user, state))
}

/// Handle an authenticated chat session.
async fn handle_socket(socket: WebSocket, user: user::Model, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Enumerate subscriptions at connect time: the user's own topic plus
    // one topic per current group membership.
    let group_ids = match state.group_service.joined_group_ids(&user.id).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to enumerate group topics");
            let _ = sender.close().await;
            return;
        }
    };

    let mut topics: StreamMap<String, BroadcastStream<ChatEvent>> = StreamMap::new();
    let user_topic = ChatHub::user_topic(&user.id);
    topics.insert(
        user_topic.clone(),
        BroadcastStream::new(state.chat_hub.subscribe(&user_topic)),
    );
    for group_id in &group_ids {
        let topic = ChatHub::group_topic(group_id);
        topics.insert(
            topic.clone(),
            BroadcastStream::new(state.chat_hub.subscribe(&topic)),
        );
    }

    info!(user_id = %user.id, groups = group_ids.len(), "Chat session established");

    loop {
        tokio::select! {
            // Inbound frames from the client
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => handle_client_frame(frame, &user, &state, &mut topics).await,
                            Err(e) => Some(ServerFrame::Error {
                                message: format!("Malformed frame: {e}"),
                            }),
                        };

                        if let Some(frame) = reply {
                            if send_frame(&mut sender, &frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Broadcast events from subscribed topics
            Some((_topic, event)) = topics.next() => {
                match event {
                    Ok(event) => {
                        let frame = ServerFrame::from_event(event);
                        if send_frame(&mut sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // Lagged: the overwritten events are permanently
                        // lost for this session.
                        warn!(error = %e, user_id = %user.id, "Chat session lagged");
                    }
                }
            }
        }
    }

    // Dropping the StreamMap leaves every joined topic.
    info!(user_id = %user.id, "Chat session closed");
}

/// Dispatch one inbound frame. Returns the frame to send back to this
/// session, if any.
async fn handle_client_frame(
    frame: ClientFrame,
    user: &user::Model,
    state: &AppState,
    topics: &mut StreamMap<String, BroadcastStream<ChatEvent>>,
) -> Option<ServerFrame> {
    match frame {
        ClientFrame::PrivateMessage { recipient_id, text } => {
            let input = CreateMessageInput {
                text: Some(text),
                ..Default::default()
            };

            // Persist, then echo to the sender; the service publishes to
            // the recipient's topic.
            match state.messaging_service.send(&user.id, &recipient_id, input).await {
                Ok(message) => Some(ServerFrame::PrivateMessage { message }),
                Err(e) => Some(ServerFrame::Error {
                    message: e.to_string(),
                }),
            }
        }
        ClientFrame::GroupMessage { group_id, text } => {
            let input = CreateMessageInput {
                text: Some(text),
                ..Default::default()
            };

            // Membership is verified by the service; the broadcast to the
            // group topic reaches this session too, so no echo here.
            match state
                .group_messaging_service
                .send(&user.id, &group_id, input)
                .await
            {
                Ok(_) => None,
                Err(e) => Some(ServerFrame::Error {
                    message: e.to_string(),
                }),
            }
        }
        ClientFrame::Read { message_id } => {
            match state.messaging_service.mark_read(&user.id, &message_id).await {
                Ok(_) => None,
                Err(e) => Some(ServerFrame::Error {
                    message: e.to_string(),
                }),
            }
        }
        ClientFrame::JoinGroup { group_id } => {
            match state.group_service.is_member(&group_id, &user.id).await {
                Ok(true) => {
                    let topic = ChatHub::group_topic(&group_id);
                    if !topics.contains_key(&topic) {
                        topics.insert(
                            topic.clone(),
                            BroadcastStream::new(state.chat_hub.subscribe(&topic)),
                        );
                    }
                    Some(ServerFrame::Joined { group_id })
                }
                Ok(false) => Some(ServerFrame::Error {
                    message: "Not a member of this group".to_string(),
                }),
                Err(e) => Some(ServerFrame::Error {
                    message: e.to_string(),
                }),
            }
        }
    }
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    sender.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_message(id: &str, sender_id: &str, recipient_id: &str) -> message::Model {
        message::Model {
            id: id.to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            text: Some("hi".to_string()),
            image_id: None,
            file_id: None,
            is_read: false,
            is_edited: false,
            is_revoked: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_hub_delivers_to_subscriber() {
        let hub = ChatHub::new();
        let topic = ChatHub::user_topic("user1");
        let mut rx = hub.subscribe(&topic);

        hub.publish(&topic, ChatEvent::DirectMessage(make_message("m1", "a", "user1")));

        match rx.recv().await.unwrap() {
            ChatEvent::DirectMessage(m) => assert_eq!(m.id, "m1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hub_drops_events_without_subscriber() {
        let hub = ChatHub::new();

        // No subscriber: publish is a no-op, nothing panics
        hub.publish(
            &ChatHub::user_topic("ghost"),
            ChatEvent::DirectMessage(make_message("m1", "a", "ghost")),
        );

        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_hub_prunes_topic_after_last_subscriber() {
        let hub = ChatHub::new();
        let topic = ChatHub::group_topic("g1");

        let rx = hub.subscribe(&topic);
        assert_eq!(hub.topic_count(), 1);
        drop(rx);

        // First publish after the drop notices the dead topic
        hub.publish(&topic, ChatEvent::MessageRead {
            message_id: "m1".to_string(),
            reader_id: "u1".to_string(),
        });
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_hub_publisher_routes_to_recipient_topic() {
        let hub = ChatHub::new();
        let mut rx = hub.subscribe(&ChatHub::user_topic("recipient"));

        hub.publish_direct_message(&make_message("m1", "sender", "recipient"))
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChatEvent::DirectMessage(_)
        ));
    }

    #[test]
    fn test_client_frame_parses_private_message() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"private_message","recipient_id":"u2","text":"hello"}"#,
        )
        .unwrap();

        match frame {
            ClientFrame::PrivateMessage { recipient_id, text } => {
                assert_eq!(recipient_id, "u2");
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_client_frame_parses_join_group() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"join_group","group_id":"g1"}"#).unwrap();

        assert!(matches!(frame, ClientFrame::JoinGroup { group_id } if group_id == "g1"));
    }

    #[test]
    fn test_client_frame_rejects_unknown_type() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe","id":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_frame_serializes_with_type_tag() {
        let frame = ServerFrame::Read {
            message_id: "m1".to_string(),
            reader_id: "u1".to_string(),
        };

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"read"#));
        assert!(json.contains(r#""message_id":"m1""#));
    }

    #[test]
    fn test_server_frame_error_serializes() {
        let frame = ServerFrame::Error {
            message: "Not a member of this group".to_string(),
        };

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"error""#));
    }
}
