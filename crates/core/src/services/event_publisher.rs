//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time chat events.
//! The actual implementation is provided by the API crate's in-process
//! topic hub; services stay unaware of the transport.

use async_trait::async_trait;
use ripple_common::AppResult;
use ripple_db::entities::{group_message, message};
use std::sync::Arc;

/// Events delivered over the real-time channel.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A direct message was created.
    DirectMessage(message::Model),
    /// A group message was created.
    GroupMessage(group_message::Model),
    /// A direct message was marked read by its recipient.
    MessageRead {
        message_id: String,
        reader_id: String,
    },
}

/// Trait for publishing real-time events.
///
/// Delivery is fire-and-forget; implementations drop events with no
/// live subscriber.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a direct message to the recipient's topic.
    async fn publish_direct_message(&self, message: &message::Model) -> AppResult<()>;

    /// Publish a group message to the group's topic.
    async fn publish_group_message(&self, message: &group_message::Model) -> AppResult<()>;

    /// Publish a read receipt to the original sender's topic.
    async fn publish_message_read(
        &self,
        sender_id: &str,
        message_id: &str,
        reader_id: &str,
    ) -> AppResult<()>;
}

/// A no-op implementation for tests or when real-time delivery is disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_direct_message(&self, _message: &message::Model) -> AppResult<()> {
        Ok(())
    }

    async fn publish_group_message(&self, _message: &group_message::Model) -> AppResult<()> {
        Ok(())
    }

    async fn publish_message_read(
        &self,
        _sender_id: &str,
        _message_id: &str,
        _reader_id: &str,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
