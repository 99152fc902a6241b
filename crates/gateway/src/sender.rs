//! Message gateway trait and implementations.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::message::{OutboundMessage, ReplyContext};

/// Trait for delivering messages to users.
///
/// Abstracted to support different transports (HTTP relay, tests, etc.)
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Answer an inbound event.
    ///
    /// # Arguments
    /// * `context` - User and reply token of the event being answered
    /// * `messages` - Messages to deliver, in order
    async fn reply(
        &self,
        context: &ReplyContext,
        messages: &[OutboundMessage],
    ) -> Result<(), GatewayError>;

    /// Send unsolicited messages to a user.
    ///
    /// # Arguments
    /// * `user_id` - Recipient
    /// * `messages` - Messages to deliver, in order
    async fn push(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), GatewayError>;

    /// Push a single plain text message (convenience wrapper).
    async fn push_text(&self, user_id: &str, text: &str) -> Result<(), GatewayError> {
        self.push(user_id, &[OutboundMessage::text(text)]).await
    }
}

/// A gateway that only logs what it would deliver.
#[derive(Debug, Clone, Default)]
pub struct LoggingGateway;

#[async_trait]
impl MessageGateway for LoggingGateway {
    async fn reply(
        &self,
        context: &ReplyContext,
        messages: &[OutboundMessage],
    ) -> Result<(), GatewayError> {
        for message in messages {
            tracing::info!("[reply] to {}: {}", context.user_id, message.body());
        }
        Ok(())
    }

    async fn push(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), GatewayError> {
        for message in messages {
            tracing::info!("[push] to {}: {}", user_id, message.body());
        }
        Ok(())
    }
}
