//! In-memory gateway that records deliveries for assertions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::message::{OutboundMessage, ReplyContext};
use crate::sender::MessageGateway;

/// One call made against the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Reply {
        user_id: String,
        reply_token: Option<String>,
        messages: Vec<OutboundMessage>,
    },
    Push {
        user_id: String,
        messages: Vec<OutboundMessage>,
    },
}

impl Delivery {
    /// Recipient of this delivery.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Reply { user_id, .. } | Self::Push { user_id, .. } => user_id,
        }
    }

    /// Messages carried by this delivery.
    pub fn messages(&self) -> &[OutboundMessage] {
        match self {
            Self::Reply { messages, .. } | Self::Push { messages, .. } => messages,
        }
    }
}

/// Gateway that keeps every delivery in memory.
///
/// Clones share the same log. When set to fail, calls are still recorded but
/// return [`GatewayError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    log: Arc<Mutex<Vec<Delivery>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of all deliveries so far.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().clone()
    }

    /// Remove and return all deliveries so far.
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.lock())
    }

    /// Messages replied to a user, flattened in order.
    pub fn replies_to(&self, user_id: &str) -> Vec<OutboundMessage> {
        self.collect(user_id, |d| matches!(d, Delivery::Reply { .. }))
    }

    /// Messages pushed to a user, flattened in order.
    pub fn pushes_to(&self, user_id: &str) -> Vec<OutboundMessage> {
        self.collect(user_id, |d| matches!(d, Delivery::Push { .. }))
    }

    fn collect(&self, user_id: &str, keep: impl Fn(&Delivery) -> bool) -> Vec<OutboundMessage> {
        self.lock()
            .iter()
            .filter(|d| d.user_id() == user_id && keep(d))
            .flat_map(|d| d.messages().iter().cloned())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Delivery>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, delivery: Delivery) -> Result<(), GatewayError> {
        self.lock().push(delivery);
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("recording gateway set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    async fn reply(
        &self,
        context: &ReplyContext,
        messages: &[OutboundMessage],
    ) -> Result<(), GatewayError> {
        self.record(Delivery::Reply {
            user_id: context.user_id.clone(),
            reply_token: context.reply_token.clone(),
            messages: messages.to_vec(),
        })
    }

    async fn push(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), GatewayError> {
        self.record(Delivery::Push {
            user_id: user_id.to_string(),
            messages: messages.to_vec(),
        })
    }
}
