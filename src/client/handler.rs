use std::error::Error;

use async_trait::async_trait;

use crate::broker::EntityKind;
use crate::message::{Content, Envelope};
use crate::utils::error::Result;
use crate::utils::path::{entity_key, scoped_subscription_key};

/// Result type user handlers return.
pub type HandlerResult<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

/// Kind of entity a handler receives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverKind {
    Queue,
    Subscription,
}

impl ReceiverKind {
    /// Entity namespace a sender addresses to reach this receiver.
    pub fn sender_kind(self) -> EntityKind {
        match self {
            ReceiverKind::Queue => EntityKind::Queue,
            ReceiverKind::Subscription => EntityKind::Topic,
        }
    }
}

/// Shape of what `process_message` receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Only the materialized payload.
    #[default]
    Content,
    /// The envelope together with its materialized payload.
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRegistration {
    pub receiver: ReceiverKind,
    pub mode: DeliveryMode,
    pub entity_path: String,
    /// Set for subscription receivers.
    pub subscription_name: Option<String>,
}

impl HandlerRegistration {
    pub fn queue(path: impl Into<String>, mode: DeliveryMode) -> Self {
        Self {
            receiver: ReceiverKind::Queue,
            mode,
            entity_path: path.into(),
            subscription_name: None,
        }
    }

    pub fn subscription(
        topic: impl Into<String>,
        subscription: impl Into<String>,
        mode: DeliveryMode,
    ) -> Self {
        Self {
            receiver: ReceiverKind::Subscription,
            mode,
            entity_path: topic.into(),
            subscription_name: Some(subscription.into()),
        }
    }

    /// Canonical key handlers are stored under: the queue path, or
    /// `TOPIC/SUBSCRIPTIONS/NAME`.
    pub fn key(&self) -> Result<String> {
        match self.receiver {
            ReceiverKind::Queue => entity_key(&self.entity_path),
            ReceiverKind::Subscription => scoped_subscription_key(
                &self.entity_path,
                self.subscription_name.as_deref().unwrap_or_default(),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaterializedEnvelope {
    pub envelope: Envelope,
    pub content: Content,
}

/// What a handler is given, depending on its `DeliveryMode`.
#[derive(Debug, Clone)]
pub enum Delivery {
    Content(Content),
    Message(MaterializedEnvelope),
}

impl Delivery {
    pub fn content(&self) -> &Content {
        match self {
            Delivery::Content(content) => content,
            Delivery::Message(message) => &message.content,
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Delivery::Content(_) => None,
            Delivery::Message(message) => Some(&message.envelope),
        }
    }
}

/// Reported to `MessageHandler::process_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub error: String,
    /// `UserCallback`, `Complete` or `DeadLetter`.
    pub action: String,
    pub endpoint: String,
    pub entity_path: String,
    pub client_id: String,
}

/// Reported to `MessageHandler::process_deserialization_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializationErrorDetail {
    pub error: String,
    /// The raw message, or the envelope JSON when the payload was the part
    /// that failed.
    pub message: String,
}

/// User code receiving messages from a queue or subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn registration(&self) -> &HandlerRegistration;

    /// Returns `true` when the message was processed.
    async fn process_message(&self, delivery: Delivery) -> HandlerResult<bool>;

    fn process_error(&self, _detail: &ErrorDetail) {}

    /// Returns `true` to drop the message instead of failing the delivery.
    fn process_deserialization_error(&self, _detail: &DeserializationErrorDetail) -> bool {
        false
    }
}
