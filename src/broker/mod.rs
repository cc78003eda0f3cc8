//! The `broker` module is the in-process emulator of a queue/topic broker.
//!
//! - `engine`: the `Broker` registry holding queues and topics
//! - `queue`, `topic`, `subscription`: the entities envelopes are sent to
//! - `scanner`: the per-entity polling loop that hands envelopes to handlers
//! - `dead_letter`: where dead-lettered envelopes end up
//! - `settlement`: completion / dead-letter actions for emulator deliveries

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;

use crate::message::Envelope;

pub mod dead_letter;
pub mod engine;
pub mod queue;
pub mod scanner;
pub mod settlement;
pub mod subscription;
pub mod topic;

pub use dead_letter::DeadLetterStore;
pub use engine::Broker;
pub use queue::Queue;
pub use settlement::EmulatorSettlement;
pub use subscription::Subscription;
pub use topic::Topic;

/// Namespace an entity path is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Queue,
    Topic,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Queue => f.write_str("queue"),
            EntityKind::Topic => f.write_str("topic"),
        }
    }
}

/// Delivery filter of a subscription, called with the envelope and the
/// subscription's display name.
pub type Rule = Arc<dyn Fn(&Envelope, &str) -> bool + Send + Sync>;

/// What an entity invokes for every envelope it delivers.
pub type DeliveryCallback = Arc<dyn Fn(Inbound) -> BoxFuture<'static, ()> + Send + Sync>;

/// One envelope handed from an entity to its handler.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub envelope: Envelope,
    /// Display path of the receiving entity, `Topic/Subscriptions/Name` for
    /// subscriptions.
    pub entity_path: String,
    pub dead_letters: DeadLetterStore,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
