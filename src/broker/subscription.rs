use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::warn;

use super::{DeadLetterStore, DeliveryCallback, Rule};
use crate::message::Envelope;
use crate::utils::error::Result;
use crate::utils::path::subscription_key;

/// Named filter on a topic. Envelopes its rule accepts are delivered to the
/// subscription's handler.
#[derive(Clone)]
pub struct Subscription {
    name: String,
    key: String,
    rule: Rule,
    handler: Option<DeliveryCallback>,
    dead_letters: DeadLetterStore,
}

impl Subscription {
    pub fn new<F>(name: &str, rule: F) -> Result<Self>
    where
        F: Fn(&Envelope, &str) -> bool + Send + Sync + 'static,
    {
        Self::with_rule(name, Arc::new(rule))
    }

    pub fn with_rule(name: &str, rule: Rule) -> Result<Self> {
        let key = subscription_key(name)?;
        Ok(Self {
            name: name.trim().to_string(),
            key,
            rule,
            handler: None,
            dead_letters: DeadLetterStore::new(),
        })
    }

    /// Subscription accepting every envelope.
    pub fn always(name: &str) -> Result<Self> {
        Self::new(name, |_, _| true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dead_letters(&self) -> &DeadLetterStore {
        &self.dead_letters
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub(crate) fn handler(&self) -> Option<DeliveryCallback> {
        self.handler.clone()
    }

    pub(crate) fn set_handler(&mut self, callback: DeliveryCallback) {
        self.handler = Some(callback);
    }

    /// Evaluates the rule; a panicking rule counts as a rejection.
    pub fn matches(&self, envelope: &Envelope) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.rule)(envelope, &self.name))) {
            Ok(accepted) => accepted,
            Err(_) => {
                warn!(subscription = %self.name, "delivery rule panicked, envelope not forwarded");
                false
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("has_handler", &self.has_handler())
            .field("dead_letters", &self.dead_letters.len())
            .finish_non_exhaustive()
    }
}
