use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, trace};

use super::scanner::{Scanner, deliver};
use super::{DeadLetterStore, DeliveryCallback, Inbound, Subscription, lock};
use crate::message::Envelope;
use crate::utils::error::{BusError, Result};
use crate::utils::path::{canonical, entity_key};

/// Publish/subscribe entity. Each envelope sent to a topic is offered to all
/// of its subscriptions, in the order they were added.
pub struct Topic {
    name: String,
    key: String,
    pending: Arc<Mutex<VecDeque<Envelope>>>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    scanner: Option<Scanner>,
}

impl Topic {
    pub fn new(name: &str) -> Result<Self> {
        let key = entity_key(name)?;
        Ok(Self {
            name: name.trim().to_string(),
            key,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            scanner: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn send(&self, envelope: Envelope) {
        lock(&self.pending).push_back(envelope);
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.as_ref().is_some_and(Scanner::is_running)
    }

    pub fn add_subscription(&self, subscription: Subscription) -> Result<()> {
        let mut subscriptions = lock(&self.subscriptions);
        if subscriptions.iter().any(|s| s.key() == subscription.key()) {
            return Err(BusError::DuplicateEntity(format!(
                "subscription '{}' already exists on topic '{}'",
                subscription.name(),
                self.name
            )));
        }
        debug!(topic = %self.name, subscription = %subscription.name(), "subscription added");
        subscriptions.push(subscription);
        Ok(())
    }

    pub fn has_subscription(&self, name: &str) -> bool {
        let key = canonical(name);
        lock(&self.subscriptions).iter().any(|s| s.key() == key)
    }

    pub fn subscription_names(&self) -> Vec<String> {
        lock(&self.subscriptions)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn dead_letters(&self, subscription: &str) -> Option<DeadLetterStore> {
        let key = canonical(subscription);
        lock(&self.subscriptions)
            .iter()
            .find(|s| s.key() == key)
            .map(|s| s.dead_letters().clone())
    }

    /// Sets the handler of `subscription` and starts the scan loop if it is
    /// not running. A loop whose runtime has shut down is replaced.
    pub fn register_handler(
        &mut self,
        callback: DeliveryCallback,
        subscription: &str,
        interval: Duration,
    ) -> Result<()> {
        let key = canonical(subscription);
        if !self.has_subscription(&key) {
            return Err(BusError::not_found(format!(
                "subscription '{}' does not exist on topic '{}'",
                subscription.trim(),
                self.name
            )));
        }
        if !self.is_scanning() {
            self.scanner = Some(self.start_scanner(interval)?);
        }

        let mut subscriptions = lock(&self.subscriptions);
        if let Some(target) = subscriptions.iter_mut().find(|s| s.key() == key) {
            target.set_handler(callback);
            info!(topic = %self.name, subscription = %target.name(), "message handler registered");
        }
        Ok(())
    }

    fn start_scanner(&self, interval: Duration) -> Result<Scanner> {
        let name = self.name.clone();
        let pending = Arc::clone(&self.pending);
        let subscriptions = Arc::clone(&self.subscriptions);

        Scanner::start(&self.name, interval, move || {
            let envelope = lock(&pending).pop_front();
            let targets = match envelope {
                Some(_) => lock(&subscriptions).clone(),
                None => Vec::new(),
            };
            let name = name.clone();

            async move {
                let Some(envelope) = envelope else {
                    return;
                };
                for subscription in targets {
                    if !subscription.matches(&envelope) {
                        trace!(topic = %name, subscription = %subscription.name(), "rule rejected envelope");
                        continue;
                    }
                    let Some(callback) = subscription.handler() else {
                        debug!(topic = %name, subscription = %subscription.name(), "no handler registered, skipping");
                        continue;
                    };
                    let inbound = Inbound {
                        envelope: envelope.clone(),
                        entity_path: format!("{}/Subscriptions/{}", name, subscription.name()),
                        dead_letters: subscription.dead_letters().clone(),
                    };
                    deliver(callback, inbound).await;
                }
            }
            .boxed()
        })
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("pending", &self.pending_len())
            .field("subscriptions", &self.subscription_names())
            .finish()
    }
}
