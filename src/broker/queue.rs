use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info};

use super::scanner::{Scanner, deliver};
use super::{DeadLetterStore, DeliveryCallback, Inbound, lock};
use crate::message::Envelope;
use crate::utils::error::Result;
use crate::utils::path::entity_key;

/// Point-to-point entity: every envelope goes to the single registered
/// handler, in send order.
pub struct Queue {
    name: String,
    key: String,
    pending: Arc<Mutex<VecDeque<Envelope>>>,
    handler: Arc<Mutex<Option<DeliveryCallback>>>,
    dead_letters: DeadLetterStore,
    scanner: Option<Scanner>,
}

impl Queue {
    pub fn new(name: &str) -> Result<Self> {
        let key = entity_key(name)?;
        Ok(Self {
            name: name.trim().to_string(),
            key,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            handler: Arc::new(Mutex::new(None)),
            dead_letters: DeadLetterStore::new(),
            scanner: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn send(&self, envelope: Envelope) {
        lock(&self.pending).push_back(envelope);
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn dead_letters(&self) -> &DeadLetterStore {
        &self.dead_letters
    }

    pub fn has_handler(&self) -> bool {
        lock(&self.handler).is_some()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.as_ref().is_some_and(Scanner::is_running)
    }

    /// Sets the handler, replacing any earlier one, and starts the scan loop
    /// if it is not running. A loop whose runtime has shut down is replaced.
    pub fn register_handler(
        &mut self,
        callback: DeliveryCallback,
        interval: Duration,
    ) -> Result<()> {
        if !self.is_scanning() {
            self.scanner = Some(self.start_scanner(interval)?);
        }
        let replaced = lock(&self.handler).replace(callback).is_some();
        info!(queue = %self.name, replaced, "message handler registered");
        Ok(())
    }

    fn start_scanner(&self, interval: Duration) -> Result<Scanner> {
        let name = self.name.clone();
        let pending = Arc::clone(&self.pending);
        let handler = Arc::clone(&self.handler);
        let dead_letters = self.dead_letters.clone();

        Scanner::start(&self.name, interval, move || {
            let envelope = lock(&pending).pop_front();
            let callback = lock(&handler).clone();
            let name = name.clone();
            let dead_letters = dead_letters.clone();

            async move {
                let Some(envelope) = envelope else {
                    return;
                };
                match callback {
                    Some(callback) => {
                        let inbound = Inbound {
                            envelope,
                            entity_path: name,
                            dead_letters,
                        };
                        deliver(callback, inbound).await;
                    }
                    None => debug!(queue = %name, "no handler registered, envelope dropped"),
                }
            }
            .boxed()
        })
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("pending", &self.pending_len())
            .field("has_handler", &self.has_handler())
            .field("dead_letters", &self.dead_letters.len())
            .finish()
    }
}
