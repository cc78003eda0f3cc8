use std::sync::{Arc, Mutex};

use super::lock;
use crate::message::Envelope;

/// Envelopes moved aside by a dead-letter settlement.
///
/// Each queue and each subscription owns one store; clones share it.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterStore {
    inner: Arc<Mutex<Vec<Envelope>>>,
}

impl DeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, envelope: Envelope) {
        lock(&self.inner).push(envelope);
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    /// Copies the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Envelope> {
        lock(&self.inner).clone()
    }

    pub fn clear(&self) {
        lock(&self.inner).clear();
    }
}
