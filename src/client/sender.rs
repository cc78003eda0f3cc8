use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::broker::{Broker, EntityKind};
use crate::message::Envelope;
use crate::utils::error::{BusError, Result};
use crate::utils::path::entity_key;

/// Sends envelopes to the queues and topics of a broker.
#[derive(Debug, Clone)]
pub struct MessageSender {
    broker: Arc<Broker>,
}

impl MessageSender {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub fn send(&self, kind: EntityKind, envelope: Envelope, path: &str) -> Result<()> {
        self.broker.send(kind, envelope, path)
    }

    /// Wraps an already serialized body in a new envelope and sends it.
    pub fn send_raw(
        &self,
        kind: EntityKind,
        body: &str,
        path: &str,
        source_name: &str,
        source_id: &str,
    ) -> Result<()> {
        let envelope = raw_envelope(body)?;
        debug!(entity = %path.trim(), source_name = %source_name, source_id = %source_id, "sending raw message");
        self.broker.send(kind, envelope, path)
    }

    pub async fn send_async(&self, kind: EntityKind, envelope: Envelope, path: &str) -> Result<()> {
        self.send(kind, envelope, path)
    }

    pub async fn send_raw_async(
        &self,
        kind: EntityKind,
        body: &str,
        path: &str,
        source_name: &str,
        source_id: &str,
    ) -> Result<()> {
        self.send_raw(kind, body, path, source_name, source_id)
    }

    /// Sends with a time-to-live in minutes. The emulator keeps envelopes
    /// until they are delivered, so the TTL is only validated.
    pub async fn send_with_ttl_async(
        &self,
        kind: EntityKind,
        envelope: Envelope,
        path: &str,
        ttl_minutes: u32,
    ) -> Result<()> {
        if ttl_minutes == 0 {
            return Err(BusError::invalid_argument("time to live must be positive"));
        }
        self.send(kind, envelope, path)
    }

    /// Sends the envelope once `enqueue_at` is reached.
    ///
    /// Arguments and the target entity are checked right away. A past instant
    /// sends immediately; otherwise a task sleeps until then and logs any
    /// failure of the deferred send.
    pub fn schedule_message(
        &self,
        kind: EntityKind,
        envelope: Envelope,
        path: &str,
        enqueue_at: DateTime<Utc>,
    ) -> Result<()> {
        entity_key(path)?;
        if !self.broker.contains(kind, path) {
            return Err(BusError::not_found(format!(
                "{kind} '{}' does not exist",
                path.trim()
            )));
        }

        let delay = match (enqueue_at - Utc::now()).to_std() {
            Ok(delay) if !delay.is_zero() => delay,
            _ => return self.send(kind, envelope, path),
        };

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| BusError::Runtime(format!("cannot schedule message: {e}")))?;
        let broker = Arc::clone(&self.broker);
        let path = path.to_string();
        info!(entity = %path.trim(), delay_ms = delay.as_millis() as u64, "message scheduled");

        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = broker.send(kind, envelope, &path) {
                error!(entity = %path.trim(), error = %e, "scheduled send failed");
            }
        });
        Ok(())
    }
}

fn raw_envelope(body: &str) -> Result<Envelope> {
    if body.trim().is_empty() {
        return Err(BusError::invalid_argument("message body is empty"));
    }
    Envelope::create(&body.to_string())
}
