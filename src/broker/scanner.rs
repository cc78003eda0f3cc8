//! Polling loop shared by queues and topics.
//!
//! A scanner owns one tokio task that wakes every `interval` (first wake one
//! interval after start) and runs the entity's tick. A tick moves at most one
//! envelope and is awaited to completion before the next wake, so deliveries
//! of one entity never overlap. The task is aborted when the scanner drops.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

use super::{DeliveryCallback, Inbound};
use crate::utils::error::{BusError, Result};

pub struct Scanner {
    entity: String,
    task: JoinHandle<()>,
}

impl Scanner {
    /// Spawns the loop on the current tokio runtime.
    pub fn start<F>(entity: &str, interval: Duration, tick: F) -> Result<Self>
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let handle = Handle::try_current().map_err(|e| {
            BusError::Runtime(format!("cannot start scan loop for '{entity}': {e}"))
        })?;
        let period = interval.max(Duration::from_millis(1));

        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });

        debug!(entity = %entity, interval_ms = period.as_millis() as u64, "scan loop started");
        Ok(Self {
            entity: entity.to_string(),
            task,
        })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.task.abort();
        debug!(entity = %self.entity, "scan loop stopped");
    }
}

/// Runs one delivery; a panicking callback is logged and does not take the
/// scan loop down with it.
pub(crate) async fn deliver(callback: DeliveryCallback, inbound: Inbound) {
    let entity = inbound.entity_path.clone();
    if AssertUnwindSafe(callback(inbound))
        .catch_unwind()
        .await
        .is_err()
    {
        error!(entity = %entity, "delivery callback panicked");
    }
}
