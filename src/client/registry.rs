use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tracing::{error, info};

use super::handler::{MessageHandler, ReceiverKind};
use crate::broker::{Broker, DeliveryCallback, EmulatorSettlement, Inbound, lock};
use crate::message::{ContentTypes, Envelope};
use crate::pipeline::{
    ACTION_DEAD_LETTER, ACTION_USER_CALLBACK, DeliveryPipeline, PipelineOptions, Settlement,
};
use crate::utils::error::Result;

/// Wires user handlers to broker entities.
///
/// Each registration gets its own `DeliveryPipeline`; the broker callback
/// runs it with an emulator settlement for every envelope the entity hands
/// over.
pub struct HandlerRegistry {
    broker: Arc<Broker>,
    content_types: Arc<ContentTypes>,
    options: PipelineOptions,
    handlers: Mutex<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new(
        broker: Arc<Broker>,
        content_types: Arc<ContentTypes>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            broker,
            content_types,
            options,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Registers `handler` for the entity its registration names. A handler
    /// registered earlier under the same key is replaced.
    pub fn register_message_handler(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let registration = handler.registration().clone();
        let key = registration.key()?;

        let pipeline = Arc::new(DeliveryPipeline::new(
            Arc::clone(&handler),
            Arc::clone(&self.content_types),
            self.options.clone(),
        ));
        let callback: DeliveryCallback = Arc::new(move |inbound: Inbound| {
            let pipeline = Arc::clone(&pipeline);
            async move { run_pipeline(&pipeline, inbound).await }.boxed()
        });

        let subscription = match registration.receiver {
            ReceiverKind::Queue => None,
            ReceiverKind::Subscription => registration.subscription_name.as_deref(),
        };

        // held across the broker call; the map must name the handler it delivers to
        let mut handlers = lock(&self.handlers);
        self.broker.register_message_handler(
            registration.receiver.sender_kind(),
            callback,
            &registration.entity_path,
            subscription,
        )?;
        let replaced = handlers.insert(key.clone(), handler).is_some();
        drop(handlers);

        info!(handler = %key, replaced, "message handler attached");
        Ok(())
    }

    /// Number of distinct queues and subscriptions with a handler.
    pub fn message_handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.handlers).contains_key(key)
    }

    /// Handler currently attached under a registration key.
    pub fn handler(&self, key: &str) -> Option<Arc<dyn MessageHandler>> {
        lock(&self.handlers).get(key).cloned()
    }
}

async fn run_pipeline(pipeline: &DeliveryPipeline, inbound: Inbound) {
    let settlement = EmulatorSettlement::new(&inbound);
    let entity_path = inbound.entity_path.clone();
    settle(pipeline, inbound.envelope, &entity_path, &settlement).await;
}

/// Runs one envelope through `pipeline`; an error the handler did not absorb
/// dead-letters the envelope.
pub(super) async fn settle(
    pipeline: &DeliveryPipeline,
    envelope: Envelope,
    entity_path: &str,
    settlement: &dyn Settlement,
) {
    let Err(error) = pipeline
        .process_envelope(envelope, entity_path, settlement)
        .await
    else {
        return;
    };
    pipeline.report_error(&error, ACTION_USER_CALLBACK, entity_path);
    if let Err(e) = settlement.dead_letter(&error.to_string()).await {
        error!(entity = %entity_path, error = %e, "failed to dead-letter message");
        pipeline.report_error(&e, ACTION_DEAD_LETTER, entity_path);
    }
}
