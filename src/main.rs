//! CLI for embus
//!
//! Subcommands:
//! - `serve`: build the configured topology and log every delivered message
//! - `demo`: same as `serve`, then send one sample message to every entity

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use embus::broker::{Broker, EntityKind, Queue, Subscription, Topic};
use embus::client::{
    Delivery, DeliveryMode, DeserializationErrorDetail, ErrorDetail, HandlerRegistration,
    HandlerRegistry, HandlerResult, MessageHandler, MessageSender,
};
use embus::config::{Settings, load_config};
use embus::message::{ContentTypes, Envelope};
use embus::utils::logging;
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "embus")]
enum Command {
    /// Run the emulator until Ctrl-C
    Serve,
    /// Run the emulator and send a sample message to every queue and topic
    Demo,
}

/// Logs every message it receives and always reports it as processed.
struct LoggingHandler {
    registration: HandlerRegistration,
}

#[async_trait]
impl MessageHandler for LoggingHandler {
    fn registration(&self) -> &HandlerRegistration {
        &self.registration
    }

    async fn process_message(&self, delivery: Delivery) -> HandlerResult<bool> {
        let content = delivery.content();
        let payload = content
            .downcast_ref::<serde_json::Value>()
            .map(ToString::to_string)
            .unwrap_or_default();
        let created = delivery
            .envelope()
            .map(|e| e.header.created.clone())
            .unwrap_or_default();

        info!(
            entity = %self.registration.entity_path,
            subscription = self.registration.subscription_name.as_deref().unwrap_or("-"),
            content_type = %content.short_type_name(),
            created = %created,
            payload = %payload,
            "message received"
        );
        Ok(true)
    }

    fn process_error(&self, detail: &ErrorDetail) {
        warn!(
            entity = %detail.entity_path,
            action = %detail.action,
            "handler error: {}",
            detail.error
        );
    }

    fn process_deserialization_error(&self, detail: &DeserializationErrorDetail) -> bool {
        warn!("dropping undecodable message: {}", detail.error);
        true
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return;
        }
    };
    logging::init(&settings.logging.level);

    if let Err(e) = run(cmd, settings).await {
        error!("embus failed: {}", e);
    }
}

async fn run(cmd: Command, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let broker = Arc::new(Broker::new(settings.broker.clone()));
    broker.apply_topology(&settings.topology)?;
    if matches!(cmd, Command::Demo)
        && broker.queue_names().is_empty()
        && broker.topic_names().is_empty()
    {
        demo_topology(&broker)?;
    }

    let registry = HandlerRegistry::new(
        Arc::clone(&broker),
        Arc::new(ContentTypes::new().with_json_fallback()),
        settings.pipeline_options(),
    );
    attach_logging_handlers(&broker, &registry)?;

    if matches!(cmd, Command::Demo) {
        send_samples(&broker)?;
    }

    info!(
        queues = broker.queue_names().len(),
        topics = broker.topic_names().len(),
        "embus running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");
    broker.reset();

    Ok(())
}

fn demo_topology(broker: &Broker) -> embus::utils::Result<()> {
    broker.register_queue(Queue::new("demo")?)?;
    broker.register_topic(Topic::new("demo-events")?)?;
    broker.add_subscription("demo-events", Subscription::always("all")?)
}

fn attach_logging_handlers(
    broker: &Broker,
    registry: &HandlerRegistry,
) -> embus::utils::Result<()> {
    for queue in broker.queue_names() {
        registry.register_message_handler(Arc::new(LoggingHandler {
            registration: HandlerRegistration::queue(queue, DeliveryMode::Message),
        }))?;
    }
    for topic in broker.topic_names() {
        for subscription in broker.subscription_names(&topic)? {
            registry.register_message_handler(Arc::new(LoggingHandler {
                registration: HandlerRegistration::subscription(
                    topic.clone(),
                    subscription,
                    DeliveryMode::Message,
                ),
            }))?;
        }
    }
    info!(handlers = registry.message_handler_count(), "logging handlers attached");
    Ok(())
}

fn send_samples(broker: &Arc<Broker>) -> embus::utils::Result<()> {
    let sender = MessageSender::new(Arc::clone(broker));
    for queue in broker.queue_names() {
        let sample = json!({ "entity": &queue, "kind": "queue", "text": "hello from embus" });
        sender.send(EntityKind::Queue, Envelope::create(&sample)?, &queue)?;
    }
    for topic in broker.topic_names() {
        let sample = json!({ "entity": &topic, "kind": "topic", "text": "hello from embus" });
        sender.send(EntityKind::Topic, Envelope::create(&sample)?, &topic)?;
    }
    Ok(())
}
