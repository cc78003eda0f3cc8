use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tracing::{debug, info};

use super::{DeliveryCallback, EntityKind, Queue, Rule, Subscription, Topic, lock};
use crate::config::{BrokerSettings, TopologySettings};
use crate::message::Envelope;
use crate::utils::error::{BusError, Result};
use crate::utils::path::{entity_key, subscription_key};

static GLOBAL: OnceLock<Arc<Broker>> = OnceLock::new();

/// Registry of every queue and topic in the emulator.
///
/// Queues and topics live in separate namespaces keyed by canonical path, so
/// a queue and a topic may share a name. Each entity owns its pending FIFO
/// and scan loop; the maps here are only locked for lookups and never across
/// an `.await`.
#[derive(Debug)]
pub struct Broker {
    settings: BrokerSettings,
    queues: Mutex<HashMap<String, Queue>>,
    topics: Mutex<HashMap<String, Topic>>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerSettings::default())
    }
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            queues: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide broker, created with default settings on first use.
    pub fn global() -> Arc<Broker> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Broker::default())))
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.settings.scan_interval_ms)
    }

    pub fn register_queue(&self, queue: Queue) -> Result<()> {
        let mut queues = lock(&self.queues);
        if queues.contains_key(queue.key()) {
            return Err(BusError::DuplicateEntity(format!(
                "queue '{}' already exists",
                queue.name()
            )));
        }
        info!(queue = %queue.name(), "queue registered");
        queues.insert(queue.key().to_string(), queue);
        Ok(())
    }

    pub fn register_topic(&self, topic: Topic) -> Result<()> {
        let mut topics = lock(&self.topics);
        if topics.contains_key(topic.key()) {
            return Err(BusError::DuplicateEntity(format!(
                "topic '{}' already exists",
                topic.name()
            )));
        }
        info!(topic = %topic.name(), "topic registered");
        topics.insert(topic.key().to_string(), topic);
        Ok(())
    }

    pub fn add_subscription(&self, topic_path: &str, subscription: Subscription) -> Result<()> {
        let key = entity_key(topic_path)?;
        let topics = lock(&self.topics);
        let topic = topics
            .get(&key)
            .ok_or_else(|| missing(EntityKind::Topic, topic_path))?;
        topic.add_subscription(subscription)
    }

    /// Appends the envelope to the FIFO of the entity named by `path`.
    pub fn send(&self, kind: EntityKind, envelope: Envelope, path: &str) -> Result<()> {
        let key = entity_key(path)?;
        match kind {
            EntityKind::Queue => {
                let queues = lock(&self.queues);
                let queue = queues.get(&key).ok_or_else(|| missing(kind, path))?;
                queue.send(envelope);
            }
            EntityKind::Topic => {
                let topics = lock(&self.topics);
                let topic = topics.get(&key).ok_or_else(|| missing(kind, path))?;
                topic.send(envelope);
            }
        }
        debug!(kind = %kind, entity = %path.trim(), "envelope enqueued");
        Ok(())
    }

    /// Attaches `callback` to a queue, or to `subscription` of a topic, and
    /// starts that entity's scan loop.
    pub fn register_message_handler(
        &self,
        kind: EntityKind,
        callback: DeliveryCallback,
        path: &str,
        subscription: Option<&str>,
    ) -> Result<()> {
        let key = entity_key(path)?;
        let interval = self.scan_interval();
        match kind {
            EntityKind::Queue => {
                let mut queues = lock(&self.queues);
                let queue = queues.get_mut(&key).ok_or_else(|| missing(kind, path))?;
                queue.register_handler(callback, interval)
            }
            EntityKind::Topic => {
                let subscription = subscription.unwrap_or_default();
                subscription_key(subscription)?;
                let mut topics = lock(&self.topics);
                let topic = topics.get_mut(&key).ok_or_else(|| missing(kind, path))?;
                topic.register_handler(callback, subscription, interval)
            }
        }
    }

    pub fn contains(&self, kind: EntityKind, path: &str) -> bool {
        let Ok(key) = entity_key(path) else {
            return false;
        };
        match kind {
            EntityKind::Queue => lock(&self.queues).contains_key(&key),
            EntityKind::Topic => lock(&self.topics).contains_key(&key),
        }
    }

    /// Number of envelopes waiting to be scanned.
    pub fn pending_count(&self, kind: EntityKind, path: &str) -> Result<usize> {
        let key = entity_key(path)?;
        match kind {
            EntityKind::Queue => lock(&self.queues)
                .get(&key)
                .map(Queue::pending_len)
                .ok_or_else(|| missing(kind, path)),
            EntityKind::Topic => lock(&self.topics)
                .get(&key)
                .map(Topic::pending_len)
                .ok_or_else(|| missing(kind, path)),
        }
    }

    /// Envelopes dead-lettered by a queue, or by `subscription` of a topic.
    pub fn dead_letters(
        &self,
        kind: EntityKind,
        path: &str,
        subscription: Option<&str>,
    ) -> Result<Vec<Envelope>> {
        let key = entity_key(path)?;
        match kind {
            EntityKind::Queue => lock(&self.queues)
                .get(&key)
                .map(|q| q.dead_letters().snapshot())
                .ok_or_else(|| missing(kind, path)),
            EntityKind::Topic => {
                let subscription = subscription.unwrap_or_default();
                subscription_key(subscription)?;
                let topics = lock(&self.topics);
                let topic = topics.get(&key).ok_or_else(|| missing(kind, path))?;
                topic
                    .dead_letters(subscription)
                    .map(|store| store.snapshot())
                    .ok_or_else(|| {
                        BusError::not_found(format!(
                            "subscription '{}' does not exist on topic '{}'",
                            subscription.trim(),
                            topic.name()
                        ))
                    })
            }
        }
    }

    /// Display names of all queues, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.queues)
            .values()
            .map(|q| q.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Display names of all topics, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.topics)
            .values()
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Subscription names of a topic, in the order they were added.
    pub fn subscription_names(&self, topic_path: &str) -> Result<Vec<String>> {
        let key = entity_key(topic_path)?;
        lock(&self.topics)
            .get(&key)
            .map(Topic::subscription_names)
            .ok_or_else(|| missing(EntityKind::Topic, topic_path))
    }

    /// Registers the queues, topics and subscriptions listed in `topology`.
    pub fn apply_topology(&self, topology: &TopologySettings) -> Result<()> {
        for name in &topology.queues {
            self.register_queue(Queue::new(name)?)?;
        }
        for topic in &topology.topics {
            self.register_topic(Topic::new(&topic.name)?)?;
            for subscription in &topic.subscriptions {
                let rule = content_type_rule(subscription.content_type.as_deref());
                self.add_subscription(
                    &topic.name,
                    Subscription::with_rule(&subscription.name, rule)?,
                )?;
            }
        }
        Ok(())
    }

    /// Stops every scan loop and removes all entities.
    pub fn reset(&self) {
        let queues = mem::take(&mut *lock(&self.queues));
        let topics = mem::take(&mut *lock(&self.topics));
        info!(
            queues = queues.len(),
            topics = topics.len(),
            "broker reset"
        );
        // scanners abort here, outside the map locks
        drop(queues);
        drop(topics);
    }
}

fn missing(kind: EntityKind, path: &str) -> BusError {
    BusError::not_found(format!("{kind} '{}' does not exist", path.trim()))
}

/// Matches envelopes whose short content type equals `content_type`
/// (ignoring case), or everything when no content type is configured.
fn content_type_rule(content_type: Option<&str>) -> Rule {
    match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(expected) => {
            let expected = expected.to_string();
            Arc::new(move |envelope: &Envelope, _: &str| {
                envelope.content_type_short().eq_ignore_ascii_case(&expected)
            })
        }
        None => Arc::new(|_: &Envelope, _: &str| true),
    }
}
