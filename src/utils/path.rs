//! Entity identity helpers.
//!
//! Queues, topics and subscriptions are looked up by a canonical key: the
//! trimmed, uppercased form of the name they were registered or addressed
//! with. `"Orders"` and `"ORDERS "` name the same entity.

use super::error::{BusError, Result};

/// Maximum length of a queue or topic path.
pub const ENTITY_PATH_MAX_LENGTH: usize = 260;

/// Returns the lookup key for an entity or subscription name.
pub fn canonical(path: &str) -> String {
    path.trim().to_uppercase()
}

/// Validates a queue/topic path and returns its canonical key.
pub fn entity_key(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(BusError::invalid_argument("entity path is empty"));
    }
    if trimmed.chars().count() > ENTITY_PATH_MAX_LENGTH {
        return Err(BusError::invalid_argument(format!(
            "entity path exceeds {ENTITY_PATH_MAX_LENGTH} characters"
        )));
    }
    Ok(canonical(trimmed))
}

/// Validates a subscription name and returns its canonical key.
pub fn subscription_key(name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(BusError::invalid_argument("subscription name is empty"));
    }
    Ok(canonical(name))
}

/// Key of a subscription scoped to its topic, e.g. `ORDERS/SUBSCRIPTIONS/AUDIT`.
pub fn scoped_subscription_key(topic: &str, subscription: &str) -> Result<String> {
    Ok(format!(
        "{}/SUBSCRIPTIONS/{}",
        entity_key(topic)?,
        subscription_key(subscription)?
    ))
}
