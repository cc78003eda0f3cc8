//! Retry bookkeeping carried in `Body::retry_information`.
//!
//! The broker never reads or mutates this data itself; retry orchestration
//! lives with the caller. The counter saturates at `max_retries`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInformation<T> {
    max_retries: u16,
    current_count: u16,
    pub reasons: Vec<RetryReason>,
    destinations: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryReason {
    pub date_time: DateTime<Utc>,
    pub reason: String,
    pub activity: String,
}

impl RetryReason {
    pub fn new(reason: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            date_time: Utc::now(),
            reason: reason.into(),
            activity: activity.into(),
        }
    }
}

impl<T> RetryInformation<T> {
    pub fn new(max_retries: u16, destinations: Vec<T>) -> Self {
        Self {
            max_retries,
            current_count: 0,
            reasons: Vec::new(),
            destinations,
        }
    }

    pub fn max_retries(&self) -> u16 {
        self.max_retries
    }

    pub fn current_count(&self) -> u16 {
        self.current_count
    }

    pub fn has_exceeded_max(&self) -> bool {
        self.current_count >= self.max_retries
    }

    /// Counts one more attempt, never going past `max_retries`.
    pub fn update(&mut self) {
        if self.current_count < self.max_retries {
            self.current_count += 1;
        }
    }

    pub fn add_reason(&mut self, reason: impl Into<String>, activity: impl Into<String>) {
        self.reasons.push(RetryReason::new(reason, activity));
    }

    pub fn destinations(&self) -> &[T] {
        &self.destinations
    }

    pub fn has_retry_destinations(&self) -> bool {
        !self.destinations.is_empty()
    }

    pub fn clear_destinations(&mut self) {
        self.destinations.clear();
    }

    pub fn add_destinations(&mut self, destinations: impl IntoIterator<Item = T>) {
        self.destinations.extend(destinations);
    }
}

impl<T> fmt::Display for RetryInformation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Max number of retries: {}. Current retry count: {}",
            self.max_retries, self.current_count
        )
    }
}
