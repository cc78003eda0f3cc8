use serde::Deserialize;

use crate::pipeline::{AckMode, PipelineOptions, UnprocessedPolicy};

/// Endpoint reported in error details when none is configured.
pub const DEFAULT_ENDPOINT: &str = "sb://embus.local";

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub delivery: DeliverySettings,
    pub logging: LoggingSettings,
    pub topology: TopologySettings,
}

/// Configuration settings for the broker.
///
/// Controls how often entities are polled and the endpoint name reported in
/// error details.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub scan_interval_ms: u64,
    pub endpoint: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            scan_interval_ms: 5000,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Acknowledgment behavior of the delivery pipeline.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySettings {
    pub ack_mode: AckMode,
    pub unprocessed: UnprocessedPolicy,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Entities created at startup.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TopologySettings {
    pub queues: Vec<String>,
    pub topics: Vec<TopicSettings>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TopicSettings {
    pub name: String,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSettings>,
}

/// A subscription with a `content_type` only receives envelopes whose short
/// content type matches it.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSettings {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub delivery: Option<PartialDeliverySettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub topology: Option<TopologySettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub scan_interval_ms: Option<u64>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDeliverySettings {
    pub ack_mode: Option<AckMode>,
    pub unprocessed: Option<UnprocessedPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();

        Settings {
            broker: BrokerSettings {
                scan_interval_ms: self
                    .broker
                    .as_ref()
                    .and_then(|b| b.scan_interval_ms)
                    .unwrap_or(default.broker.scan_interval_ms),
                endpoint: self
                    .broker
                    .as_ref()
                    .and_then(|b| b.endpoint.clone())
                    .unwrap_or(default.broker.endpoint),
            },
            delivery: DeliverySettings {
                ack_mode: self
                    .delivery
                    .as_ref()
                    .and_then(|d| d.ack_mode)
                    .unwrap_or(default.delivery.ack_mode),
                unprocessed: self
                    .delivery
                    .as_ref()
                    .and_then(|d| d.unprocessed)
                    .unwrap_or(default.delivery.unprocessed),
            },
            logging: LoggingSettings {
                level: self
                    .logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
            topology: self.topology.unwrap_or(default.topology),
        }
    }
}

impl Settings {
    /// Options for the delivery pipelines created from these settings.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            ack_mode: self.delivery.ack_mode,
            unprocessed: self.delivery.unprocessed,
            endpoint: self.broker.endpoint.clone(),
        }
    }
}
