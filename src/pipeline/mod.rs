//! The `pipeline` module turns a received envelope into a handler call and
//! settles it afterwards: materialize, dispatch, then complete or dead-letter.
//!
//! It serves both the emulator scan loops and a broker-driven receive path
//! that hands over raw message bytes.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::DEFAULT_ENDPOINT;
use crate::utils::error::Result;

pub mod delivery;

pub use delivery::DeliveryPipeline;

/// `ErrorDetail::action` for failures raised by the handler itself.
pub const ACTION_USER_CALLBACK: &str = "UserCallback";
/// `ErrorDetail::action` for a failed completion.
pub const ACTION_COMPLETE: &str = "Complete";
/// `ErrorDetail::action` for a failed dead-letter.
pub const ACTION_DEAD_LETTER: &str = "DeadLetter";

/// Acknowledgment actions available for one received message.
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn complete(&self) -> Result<()>;
    async fn dead_letter(&self, reason: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// The pipeline completes a message once its handler returns `true`.
    #[default]
    Manual,
    /// The transport completes messages on its own.
    Auto,
}

/// What happens to a message whose handler returned `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnprocessedPolicy {
    #[default]
    LeaveUncompleted,
    DeadLetter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub ack_mode: AckMode,
    pub unprocessed: UnprocessedPolicy,
    /// Reported in `ErrorDetail::endpoint`.
    pub endpoint: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ack_mode: AckMode::default(),
            unprocessed: UnprocessedPolicy::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handler returned `true`.
    Completed,
    /// Handler returned `false`, message left as is.
    Unprocessed,
    /// Handler returned `false`, message moved to the dead-letter store.
    DeadLettered,
    /// Deserialization failed and the handler chose to drop the message.
    Discarded,
    /// Handler returned an error or panicked.
    Failed,
}

#[cfg(test)]
mod tests;
