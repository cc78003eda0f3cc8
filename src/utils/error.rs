//! The `error` module defines the error type shared by every part of `embus`.
//!
//! Registration and send failures (`InvalidArgument`, `ResourceNotFound`,
//! `DuplicateEntity`) are returned synchronously to the caller. Delivery-side
//! failures (`Deserialization`, `Processing`) are first offered to the
//! registered handler and only surface as errors when it does not absorb them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BusError>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("no async runtime available: {0}")]
    Runtime(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl BusError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::ResourceNotFound(reason.into())
    }

    /// True for the failures a caller of the send/registration API can get.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::ResourceNotFound(_) | Self::DuplicateEntity(_)
        )
    }
}
