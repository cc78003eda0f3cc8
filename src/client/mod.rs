//! The `client` module is the user-facing side of the emulator.
//!
//! Handlers implement `MessageHandler` and are attached to a queue or
//! subscription through a `HandlerRegistry`; `MessageSender` puts envelopes
//! onto queues and topics.

pub mod handler;
pub mod registry;
pub mod sender;

pub use handler::{
    Delivery, DeliveryMode, DeserializationErrorDetail, ErrorDetail, HandlerRegistration,
    HandlerResult, MaterializedEnvelope, MessageHandler, ReceiverKind,
};
pub use registry::HandlerRegistry;
pub use sender::MessageSender;
