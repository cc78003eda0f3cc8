//! The `message` module defines what travels through the broker.
//!
//! - `envelope`: the header + body wrapper and its factory methods
//! - `retry`: retry bookkeeping that callers may attach to a body
//! - `codec`: envelope JSON encoding used on the wire
//! - `content`: turning an encoded payload back into a typed value
//! - `mime`: the content formats the codec understands

pub mod codec;
pub mod content;
pub mod envelope;
pub mod mime;
pub mod retry;

pub use codec::{deserialize_envelope, serialize_envelope};
pub use content::{Content, ContentTypes};
pub use envelope::{Body, Envelope, ErrorInformation, Header};
pub use retry::{RetryInformation, RetryReason};
