//! # embus
//!
//! `embus` is an in-process message broker emulator with queue and
//! publish/subscribe semantics. It lets message-handler code run against
//! queues, topics and filtered subscriptions without a live cloud broker.
//!
//! ## Core Modules
//!
//! - `broker`: the registry of queues and topics, and the scan loops delivering from them.
//! - `client`: the `MessageHandler` trait, handler registration and the message sender.
//! - `config`: loading settings from `config/default` and the environment.
//! - `message`: envelopes, their JSON codec and payload materialization.
//! - `pipeline`: materialize, dispatch and acknowledge one received message.
//! - `utils`: the shared error type, entity path helpers and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod message;
pub mod pipeline;
pub mod utils;
