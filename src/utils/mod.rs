//! The `utils` module collects the pieces every other module leans on:
//! the shared error type, entity path canonicalization and logging setup.

pub mod error;
pub mod logging;
pub mod path;

pub use error::{BusError, Result};
