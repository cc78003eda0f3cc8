//! Envelope codec
//!
//! Envelopes travel as compact JSON text encoded in UTF-8. The payload inside
//! the body is not touched here; see `ContentTypes::materialize`.

use super::envelope::Envelope;
use crate::utils::error::{BusError, Result};

pub fn serialize_envelope(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope)
        .map_err(|e| BusError::invalid_argument(format!("envelope cannot be serialized: {e}")))
}

pub fn deserialize_envelope(text: &str) -> Result<Envelope> {
    if text.trim().is_empty() {
        return Err(BusError::Deserialization("message is empty".to_string()));
    }
    serde_json::from_str(text)
        .map_err(|e| BusError::Deserialization(format!("envelope is malformed: {e}")))
}

pub fn envelope_to_bytes(envelope: &Envelope) -> Result<Vec<u8>> {
    serialize_envelope(envelope).map(String::into_bytes)
}

/// Decodes a raw transport body. Returns the decoded text alongside the
/// result so a failure can still be reported with the raw message.
pub fn envelope_from_bytes(bytes: &[u8]) -> (String, Result<Envelope>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), deserialize_envelope(text)),
        Err(e) => (
            String::from_utf8_lossy(bytes).into_owned(),
            Err(BusError::Deserialization(format!(
                "message is not valid UTF-8: {e}"
            ))),
        ),
    }
}
