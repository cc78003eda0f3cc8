//! MIME content types understood by the envelope codec.

pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";
pub const TEXT: &str = "text/plain";

/// Format stamped on new envelopes.
pub const DEFAULT_FORMAT: &str = JSON;
