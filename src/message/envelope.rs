//! Envelope definitions
//!
//! Every message travelling through the broker is wrapped in an `Envelope`
//! made of two parts:
//! - `Header`: metadata the infrastructure can act on without looking at the
//!   payload (creation time, content format)
//! - `Body`: the payload itself plus its type name and optional retry / error
//!   annotations
//!
//! The payload is kept base64-encoded (UTF-8 text of the serialized value)
//! until a receiver materializes it through a `ContentTypes` registry.

use std::fmt;

use base64::prelude::*;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::mime;
use super::retry::RetryInformation;
use crate::utils::error::{BusError, Result};

/// Layout of `Header::created`, e.g. `2024/05/01 13:45:00`.
pub const DEFAULT_DATE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub created: String,
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content_type_short: String,
    #[serde(default)]
    pub retry_information: Option<serde_json::Value>,
    #[serde(default)]
    pub error_information: Option<ErrorInformation>,
}

/// Set by a handler that wants to flag a processing error for whoever
/// inspects the envelope downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInformation {
    pub date_time: DateTime<Utc>,
    pub source: String,
    pub reason: String,
}

fn default_format() -> String {
    mime::DEFAULT_FORMAT.to_string()
}

impl Header {
    pub fn new() -> Self {
        Self::created_at(Local::now().naive_local())
    }

    pub fn created_at(created: NaiveDateTime) -> Self {
        Self {
            created: created.format(DEFAULT_DATE_TIME_FORMAT).to_string(),
            format: default_format(),
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorInformation {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            date_time: Utc::now(),
            source: source.into(),
            reason: reason.into(),
        }
    }
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            header: Header::new(),
            body: Body::default(),
        }
    }

    /// Wraps `content` as JSON, recording `T` as the content type.
    pub fn create<T: Serialize + ?Sized>(content: &T) -> Result<Self> {
        let mut envelope = Self::new();
        envelope.set_content(content)?;
        Ok(envelope)
    }

    /// Wraps text that is already serialized in `format`.
    pub fn from_serialized<T: ?Sized>(content: &str, format: &str) -> Self {
        let mut envelope = Self::new();
        envelope.set_serialized_content::<T>(content);
        envelope.set_format(format);
        envelope
    }

    pub fn set_content<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| {
            BusError::invalid_argument(format!("content cannot be serialized: {e}"))
        })?;
        self.set_serialized_content::<T>(&json);
        Ok(())
    }

    pub fn set_serialized_content<T: ?Sized>(&mut self, value: &str) {
        self.body.content = BASE64_STANDARD.encode(value.as_bytes());
        self.set_content_type::<T>();
    }

    pub fn set_content_type<T: ?Sized>(&mut self) {
        let full = std::any::type_name::<T>();
        self.body.content_type = full.to_string();
        self.body.content_type_short = short_type_name(full).to_string();
    }

    pub fn set_format(&mut self, format: &str) {
        self.header.format = format.to_string();
    }

    pub fn set_retry_information<T: Serialize>(
        &mut self,
        retry: &RetryInformation<T>,
    ) -> Result<()> {
        let value = serde_json::to_value(retry).map_err(|e| {
            BusError::invalid_argument(format!("retry information cannot be serialized: {e}"))
        })?;
        self.body.retry_information = Some(value);
        Ok(())
    }

    /// Reads the retry information back as `RetryInformation<T>`, if present.
    pub fn retry_information<T: DeserializeOwned>(&self) -> Option<Result<RetryInformation<T>>> {
        self.body.retry_information.as_ref().map(|value| {
            serde_json::from_value(value.clone())
                .map_err(|e| BusError::Deserialization(format!("retry information: {e}")))
        })
    }

    pub fn set_error_information(&mut self, source: &str, reason: &str) {
        self.set_error_information_value(ErrorInformation::new(source, reason));
    }

    pub fn set_error_information_value(&mut self, error: ErrorInformation) {
        self.body.error_information = Some(error);
    }

    pub fn format(&self) -> &str {
        &self.header.format
    }

    pub fn content(&self) -> &str {
        &self.body.content
    }

    pub fn content_type(&self) -> &str {
        &self.body.content_type
    }

    pub fn content_type_short(&self) -> &str {
        &self.body.content_type_short
    }

    /// Base64-decodes the body content back into its serialized text.
    pub fn decoded_content(&self) -> Result<String> {
        let bytes = BASE64_STANDARD
            .decode(self.body.content.as_bytes())
            .map_err(|e| BusError::Deserialization(format!("content is not valid base64: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| BusError::Deserialization(format!("content is not valid UTF-8: {e}")))
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// `alloc::vec::Vec<my_app::Order>` -> `Vec`, `my_app::Order` -> `Order`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
