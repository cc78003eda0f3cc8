//! Content materialization
//!
//! An envelope only names its payload type (`Body::content_type`). A receiving
//! process turns the encoded payload back into a value by looking that name up
//! in a `ContentTypes` registry, which knows how to decode each registered type
//! from JSON and XML.
//!
//! Materialized values are handed to handlers as `Content`, a cheap-to-clone,
//! type-erased wrapper that is read back with `downcast_ref`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::envelope::{Envelope, short_type_name};
use super::mime;
use crate::utils::error::{BusError, Result};

type Decoder = Arc<dyn Fn(&str) -> std::result::Result<Content, String> + Send + Sync>;

/// A materialized payload.
#[derive(Clone)]
pub struct Content {
    type_name: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl Content {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value: Arc::new(value),
        }
    }

    /// Fully-qualified name of the type the payload was declared as.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn short_type_name(&self) -> &str {
        short_type_name(&self.type_name)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.value).is::<T>()
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

struct Decoders {
    json: Decoder,
    xml: Decoder,
}

/// Registry of payload types a process can materialize.
#[derive(Clone, Default)]
pub struct ContentTypes {
    entries: HashMap<String, Arc<Decoders>>,
    json_fallback: bool,
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes JSON payloads of unregistered types as `serde_json::Value`
    /// instead of failing.
    pub fn with_json_fallback(mut self) -> Self {
        self.json_fallback = true;
        self
    }

    pub fn register<T>(mut self) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.insert::<T>(None);
        self
    }

    /// Registers `T` with its own decoder for `application/xml` payloads in
    /// place of the serde one.
    pub fn register_with_xml<T, F>(mut self, decode: F) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
        F: Fn(&str) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        let name = std::any::type_name::<T>();
        let xml: Decoder = Arc::new(move |text: &str| decode(text).map(|v| Content::new(name, v)));
        self.insert::<T>(Some(xml));
        self
    }

    fn insert<T>(&mut self, xml: Option<Decoder>)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let name = std::any::type_name::<T>();
        let json: Decoder = Arc::new(move |text: &str| {
            serde_json::from_str::<T>(text)
                .map(|v| Content::new(name, v))
                .map_err(|e| e.to_string())
        });
        let xml = xml.unwrap_or_else(|| {
            let decode: Decoder = Arc::new(move |text: &str| {
                quick_xml::de::from_str::<T>(text)
                    .map(|v| Content::new(name, v))
                    .map_err(|e| e.to_string())
            });
            decode
        });
        self.entries
            .insert(name.to_string(), Arc::new(Decoders { json, xml }));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decodes the envelope payload into the type named by its content type,
    /// honoring the header format.
    pub fn materialize(&self, envelope: &Envelope) -> Result<Content> {
        let type_name = envelope.content_type();
        let decoders = self.entries.get(type_name);
        if decoders.is_none() && !(self.json_fallback && envelope.format() == mime::JSON) {
            return Err(BusError::Deserialization(format!(
                "content type '{type_name}' cannot be resolved"
            )));
        }

        let text = envelope.decoded_content()?;

        let decoded = match (envelope.format(), decoders) {
            (mime::JSON, Some(d)) => (d.json)(&text),
            (mime::JSON, None) => serde_json::from_str::<serde_json::Value>(&text)
                .map(|v| Content::new(type_name, v))
                .map_err(|e| e.to_string()),
            (mime::XML, Some(d)) => (d.xml)(&text),
            (other, _) => Err(format!("invalid envelope format MIME type '{other}'")),
        };

        decoded.map_err(|reason| {
            BusError::Deserialization(format!("'{type_name}' could not be decoded: {reason}"))
        })
    }
}

impl fmt::Debug for ContentTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentTypes")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .field("json_fallback", &self.json_fallback)
            .finish()
    }
}
