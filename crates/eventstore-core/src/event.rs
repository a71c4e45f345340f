//! Immutable, timestamped and attributed events
//!
//! An [`Event`] carries a timestamp, a source identifier and a map of
//! string attributes. Attribute keys starting with [`RESERVED_PREFIX`] are
//! rejected; two reserved virtual keys ([`SOURCE_KEY`], [`TIMESTAMP_KEY`])
//! are served by [`Event::get`] without being part of the attributes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::dimension::check_key_part;
use crate::error::ValidationError;

/// Prefix reserved for virtual keys
pub const RESERVED_PREFIX: char = '_';

/// Virtual key resolving to the event source
pub const SOURCE_KEY: &str = "_source";

/// Virtual key resolving to the event timestamp
pub const TIMESTAMP_KEY: &str = "_timestamp";

/// Attribute map of an event
pub type Attributes = BTreeMap<String, String>;

/// An immutable record of something that happened at a source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EventRepr", into = "EventRepr")]
pub struct Event {
    timestamp: DateTime<Utc>,
    source: String,
    attributes: Attributes,
}

impl Event {
    /// Create a new event
    ///
    /// Rejects reserved attribute keys and a source containing
    /// [`KEY_SEPARATOR`](crate::KEY_SEPARATOR).
    pub fn new(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        attributes: Attributes,
    ) -> Result<Self, ValidationError> {
        let source = source.into();
        check_key_part(&source)?;
        validate_attributes(&attributes)?;
        Ok(Self {
            timestamp,
            source,
            attributes,
        })
    }

    /// Create an event from any iterator of attribute pairs
    pub fn from_pairs<K, V>(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ValidationError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let attributes = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(timestamp, source, attributes)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Get an attribute or one of the reserved virtual keys
    ///
    /// `_timestamp` renders as RFC 3339 with millisecond precision.
    /// Any other key starting with `_` is an error.
    pub fn get(&self, key: &str) -> Result<Option<String>, ValidationError> {
        if !key.starts_with(RESERVED_PREFIX) {
            return Ok(self.attributes.get(key).cloned());
        }
        match key {
            SOURCE_KEY => Ok(Some(self.source.clone())),
            TIMESTAMP_KEY => Ok(Some(
                self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            other => Err(ValidationError::UnknownReservedKey(other.to_string())),
        }
    }
}

fn validate_attributes(attributes: &Attributes) -> Result<(), ValidationError> {
    match attributes.keys().find(|k| k.starts_with(RESERVED_PREFIX)) {
        Some(key) => Err(ValidationError::ReservedAttributeKey(key.clone())),
        None => Ok(()),
    }
}

/// Total order on events: timestamp first, then source
///
/// Supplied explicitly to sorting and merging code; `Event` itself is not `Ord`.
pub fn chronological(a: &Event, b: &Event) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.source.cmp(&b.source))
}

/// Wire shape of an event
#[derive(Serialize, Deserialize)]
struct EventRepr {
    timestamp: DateTime<Utc>,
    source: String,
    #[serde(default)]
    attributes: Attributes,
}

impl TryFrom<EventRepr> for Event {
    type Error = ValidationError;

    fn try_from(repr: EventRepr) -> Result<Self, Self::Error> {
        Event::new(repr.timestamp, repr.source, repr.attributes)
    }
}

impl From<Event> for EventRepr {
    fn from(event: Event) -> Self {
        Self {
            timestamp: event.timestamp,
            source: event.source,
            attributes: event.attributes,
        }
    }
}
