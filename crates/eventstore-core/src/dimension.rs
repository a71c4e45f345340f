//! Index dimensions
//!
//! A dimension is the partition key under which a time index is kept:
//! the event source alone, or the source combined with one secondary
//! attribute (lot name, process id).
//!
//! Sources and field names never contain [`KEY_SEPARATOR`], so a composed
//! key splits back into its parts unambiguously. Only the trailing value
//! of a secondary dimension may contain it.

use std::fmt;

use crate::error::ValidationError;
use crate::event::Event;

/// Separator used when composing storage keys
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Reject a source or field name that would break key composition
pub fn check_key_part(part: &str) -> Result<(), ValidationError> {
    if part.contains(KEY_SEPARATOR) {
        return Err(ValidationError::InvalidKey(part.to_string()));
    }
    Ok(())
}

/// Partition key of a time index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexDimension {
    /// All events of one source
    Source { source: String },
    /// Events of one source carrying `field == value`
    Secondary {
        source: String,
        field: String,
        value: String,
    },
}

impl IndexDimension {
    pub fn source(source: impl Into<String>) -> Self {
        Self::Source {
            source: source.into(),
        }
    }

    pub fn secondary(
        source: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Secondary {
            source: source.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// The source this dimension partitions
    pub fn source_name(&self) -> &str {
        match self {
            Self::Source { source } | Self::Secondary { source, .. } => source,
        }
    }

    /// Name of the index family ("source" or the secondary field)
    pub fn name(&self) -> &str {
        match self {
            Self::Source { .. } => "source",
            Self::Secondary { field, .. } => field,
        }
    }

    /// Attribute equality the dimension imposes beyond the source
    pub fn secondary_filter(&self) -> Option<(&str, &str)> {
        match self {
            Self::Source { .. } => None,
            Self::Secondary { field, value, .. } => Some((field, value)),
        }
    }

    /// Check that the source and field can be composed into a key
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_key_part(self.source_name())?;
        if let Some((field, _)) = self.secondary_filter() {
            check_key_part(field)?;
        }
        Ok(())
    }

    /// Storage key unique to this dimension
    pub fn key(&self) -> String {
        match self {
            Self::Source { source } => source.clone(),
            Self::Secondary {
                source,
                field,
                value,
            } => format!("{source}{KEY_SEPARATOR}{field}{KEY_SEPARATOR}{value}"),
        }
    }

    /// Every dimension an event belongs to, given the secondary fields indexed
    pub fn for_event(event: &Event, secondary_fields: &[String]) -> Vec<Self> {
        let mut dims = vec![Self::source(event.source())];
        for field in secondary_fields {
            if let Some(value) = event.attributes().get(field) {
                dims.push(Self::secondary(event.source(), field.clone(), value.clone()));
            }
        }
        dims
    }
}

impl fmt::Display for IndexDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { source } => write!(f, "{source}"),
            Self::Secondary {
                source,
                field,
                value,
            } => write!(f, "{source}[{field}={value}]"),
        }
    }
}
