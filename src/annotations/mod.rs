//! Annotation lookup and translation into proxy models.
//!
//! # Data Flow
//! ```text
//! service / ingress / ConfigMap / configured defaults
//!     → Annotations (first non-empty value wins)
//!     → resolve_min_slots, server_options (synchronization inputs)
//!     → apply_global, apply_defaults, apply_backend (model mutation)
//!     → change detector
//! ```
//!
//! # Design Decisions
//! - A bad value never aborts a pass; it is logged and the annotation ignored
//! - Parsers are pure functions returning `AnnotationError`

use std::collections::BTreeMap;
use thiserror::Error;

pub mod apply;
pub mod values;

pub use apply::{apply_backend, apply_defaults, apply_global, server_options};
pub use values::{parse_bool, parse_int, parse_snippet, parse_time};

/// Names read for the minimum slot count, explicit name first.
pub const MIN_SLOT_ANNOTATIONS: [&str; 3] = ["scale-server-slots", "server-slots", "servers-increment"];

/// Error raised by an annotation value parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("invalid time value '{0}'")]
    Time(String),

    #[error("invalid boolean value '{0}'")]
    Bool(String),

    #[error("invalid integer value '{0}'")]
    Integer(String),

    #[error("{annotation}: {message}")]
    Invalid {
        annotation: &'static str,
        message: String,
    },
}

/// Annotation sources in lookup precedence order.
#[derive(Debug, Clone, Default)]
pub struct Annotations<'a> {
    sources: Vec<&'a BTreeMap<String, String>>,
}

impl<'a> Annotations<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower precedence than those already added.
    pub fn with(mut self, source: &'a BTreeMap<String, String>) -> Self {
        self.sources.push(source);
        self
    }

    /// First non-empty value of `name`.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.sources.iter().find_map(|source| non_empty(source, name))
    }

    /// First non-empty value among `names`, searching source by source.
    pub fn first_of(&self, names: &[&'static str]) -> Option<(&'static str, &'a str)> {
        self.sources.iter().find_map(|source| {
            names
                .iter()
                .find_map(|name| non_empty(source, name).map(|value| (*name, value)))
        })
    }

    /// Parsed value of `name`; parse errors are logged and yield `None`.
    pub fn parsed<T, F>(&self, name: &str, parse: F) -> Option<T>
    where
        F: FnOnce(&str) -> Result<T, AnnotationError>,
    {
        let value = self.get(name)?;
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(annotation = name, error = %err, "Ignoring annotation");
                None
            }
        }
    }
}

fn non_empty<'a>(source: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    source
        .get(name)
        .map(|value| value.as_str())
        .filter(|value| !value.trim().is_empty())
}

/// Minimum number of server slots for a backend; 0 when unset or invalid.
pub fn resolve_min_slots(annotations: &Annotations<'_>) -> usize {
    let Some((name, value)) = annotations.first_of(&MIN_SLOT_ANNOTATIONS) else {
        return 0;
    };
    match value.trim().parse::<usize>() {
        Ok(slots) => slots,
        Err(err) => {
            tracing::warn!(annotation = name, value, error = %err, "Invalid server slot count, using no minimum");
            0
        }
    }
}
