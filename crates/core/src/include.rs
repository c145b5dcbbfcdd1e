//! The include seam.
//!
//! Include directives are resolved eagerly at parse time through an
//! [`Includer`] capability supplied by the embedder. The core ships a
//! refusing default and an in-memory implementation; anything touching
//! the filesystem or network lives outside this crate.

use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `include "name"` -- the includer decides what the name means.
    Heuristic,
    /// `include file("name")`
    File,
    /// `include url("name")`
    Url,
    /// `include classpath("name")`
    Classpath,
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IncludeKind::Heuristic => "heuristic",
            IncludeKind::File => "file",
            IncludeKind::Url => "url",
            IncludeKind::Classpath => "classpath",
        };
        f.write_str(s)
    }
}

/// Loads an included configuration as an object value.
///
/// A missing optional include must return an empty object; a missing
/// required include must return an error.
pub trait Includer {
    fn include(
        &self,
        kind: IncludeKind,
        name: &str,
        required: bool,
    ) -> Result<Value, ConfigError>;
}

/// The default includer: optional includes resolve to nothing, required
/// includes fail.
pub struct NullIncluder;

impl Includer for NullIncluder {
    fn include(
        &self,
        _kind: IncludeKind,
        name: &str,
        required: bool,
    ) -> Result<Value, ConfigError> {
        if required {
            Err(ConfigError::Include {
                name: name.to_owned(),
                message: "no includer is configured".to_owned(),
            })
        } else {
            Ok(Value::empty_object(crate::origin::Origin::new(format!(
                "include(\"{}\")",
                name
            ))))
        }
    }
}

/// Includer over a fixed map of name to source text. Used for embedding
/// and tests; nested includes see the same map.
#[derive(Default)]
pub struct MemoryIncluder {
    sources: HashMap<String, String>,
}

impl MemoryIncluder {
    pub fn new() -> MemoryIncluder {
        MemoryIncluder::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> MemoryIncluder {
        self.sources.insert(name.into(), text.into());
        self
    }
}

impl Includer for MemoryIncluder {
    fn include(
        &self,
        _kind: IncludeKind,
        name: &str,
        required: bool,
    ) -> Result<Value, ConfigError> {
        match self.sources.get(name) {
            Some(text) => {
                let root = crate::parser::parse(text, name, self)?;
                if root.object_fields().is_none() {
                    return Err(ConfigError::Include {
                        name: name.to_owned(),
                        message: "included document is not an object".to_owned(),
                    });
                }
                Ok(root)
            }
            None if required => Err(ConfigError::Include {
                name: name.to_owned(),
                message: "not found".to_owned(),
            }),
            None => Ok(Value::empty_object(crate::origin::Origin::new(format!(
                "include(\"{}\")",
                name
            )))),
        }
    }
}
