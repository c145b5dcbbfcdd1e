//! Typed facade over a value tree.
//!
//! A [`Config`] wraps a document root and offers path-based typed
//! accessors with the engine's automatic coercions. The error contract:
//! an absent or null path is `Missing`, a kind mismatch after coercion is
//! `WrongType`, and touching an unresolved node is `NotResolved` until
//! `resolve()` has been called.

use std::rc::Rc;

use crate::error::ConfigError;
use crate::include::{Includer, NullIncluder};
use crate::parser;
use crate::path::Path;
use crate::render::{self, RenderOptions};
use crate::resolve::{self, ResolveOptions};
use crate::transform::transform;
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Config {
    /// Wrap a root value; it must be an object (or something that will
    /// resolve to one).
    pub fn from_root(root: Value) -> Result<Config, ConfigError> {
        if root.object_fields().is_some() || root.is_object_like() {
            Ok(Config { root })
        } else {
            Err(ConfigError::wrong_type(
                root.origin(),
                "a config root must be an object",
            ))
        }
    }

    /// Parse a document; the root must be an object, not an array.
    pub fn parse_str(text: &str) -> Result<Config, ConfigError> {
        Config::parse_str_with(text, "string", &NullIncluder)
    }

    pub fn parse_str_with(
        text: &str,
        description: &str,
        includer: &dyn Includer,
    ) -> Result<Config, ConfigError> {
        Config::from_root(parser::parse(text, description, includer)?)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn is_resolved(&self) -> bool {
        self.root.is_resolved()
    }

    /// Resolve every substitution, merge, and concatenation in the
    /// document. The original config is untouched.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        self.resolve_with(&ResolveOptions::default())
    }

    pub fn resolve_with(&self, options: &ResolveOptions) -> Result<Config, ConfigError> {
        Config::from_root(resolve::resolve(&self.root, options)?)
    }

    /// Lazily resolve one path without materializing the whole document.
    /// `Ok(None)` when the path is absent or an optional substitution
    /// went missing.
    pub fn resolve_value_at(
        &self,
        path: &str,
        options: &ResolveOptions,
    ) -> Result<Option<Value>, ConfigError> {
        let path = Path::parse(path)?;
        resolve::resolve_path(&self.root, &path, options)
    }

    /// Merge: `self` wins wherever both configs provide a value.
    pub fn with_fallback(&self, other: &Config) -> Config {
        Config {
            root: self.root.with_fallback(&other.root),
        }
    }

    // ── Typed access ────────────────────────────────────────────────

    pub fn has_path(&self, path: &str) -> Result<bool, ConfigError> {
        let path = Path::parse(path)?;
        match self.root.peek_path(&path)? {
            Some(v) => Ok(!v.is_null()),
            None => Ok(false),
        }
    }

    /// The raw value at a path; explicit null is returned as a null
    /// value, an absent path is a `Missing` error.
    pub fn get_value(&self, path: &str) -> Result<Value, ConfigError> {
        let parsed = Path::parse(path)?;
        self.root
            .peek_path(&parsed)?
            .ok_or_else(|| ConfigError::missing(self.root.origin(), path))
    }

    fn find(&self, path: &str, expected: ValueType) -> Result<Value, ConfigError> {
        let v = self.get_value(path)?;
        if v.is_null() {
            // an explicit null is as missing as no value at all, but the
            // message can say so
            return Err(ConfigError::missing(v.origin(), format!("{} (value is null)", path)));
        }
        let v = transform(&v, expected);
        let actual = v.value_type()?;
        if actual != expected {
            return Err(ConfigError::wrong_type(
                v.origin(),
                format!("'{}' has type {}, expected {}", path, actual, expected),
            ));
        }
        Ok(v)
    }

    pub fn get_bool(&self, path: &str) -> Result<bool, ConfigError> {
        let v = self.find(path, ValueType::Bool)?;
        Ok(v.as_bool().unwrap_or_default())
    }

    pub fn get_int(&self, path: &str) -> Result<i64, ConfigError> {
        let v = self.find(path, ValueType::Number)?;
        Ok(v.as_int().unwrap_or_default())
    }

    pub fn get_float(&self, path: &str) -> Result<f64, ConfigError> {
        let v = self.find(path, ValueType::Number)?;
        Ok(v.as_float().unwrap_or_default())
    }

    pub fn get_string(&self, path: &str) -> Result<String, ConfigError> {
        let v = self.find(path, ValueType::Str)?;
        Ok(v.as_str().unwrap_or_default().to_owned())
    }

    pub fn get_list(&self, path: &str) -> Result<Vec<Value>, ConfigError> {
        let v = self.find(path, ValueType::List)?;
        Ok(v.list_elements().unwrap_or_default().to_vec())
    }

    pub fn get_config(&self, path: &str) -> Result<Config, ConfigError> {
        let v = self.find(path, ValueType::Object)?;
        Config::from_root(v)
    }

    // ── Output ──────────────────────────────────────────────────────

    pub fn render(&self, options: &RenderOptions) -> String {
        render::render(&self.root, options)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, ConfigError> {
        render::to_json(&self.root)
    }
}

/// Convenience: parse and fully resolve in one step, with an external
/// resolver if given.
pub fn load_str(
    text: &str,
    description: &str,
    includer: &dyn Includer,
    resolver: Option<Rc<dyn resolve::Resolver>>,
) -> Result<Config, ConfigError> {
    let config = Config::parse_str_with(text, description, includer)?;
    let mut options = ResolveOptions::default();
    options.resolver = resolver;
    config.resolve_with(&options)
}
