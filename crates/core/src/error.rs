//! Error taxonomy for parsing, resolution, and typed access.

use thiserror::Error;

use crate::origin::Origin;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Malformed input text. Carries the origin (with line number) of the
    /// offending token sequence.
    #[error("{origin}: {message}")]
    Parse { origin: Origin, message: String },

    /// A value had the wrong kind for the requested operation, e.g.
    /// concatenating a list with an incompatible scalar.
    #[error("{origin}: {message}")]
    WrongType { origin: Origin, message: String },

    /// Type or value access on a node that still contains substitutions;
    /// recoverable by calling `resolve()` first.
    #[error("value is not resolved, call resolve() first: {message}")]
    NotResolved { message: String },

    /// A non-optional substitution was never found, or was part of a
    /// genuine reference cycle. The message carries the substitution
    /// trace.
    #[error("{origin}: {message}")]
    UnresolvedSubstitution { origin: Origin, message: String },

    /// Facade lookup of a path that is absent or explicitly null.
    #[error("{origin}: no value at '{path}'")]
    Missing { origin: Origin, path: String },

    /// An include directive could not be satisfied.
    #[error("include '{name}': {message}")]
    Include { name: String, message: String },

    /// Internal invariant violation. Never expected at runtime; always a
    /// bug in this library.
    #[error("bug or broken: {message}")]
    BugOrBroken { message: String },
}

impl ConfigError {
    pub fn bug(message: impl Into<String>) -> ConfigError {
        ConfigError::BugOrBroken {
            message: message.into(),
        }
    }

    pub fn parse(origin: &Origin, message: impl Into<String>) -> ConfigError {
        ConfigError::Parse {
            origin: origin.clone(),
            message: message.into(),
        }
    }

    pub fn wrong_type(origin: &Origin, message: impl Into<String>) -> ConfigError {
        ConfigError::WrongType {
            origin: origin.clone(),
            message: message.into(),
        }
    }

    pub fn not_resolved(message: impl Into<String>) -> ConfigError {
        ConfigError::NotResolved {
            message: message.into(),
        }
    }

    pub fn unresolved(origin: &Origin, message: impl Into<String>) -> ConfigError {
        ConfigError::UnresolvedSubstitution {
            origin: origin.clone(),
            message: message.into(),
        }
    }

    pub fn missing(origin: &Origin, path: impl Into<String>) -> ConfigError {
        ConfigError::Missing {
            origin: origin.clone(),
            path: path.into(),
        }
    }
}
