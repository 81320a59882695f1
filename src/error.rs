//! Error types for xsd-compiler
//!
//! This module defines all error types used throughout the library.
//! First-pass problems (malformed documents, unreadable resources) are
//! reported through [`Error`]; second-pass problems are collected as
//! [`ResolveError`] values so that one broken reference does not hide the rest.

use std::fmt;
use thiserror::Error;

use crate::compiler::TagKind;
use crate::namespaces::QName;

/// Result type alias using xsd-compiler Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsd-compiler operations
#[derive(Error, Debug)]
pub enum Error {
    /// Schema document is malformed or uses a construct incorrectly
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// The fetch capability has no document for this URL
    #[error("not found: {0}")]
    NotFound(String),

    /// Namespace error (unknown prefix)
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML tokenizer error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// One or more references could not be resolved
    #[error("{} unresolved reference(s), first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Unresolved(Vec<ResolveError>),
}

/// Location of a tag inside a schema document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// Canonical URL of the document
    pub url: String,
    /// 1-based line number
    pub line: usize,
}

impl SourcePosition {
    /// Create a new position
    pub fn new(url: impl Into<String>, line: usize) -> Self {
        Self {
            url: url.into(),
            line,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.url, self.line)
    }
}

/// Second-pass failure attached to one schema node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A `ref`, `base`, `type`, `substitutionGroup`, `itemType` or
    /// `memberTypes` attribute names a symbol that is not reachable
    #[error("missing {kind} reference '{name}' at {position}")]
    MissingReference {
        /// Tag kind holding the reference
        kind: TagKind,
        /// Name that failed to resolve
        name: QName,
        /// Where the referencing tag is
        position: SourcePosition,
    },

    /// A derivation or group reference depends on itself
    #[error("circular {kind} reference '{name}' at {position}")]
    CircularReference {
        /// Tag kind holding the reference
        kind: TagKind,
        /// Name that closes the cycle
        name: QName,
        /// Where the referencing tag is
        position: SourcePosition,
    },
}

impl ResolveError {
    /// The unresolved name
    pub fn name(&self) -> &QName {
        match self {
            ResolveError::MissingReference { name, .. }
            | ResolveError::CircularReference { name, .. } => name,
        }
    }

    /// Where the offending tag is
    pub fn position(&self) -> &SourcePosition {
        match self {
            ResolveError::MissingReference { position, .. }
            | ResolveError::CircularReference { position, .. } => position,
        }
    }
}

/// Malformed schema document error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema file
    pub location: Option<SourcePosition>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: SourcePosition) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, " (at {})", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}
