//! Limits and constraints for schema compilation
//!
//! This module defines various limits to prevent resource exhaustion
//! when compiling large or hostile schema sets (deeply nested documents,
//! huge files, runaway import graphs).

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum tag nesting depth within one document
    pub max_xml_depth: usize,

    /// Maximum schema document size in bytes
    pub max_document_size: usize,

    /// Maximum number of documents reachable through imports and includes
    pub max_documents: usize,

    /// Maximum number of attributes per tag
    pub max_attributes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 1000,
            max_document_size: 100 * 1024 * 1024, // 100 MB
            max_documents: 10000,
            max_attributes: 1000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 100,
            max_document_size: 10 * 1024 * 1024, // 10 MB
            max_documents: 100,
            max_attributes: 100,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_depth: 10000,
            max_document_size: 1024 * 1024 * 1024, // 1 GB
            max_documents: 1000000,
            max_attributes: 10000,
        }
    }

    /// Fail when a tag is nested deeper than allowed
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        within("tag depth", depth, self.max_xml_depth)
    }

    /// Fail when a fetched document is too large
    pub fn check_document_size(&self, size: usize) -> Result<()> {
        within("document size in bytes", size, self.max_document_size)
    }

    /// Fail when the import graph grows past the document cap
    pub fn check_documents(&self, count: usize) -> Result<()> {
        within("document count", count, self.max_documents)
    }

    /// Fail when a single tag carries too many attributes
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        within("attribute count", count, self.max_attributes)
    }
}

fn within(what: &str, value: usize, max: usize) -> Result<()> {
    if value > max {
        return Err(Error::LimitExceeded(format!(
            "{} {} exceeds maximum {}",
            what, value, max
        )));
    }
    Ok(())
}
