//! Resource loading utilities
//!
//! The compiler only needs one capability from the outside world: given a
//! URL, produce the document bytes and the canonical URL they were found
//! at. [`Fetch`] is that seam; [`FileLoader`] and [`MemoryLoader`] are the
//! two implementations shipped with the crate.

use crate::error::{Error, Result};
use crate::limits::Limits;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use url::Url;

/// A fetched schema document
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Raw document bytes
    pub bytes: Vec<u8>,
    /// URL the document was actually found at (after redirects or symlinks)
    pub canonical_url: Url,
}

/// Document retrieval capability
pub trait Fetch {
    /// Fetch the document at `url`.
    ///
    /// Returns [`Error::NotFound`] when there is no such document.
    fn fetch(&self, url: &Url) -> Result<Fetched>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &Url) -> Result<Fetched> {
        (**self).fetch(url)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch(&self, url: &Url) -> Result<Fetched> {
        (**self).fetch(url)
    }
}

/// Loader for `file:` URLs
#[derive(Debug, Default)]
pub struct FileLoader {
    /// Resource limits
    limits: Limits,
}

impl FileLoader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

impl Fetch for FileLoader {
    fn fetch(&self, url: &Url) -> Result<Fetched> {
        if url.scheme() != "file" {
            return Err(Error::Resource(format!(
                "Only file URLs can be loaded from disk: {}",
                url
            )));
        }

        let path = url
            .to_file_path()
            .map_err(|_| Error::Resource(format!("Not a local file URL: {}", url)))?;

        let canonical = fs::canonicalize(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(url.to_string()),
            _ => Error::Resource(format!("Failed to resolve '{}': {}", path.display(), e)),
        })?;

        let bytes = fs::read(&canonical).map_err(|e| {
            Error::Resource(format!("Failed to read file '{}': {}", canonical.display(), e))
        })?;

        // Check size limits
        self.limits.check_document_size(bytes.len())?;

        let canonical_url = Url::from_file_path(&canonical).map_err(|_| {
            Error::Resource(format!("Cannot express '{}' as a URL", canonical.display()))
        })?;

        Ok(Fetched {
            bytes,
            canonical_url,
        })
    }
}

/// In-memory document store, with optional redirects between URLs
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    documents: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

/// Redirect chains longer than this are treated as loops
const MAX_REDIRECTS: usize = 16;

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(String::from)
        .unwrap_or_else(|_| url.to_string())
}

impl MemoryLoader {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document
    pub fn insert(&mut self, url: &str, text: impl Into<String>) {
        self.documents.insert(normalize(url), text.into());
    }

    /// Add a document (builder form)
    pub fn with_document(mut self, url: &str, text: impl Into<String>) -> Self {
        self.insert(url, text);
        self
    }

    /// Make `from` redirect to `to`
    pub fn alias(mut self, from: &str, to: &str) -> Self {
        self.aliases.insert(normalize(from), normalize(to));
        self
    }
}

impl Fetch for MemoryLoader {
    fn fetch(&self, url: &Url) -> Result<Fetched> {
        let mut current = url.to_string();
        for _ in 0..MAX_REDIRECTS {
            match self.aliases.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }

        let text = self
            .documents
            .get(&current)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;

        Ok(Fetched {
            bytes: text.as_bytes().to_vec(),
            canonical_url: Url::parse(&current)?,
        })
    }
}
