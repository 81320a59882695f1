//! Resource location resolution
//!
//! Schema documents are identified by URL. Command-line paths are turned
//! into `file:` URLs and `schemaLocation` attributes are joined against the
//! canonical URL of the document that contains them.

use crate::error::{Error, Result};
use std::path::Path;
use url::Url;

/// Turn a user-supplied location (absolute URL or filesystem path) into a URL
pub fn parse_location(s: &str) -> Result<Url> {
    // A single-letter scheme is a Windows drive letter, not a URL.
    if let Ok(url) = Url::parse(s) {
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }

    path_to_url(Path::new(s))
}

/// Convert a filesystem path to a `file:` URL, anchoring relative paths at
/// the current directory
pub fn path_to_url(path: &Path) -> Result<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Url::from_file_path(&absolute)
        .map_err(|_| Error::Resource(format!("Cannot express '{}' as a URL", absolute.display())))
}

/// Resolve a `schemaLocation` against the URL of the referencing document
pub fn resolve_schema_location(base: &Url, location: &str) -> Result<Url> {
    Ok(base.join(location.trim())?)
}

/// Check if this is a remote location (anything but `file:`)
pub fn is_remote(url: &Url) -> bool {
    url.scheme() != "file"
}
