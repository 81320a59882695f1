//! Schema compiler entry point
//!
//! [`Compiler`] drives the two passes. Documents are fetched and parsed
//! from a worklist: the root first, then every import and include found,
//! each canonical URL at most once. Only when the worklist is empty, so
//! every reachable document has finished its first pass, does the second
//! pass start.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::loaders::Fetch;
use crate::locations::{is_remote, parse_location};
use std::collections::VecDeque;
use tracing::{debug, warn};
use url::Url;

use super::compilation::{Compilation, DocumentError, DocumentId};
use super::parsing;
use super::rules::TagKind;

/// Compiler settings
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Resource limits
    pub limits: Limits,
    /// Fetch non-`file:` URLs
    pub allow_remote: bool,
    /// Included documents without a target namespace adopt the includer's
    pub chameleon_includes: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            allow_remote: true,
            chameleon_includes: true,
        }
    }
}

impl CompilerOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Allow or forbid remote fetches
    pub fn with_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Enable or disable chameleon includes
    pub fn with_chameleon_includes(mut self, enabled: bool) -> Self {
        self.chameleon_includes = enabled;
        self
    }
}

/// One document waiting for its first pass
#[derive(Debug)]
struct Work {
    url: Url,
    chameleon: Option<String>,
    from: Option<DocumentId>,
}

/// XSD compiler over a document fetch capability
#[derive(Debug)]
pub struct Compiler<F> {
    fetcher: F,
    options: CompilerOptions,
}

impl<F: Fetch> Compiler<F> {
    /// Create a compiler with default options
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            options: CompilerOptions::default(),
        }
    }

    /// Set the options
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile the schema at a location given as URL or filesystem path
    pub fn compile_location(&self, location: &str) -> Result<Compilation> {
        self.compile(&parse_location(location)?)
    }

    /// Compile the schema at `url` and everything it imports.
    ///
    /// Fails only when the root document cannot be fetched or parsed;
    /// broken imports are recorded in
    /// [`Compilation::document_errors`] and unresolved names in
    /// [`Compilation::errors`].
    pub fn compile(&self, url: &Url) -> Result<Compilation> {
        let mut cx = Compilation::new();
        let mut worklist = VecDeque::new();
        worklist.push_back(Work {
            url: url.clone(),
            chameleon: None,
            from: None,
        });

        while let Some(work) = worklist.pop_front() {
            let (document, fresh) = match self.load(&mut cx, &work) {
                Ok(loaded) => loaded,
                Err(error) if work.from.is_none() => return Err(error),
                Err(error) => {
                    warn!(url = %work.url, %error, "imported document failed");
                    cx.document_errors.push(DocumentError {
                        url: work.url,
                        error,
                    });
                    continue;
                }
            };

            if let Some(from) = work.from {
                let dependencies = &mut cx.document_mut(from).dependencies;
                if !dependencies.contains(&document) {
                    dependencies.push(document);
                }
            }

            if fresh {
                for record in cx.document(document).imports.clone() {
                    let chameleon = match record.kind {
                        TagKind::Include => record.namespace,
                        _ => None,
                    };
                    worklist.push_back(Work {
                        url: record.location,
                        chameleon,
                        from: Some(document),
                    });
                }
            }
        }

        cx.second_pass();
        Ok(cx)
    }

    /// Fetch and parse one document unless it is already known, in the
    /// namespace it is requested for. Returns the document and whether it
    /// was parsed by this call.
    fn load(&self, cx: &mut Compilation, work: &Work) -> Result<(DocumentId, bool)> {
        let chameleon = work
            .chameleon
            .as_deref()
            .filter(|_| self.options.chameleon_includes);
        let known = cx.document_by_url(&work.url);
        if let Some(document) = known.and_then(|d| cx.namespace_variant(d, chameleon)) {
            return Ok((document, false));
        }

        if !self.options.allow_remote && is_remote(&work.url) {
            return Err(Error::Resource(format!(
                "Remote schema loading is disabled: {}",
                work.url
            )));
        }
        self.options.limits.check_documents(cx.documents.len() + 1)?;

        debug!(url = %work.url, "fetching schema document");
        let fetched = self.fetcher.fetch(&work.url)?;
        if let Some(document) = cx.document_by_url(&fetched.canonical_url) {
            cx.alias_url(&work.url, document);
            if let Some(variant) = cx.namespace_variant(document, chameleon) {
                return Ok((variant, false));
            }
            debug!(
                url = %fetched.canonical_url,
                namespace = chameleon.unwrap_or(""),
                "compiling chameleon document into another namespace"
            );
        }
        self.options
            .limits
            .check_document_size(fetched.bytes.len())?;

        let document = cx.add_document(fetched.canonical_url, work.url.clone());

        match parsing::parse_document(cx, document, &fetched.bytes, chameleon, &self.options.limits)
        {
            Ok(()) => {
                cx.finish_first_pass(document);
                Ok((document, true))
            }
            Err(error) => {
                cx.fail_document(document);
                Err(error)
            }
        }
    }
}
