//! Namespace registry
//!
//! Namespaces are created on first reference and merged on later ones: a
//! namespace can be discovered through its URI (a `targetNamespace` or an
//! `xmlns` declaration) or through the URL of the document defining it.
//! Each field keeps the first non-empty value it is given.

use crate::namespaces::NamespaceContext;
use std::collections::HashMap;
use url::Url;

use super::scope::{ScopeArena, ScopeId};

/// Identifier of a namespace in a [`NamespaceRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(usize);

/// Identifier of a parsed schema document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in creation order
    pub fn index(self) -> usize {
        self.0
    }
}

/// A registered namespace
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Identifier
    pub id: NamespaceId,
    /// Logical name: the namespace URI, empty for "no namespace"
    pub name: Option<String>,
    /// Canonical URL of the schema document defining it
    pub url: Option<String>,
    /// Short alias (the first prefix seen bound to it)
    pub short: Option<String>,
    /// Root scope holding the namespace's global definitions
    pub scope: ScopeId,
    /// Documents contributing to this namespace
    pub sources: Vec<SourceId>,
    /// Foreign namespaces referenced from this one, in first-use order
    pub references: Vec<NamespaceId>,
}

/// A parsed schema document
#[derive(Debug, Clone)]
pub struct Source {
    /// Identifier
    pub id: SourceId,
    /// Canonical URL
    pub url: Url,
    /// URL the document was requested as
    pub requested_url: Url,
    /// Namespace the document's definitions go into
    pub target_namespace: NamespaceId,
    /// Namespace of unprefixed references, if declared
    pub default_namespace: Option<NamespaceId>,
    /// Prefix table of the root tag
    pub prefixes: NamespaceContext,
}

/// Registry of every namespace seen during a compilation
#[derive(Debug)]
pub struct NamespaceRegistry {
    namespaces: Vec<Namespace>,
    by_name: HashMap<String, NamespaceId>,
    by_url: HashMap<String, NamespaceId>,
    primitives: ScopeId,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl NamespaceRegistry {
    /// Create a registry whose namespace root scopes hang off `primitives`
    pub fn new(primitives: ScopeId) -> Self {
        Self {
            namespaces: Vec::new(),
            by_name: HashMap::new(),
            by_url: HashMap::new(),
            primitives,
        }
    }

    /// Register (or look up and merge) a namespace.
    ///
    /// `name` may be the empty string, standing for the absent namespace.
    /// `url` and `short` are only recorded when non-empty and not already
    /// set.
    pub fn register(
        &mut self,
        scopes: &mut ScopeArena,
        name: Option<&str>,
        url: Option<&str>,
        short: Option<&str>,
    ) -> NamespaceId {
        let url = non_empty(url);
        let short = non_empty(short);

        let existing = name
            .and_then(|n| self.by_name.get(n))
            .or_else(|| url.and_then(|u| self.by_url.get(u)))
            .copied();

        let id = match existing {
            Some(id) => id,
            None => {
                let id = NamespaceId(self.namespaces.len());
                let scope = scopes.create(Some(self.primitives), Some(id));
                self.namespaces.push(Namespace {
                    id,
                    name: None,
                    url: None,
                    short: None,
                    scope,
                    sources: Vec::new(),
                    references: Vec::new(),
                });
                id
            }
        };

        let namespace = &mut self.namespaces[id.0];
        if let Some(name) = name.filter(|_| namespace.name.is_none()) {
            namespace.name = Some(name.to_string());
            self.by_name.entry(name.to_string()).or_insert(id);
        }
        if let Some(url) = url.filter(|_| namespace.url.is_none()) {
            namespace.url = Some(url.to_string());
            self.by_url.entry(url.to_string()).or_insert(id);
        }
        if let Some(short) = short.filter(|_| namespace.short.is_none()) {
            namespace.short = Some(short.to_string());
        }

        id
    }

    /// Find a namespace by URI
    pub fn find(&self, name: &str) -> Option<NamespaceId> {
        self.by_name.get(name).copied()
    }

    /// Find a namespace by defining document URL
    pub fn find_by_url(&self, url: &str) -> Option<NamespaceId> {
        self.by_url.get(url).copied()
    }

    /// Get a namespace
    pub fn get(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    /// Attach a source document to its target namespace
    pub fn add_source(&mut self, id: NamespaceId, source: SourceId) {
        self.namespaces[id.0].sources.push(source);
    }

    /// Note that `from` uses a definition of `to`
    pub fn add_reference(&mut self, from: NamespaceId, to: NamespaceId) {
        let references = &mut self.namespaces[from.0].references;
        if from != to && !references.contains(&to) {
            references.push(to);
        }
    }

    /// Iterate over all namespaces in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.iter()
    }

    /// Number of namespaces
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Check if no namespace is registered
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> (NamespaceRegistry, ScopeArena) {
        let mut scopes = ScopeArena::new();
        let primitives = scopes.create(None, None);
        (NamespaceRegistry::new(primitives), scopes)
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut registry, mut scopes) = registry();
        let a = registry.register(&mut scopes, Some("urn:a"), None, None);
        let b = registry.register(&mut scopes, Some("urn:a"), None, None);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("urn:a"), Some(a));
    }

    #[test]
    fn test_first_non_empty_value_wins() {
        let (mut registry, mut scopes) = registry();
        let id = registry.register(&mut scopes, Some("urn:a"), None, Some(""));
        registry.register(&mut scopes, Some("urn:a"), Some("file:///a.xsd"), Some("a"));
        registry.register(&mut scopes, Some("urn:a"), Some("file:///other.xsd"), Some("b"));

        let namespace = registry.get(id);
        assert_eq!(namespace.url.as_deref(), Some("file:///a.xsd"));
        assert_eq!(namespace.short.as_deref(), Some("a"));
        assert_eq!(registry.find_by_url("file:///a.xsd"), Some(id));
    }

    #[test]
    fn test_url_first_then_name() {
        let (mut registry, mut scopes) = registry();
        let by_url = registry.register(&mut scopes, None, Some("file:///a.xsd"), None);
        let by_both = registry.register(&mut scopes, Some("urn:a"), Some("file:///a.xsd"), None);
        assert_eq!(by_url, by_both);
        assert_eq!(registry.find("urn:a"), Some(by_url));
    }

    #[test]
    fn test_root_scope_hangs_off_primitives() {
        let (mut registry, mut scopes) = registry();
        let id = registry.register(&mut scopes, Some("urn:a"), None, None);
        let root = registry.get(id).scope;
        assert_eq!(scopes.parent(root), Some(registry.primitives));
        assert_eq!(scopes.namespace(root), Some(id));
    }

    #[test]
    fn test_references_are_deduplicated() {
        let (mut registry, mut scopes) = registry();
        let a = registry.register(&mut scopes, Some("urn:a"), None, None);
        let b = registry.register(&mut scopes, Some("urn:b"), None, None);
        registry.add_reference(a, b);
        registry.add_reference(a, b);
        registry.add_reference(a, a);
        assert_eq!(registry.get(a).references, vec![b]);
    }

    proptest! {
        #[test]
        fn prop_registration_order_does_not_duplicate(names in proptest::collection::vec("[a-c]", 1..20)) {
            let (mut registry, mut scopes) = registry();
            let mut ids = HashMap::new();
            for name in &names {
                let id = registry.register(&mut scopes, Some(name.as_str()), None, None);
                prop_assert_eq!(*ids.entry(name.clone()).or_insert(id), id);
            }
            prop_assert_eq!(registry.len(), ids.len());
        }
    }
}
