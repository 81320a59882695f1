//! Compilation state
//!
//! A [`Compilation`] owns everything produced while compiling one root
//! schema and its transitive imports: the namespace registry, the scope
//! and node arenas, the parsed documents and the queue of deferred
//! resolve hooks. Once [`Compiler::compile`](super::Compiler::compile)
//! returns it is a read-only model.

use crate::error::{Error, ResolveError, Result, SourcePosition};
use crate::namespaces::{NamespaceContext, QName};
use crate::XSD_NAMESPACE;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use url::Url;

use super::builtins;
use super::handlers;
use super::model::{Node, NodeId, TypeRef};
use super::particles::Occurs;
use super::registry::{Namespace, NamespaceId, NamespaceRegistry, Source, SourceId};
use super::rules::TagKind;
use super::scope::{DefinitionKind, ScopeArena, ScopeId};

/// Identifier of a fetched document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(usize);

/// An `import` or `include` found during a first pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// `Import` or `Include`
    pub kind: TagKind,
    /// Declared namespace for imports; the includer's target namespace for
    /// includes
    pub namespace: Option<String>,
    /// Absolute location of the referenced document
    pub location: Url,
    /// Line of the import tag
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentState {
    Parsing,
    Parsed,
    Failed,
}

#[derive(Debug)]
pub(crate) struct Document {
    pub url: Url,
    pub requested_url: Url,
    pub source: Option<SourceId>,
    pub prefixes: NamespaceContext,
    pub imports: Vec<ImportRecord>,
    pub dependencies: Vec<DocumentId>,
    pub pending: Vec<usize>,
    pub state: DocumentState,
    /// No `targetNamespace` of its own: compiled once per including
    /// namespace
    pub chameleon: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Running,
    Done,
}

#[derive(Debug)]
struct PendingEntry {
    node: NodeId,
    status: Status,
}

/// Compilation milestones, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// A document finished its first pass
    FirstPassDone(Url),
    /// A document's second pass began
    SecondPassStarted(Url),
}

/// An imported document that could not be compiled
#[derive(Debug)]
pub struct DocumentError {
    /// Requested location
    pub url: Url,
    /// What went wrong
    pub error: Error,
}

/// A tag without a rule at its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTag {
    /// Canonical URL of the document
    pub url: String,
    /// Line of the tag
    pub line: usize,
    /// Resolved tag name
    pub name: QName,
}

/// One entry of a type's content, after substitution group expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Qualified name
    pub name: QName,
    /// Declaring node (a global element/attribute for refs)
    pub node: NodeId,
    /// Occurrence bounds at the point of use
    pub occurs: Occurs,
    /// Copied from a base type
    pub inherited: bool,
}

/// Everything produced by one compilation
#[derive(Debug)]
pub struct Compilation {
    pub(crate) registry: NamespaceRegistry,
    pub(crate) scopes: ScopeArena,
    pub(crate) nodes: Vec<Node>,
    pub(crate) sources: Vec<Source>,
    pub(crate) documents: Vec<Document>,
    by_url: HashMap<String, DocumentId>,
    variants: HashMap<(String, Option<String>), DocumentId>,
    pending: Vec<PendingEntry>,
    feeders: HashMap<NodeId, Vec<usize>>,
    pub(crate) errors: Vec<ResolveError>,
    pub(crate) document_errors: Vec<DocumentError>,
    pub(crate) skipped: Vec<SkippedTag>,
    pub(crate) primitives: ScopeId,
    root: Option<DocumentId>,
    journal: Vec<Phase>,
    resolution_order: Vec<NodeId>,
}

impl Compilation {
    pub(crate) fn new() -> Self {
        let mut scopes = ScopeArena::new();
        let mut nodes = Vec::new();
        let primitives = builtins::install(&mut scopes, &mut nodes);
        let mut registry = NamespaceRegistry::new(primitives);
        registry.register(&mut scopes, Some(XSD_NAMESPACE), None, Some("xsd"));

        Self {
            registry,
            scopes,
            nodes,
            sources: Vec::new(),
            documents: Vec::new(),
            by_url: HashMap::new(),
            variants: HashMap::new(),
            pending: Vec::new(),
            feeders: HashMap::new(),
            errors: Vec::new(),
            document_errors: Vec::new(),
            skipped: Vec::new(),
            primitives,
            root: None,
            journal: Vec::new(),
            resolution_order: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------------

    pub(crate) fn document_by_url(&self, url: &Url) -> Option<DocumentId> {
        self.by_url.get(url.as_str()).copied()
    }

    pub(crate) fn alias_url(&mut self, url: &Url, document: DocumentId) {
        self.by_url.entry(url.to_string()).or_insert(document);
    }

    /// The compiled form of `document` that lives in `namespace`.
    ///
    /// Documents declaring a target namespace have only one. A chameleon
    /// document has one per namespace it was included into; `None` means
    /// it has not been compiled into `namespace` yet.
    pub(crate) fn namespace_variant(
        &self,
        document: DocumentId,
        namespace: Option<&str>,
    ) -> Option<DocumentId> {
        let found = &self.documents[document.0];
        if !found.chameleon
            || found.state == DocumentState::Failed
            || found.prefixes.get_target_namespace() == namespace
        {
            return Some(document);
        }
        self.variants
            .get(&(found.url.to_string(), namespace.map(str::to_string)))
            .copied()
    }

    pub(crate) fn add_document(&mut self, url: Url, requested_url: Url) -> DocumentId {
        let id = DocumentId(self.documents.len());
        self.by_url.entry(url.to_string()).or_insert(id);
        self.by_url.entry(requested_url.to_string()).or_insert(id);
        self.documents.push(Document {
            url,
            requested_url,
            source: None,
            prefixes: NamespaceContext::new(),
            imports: Vec::new(),
            dependencies: Vec::new(),
            pending: Vec::new(),
            state: DocumentState::Parsing,
            chameleon: false,
        });
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    pub(crate) fn document(&self, id: DocumentId) -> &Document {
        &self.documents[id.0]
    }

    pub(crate) fn document_mut(&mut self, id: DocumentId) -> &mut Document {
        &mut self.documents[id.0]
    }

    pub(crate) fn finish_first_pass(&mut self, id: DocumentId) {
        let document = &mut self.documents[id.0];
        document.state = DocumentState::Parsed;
        if document.chameleon {
            let key = (
                document.url.to_string(),
                document.prefixes.get_target_namespace().map(str::to_string),
            );
            self.variants.entry(key).or_insert(id);
        }
        debug!(url = %document.url, "first pass done");
        self.journal.push(Phase::FirstPassDone(document.url.clone()));
    }

    /// Abandon a document whose first pass failed: none of its deferred
    /// hooks will run
    pub(crate) fn fail_document(&mut self, id: DocumentId) {
        self.documents[id.0].state = DocumentState::Failed;
        for &index in &self.documents[id.0].pending {
            self.pending[index].status = Status::Done;
        }
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Position of a node's opening tag
    pub fn position(&self, id: NodeId) -> SourcePosition {
        let node = self.node(id);
        let url = node
            .source
            .map(|s| self.sources[s.index()].url.to_string())
            .unwrap_or_default();
        SourcePosition::new(url, node.line)
    }

    /// Source a node was declared in
    pub fn source_of(&self, id: NodeId) -> Option<&Source> {
        self.node(id).source.map(|s| &self.sources[s.index()])
    }

    /// Target namespace URI of the document a node was declared in
    pub(crate) fn target_namespace_of(&self, id: NodeId) -> Option<String> {
        self.source_of(id)
            .and_then(|s| s.prefixes.get_target_namespace())
            .map(str::to_string)
    }

    /// Nearest enclosing node accepted by `filter`
    pub(crate) fn ancestor(&self, id: NodeId, filter: impl Fn(TagKind) -> bool) -> Option<NodeId> {
        let mut current = self.node(id).parent;
        while let Some(ancestor) = current {
            let node = self.node(ancestor);
            if filter(node.kind) {
                return Some(ancestor);
            }
            current = node.parent;
        }
        None
    }

    // ---------------------------------------------------------------------
    // Resolution support
    // ---------------------------------------------------------------------

    /// Parse a QName-valued attribute with the prefix table of the node's
    /// document. Malformed names are reported as missing references.
    pub(crate) fn reference(&mut self, id: NodeId, value: &str) -> Option<QName> {
        let parsed = match self.source_of(id) {
            Some(source) => source.prefixes.resolve_reference(value),
            None => NamespaceContext::new().resolve_reference(value),
        };
        match parsed {
            Ok(name) => Some(name),
            Err(e) => {
                debug!(value, error = %e, "unparsable reference");
                self.missing(id, QName::local(value.trim()));
                None
            }
        }
    }

    /// Look `name` up from the body scope of `id`, recording cross-namespace
    /// use of non-primitive definitions
    pub(crate) fn lookup(&mut self, id: NodeId, name: &QName, kind: DefinitionKind) -> Option<NodeId> {
        let scope = self.node(id).scope;
        let definition = self.scopes.lookup(scope, name, kind, &self.registry)?;

        if !self.node(definition.target).primitive {
            if let (Some(from), Some(to)) = (
                self.scopes.namespace(scope),
                self.registry.find(name.namespace_uri()),
            ) {
                self.registry.add_reference(from, to);
            }
        }

        Some(definition.target)
    }

    pub(crate) fn missing(&mut self, id: NodeId, name: QName) {
        let error = ResolveError::MissingReference {
            kind: self.node(id).kind,
            name,
            position: self.position(id),
        };
        warn!(%error, "unresolved reference");
        self.errors.push(error);
    }

    pub(crate) fn circular(&mut self, id: NodeId, name: QName) {
        let error = ResolveError::CircularReference {
            kind: self.node(id).kind,
            name,
            position: self.position(id),
        };
        warn!(%error, "circular reference");
        self.errors.push(error);
    }

    pub(crate) fn enqueue(&mut self, document: DocumentId, node: NodeId) {
        let index = self.pending.len();
        self.pending.push(PendingEntry {
            node,
            status: Status::Pending,
        });
        self.documents[document.0].pending.push(index);
        for owner in self.fed_owners(node) {
            self.feeders.entry(owner).or_default().push(index);
        }
    }

    fn run_entry(&mut self, index: usize) {
        if self.pending[index].status != Status::Pending {
            return;
        }
        self.pending[index].status = Status::Running;
        let node = self.pending[index].node;
        handlers::resolve(self, node);
        self.pending[index].status = Status::Done;
        self.nodes[node.index()].resolved = true;
        self.resolution_order.push(node);
    }

    /// Owners whose body `node`'s resolution feeds: `node` itself and its
    /// ancestors up to and including the nearest enclosing element or
    /// attribute
    fn fed_owners(&self, node: NodeId) -> Vec<NodeId> {
        let mut owners = vec![node];
        let mut current = self.node(node).parent;
        while let Some(id) = current {
            owners.push(id);
            let entry = self.node(id);
            if matches!(entry.kind, TagKind::Element | TagKind::Attribute) {
                break;
            }
            current = entry.parent;
        }
        owners
    }

    /// Run every pending hook that contributes to `owner`'s body, in
    /// queue order.
    ///
    /// Returns false if one of them is already running, i.e. `owner`
    /// depends on itself.
    pub(crate) fn ensure_resolved(&mut self, owner: NodeId) -> bool {
        let count = self.feeders.get(&owner).map_or(0, Vec::len);
        for position in 0..count {
            let index = self.feeders[&owner][position];
            match self.pending[index].status {
                Status::Pending => self.run_entry(index),
                Status::Running => return false,
                Status::Done => {}
            }
        }
        true
    }

    /// Documents in second-pass order: imports before importers
    fn dependency_order(&self) -> Vec<DocumentId> {
        fn visit(cx: &Compilation, id: DocumentId, seen: &mut HashSet<DocumentId>, order: &mut Vec<DocumentId>) {
            if !seen.insert(id) {
                return;
            }
            for &dependency in &cx.documents[id.0].dependencies {
                visit(cx, dependency, seen, order);
            }
            order.push(id);
        }

        let mut seen = HashSet::new();
        let mut order = Vec::new();
        if let Some(root) = self.root {
            visit(self, root, &mut seen, &mut order);
        }
        for index in 0..self.documents.len() {
            visit(self, DocumentId(index), &mut seen, &mut order);
        }
        order
    }

    /// Drain every document's deferred hooks. Only called once all first
    /// passes are done.
    pub(crate) fn second_pass(&mut self) {
        for document in self.dependency_order() {
            if self.documents[document.0].state != DocumentState::Parsed {
                continue;
            }
            let url = self.documents[document.0].url.clone();
            debug!(url = %url, "second pass");
            self.journal.push(Phase::SecondPassStarted(url));

            let entries = self.documents[document.0].pending.clone();
            for index in entries {
                self.run_entry(index);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Read-only model
    // ---------------------------------------------------------------------

    /// Get a node
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(index), node))
    }

    /// Source of the root document
    pub fn root_source(&self) -> Option<&Source> {
        self.root
            .and_then(|root| self.documents[root.0].source)
            .map(|s| &self.sources[s.index()])
    }

    /// Every parsed source, in first-pass order
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Every registered namespace
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.registry.iter()
    }

    /// Namespace by URI (empty string for no namespace)
    pub fn namespace(&self, uri: &str) -> Option<&Namespace> {
        self.registry.find(uri).map(|id| self.registry.get(id))
    }

    /// Namespace by identifier
    pub fn namespace_by_id(&self, id: NamespaceId) -> &Namespace {
        self.registry.get(id)
    }

    /// Global definition of `name`, built-in types included
    pub fn global(&self, name: &QName, kind: DefinitionKind) -> Option<NodeId> {
        let namespace = self.registry.find(name.namespace_uri())?;
        let scope = self.registry.get(namespace).scope;
        self.scopes
            .lookup_local(scope, name, kind)
            .map(|definition| definition.target)
    }

    /// Global definitions of one kind held by a namespace, in declaration
    /// order
    pub fn globals(&self, namespace: NamespaceId, kind: DefinitionKind) -> Vec<Member> {
        self.scopes
            .definitions(self.registry.get(namespace).scope, kind)
            .map(|(name, definition)| Member {
                name: name.clone(),
                node: definition.target,
                occurs: definition.occurs,
                inherited: definition.inherited,
            })
            .collect()
    }

    /// Type of an element or attribute, following `ref`
    pub fn type_of(&self, id: NodeId) -> Option<&TypeRef> {
        let node = self.node(id);
        match node.referent {
            Some(referent) => self.node(referent).type_ref.as_ref(),
            None => node.type_ref.as_ref(),
        }
    }

    /// Concrete elements usable where `element` is referenced: itself
    /// unless abstract, then every transitive substitute that is not
    /// abstract
    pub fn alternatives(&self, element: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![element];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.node(id);
            if !node.is_abstract() {
                found.push(id);
            }
            stack.extend(node.substitutes.iter().rev().copied());
        }

        found
    }

    /// Attributes or child elements of a type, inherited ones included.
    ///
    /// Elements are expanded through substitution groups: when more than
    /// one concrete alternative exists each is listed with a lower bound
    /// of zero.
    pub fn members(&self, type_node: NodeId, kind: DefinitionKind) -> Vec<Member> {
        let mut members = Vec::new();

        for (name, definition) in self.scopes.definitions(self.node(type_node).scope, kind) {
            if kind != DefinitionKind::Element {
                members.push(Member {
                    name: name.clone(),
                    node: definition.target,
                    occurs: definition.occurs,
                    inherited: definition.inherited,
                });
                continue;
            }

            let alternatives = self.alternatives(definition.target);
            let occurs = if alternatives.len() > 1 {
                definition.occurs.optionalized()
            } else {
                definition.occurs
            };
            for alternative in alternatives {
                let name = if alternative == definition.target {
                    name.clone()
                } else {
                    self.node(alternative).name.clone().unwrap_or_else(|| name.clone())
                };
                members.push(Member {
                    name,
                    node: alternative,
                    occurs,
                    inherited: definition.inherited,
                });
            }
        }

        members
    }

    /// Second-pass errors, in resolution order
    pub fn errors(&self) -> &[ResolveError] {
        &self.errors
    }

    /// Imported documents that failed to load or parse
    pub fn document_errors(&self) -> &[DocumentError] {
        &self.document_errors
    }

    /// Tags skipped because no rule accepts them at their position
    pub fn skipped_tags(&self) -> &[SkippedTag] {
        &self.skipped
    }

    /// Milestones of the two passes
    pub fn journal(&self) -> &[Phase] {
        &self.journal
    }

    /// Nodes in the order their resolve hooks ran
    pub fn resolution_order(&self) -> &[NodeId] {
        &self.resolution_order
    }

    /// Fail if any reference could not be resolved
    pub fn check(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Unresolved(self.errors.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_compilation_knows_primitives() {
        let cx = Compilation::new();
        let string = cx
            .global(
                &QName::namespaced(XSD_NAMESPACE, "string"),
                DefinitionKind::Type,
            )
            .unwrap();
        assert!(cx.node(string).primitive);

        let xsd = cx.namespace(XSD_NAMESPACE).unwrap();
        assert_eq!(xsd.short.as_deref(), Some("xsd"));
        assert!(xsd.sources.is_empty());
    }

    #[test]
    fn test_documents_are_memoized_by_both_urls() {
        let mut cx = Compilation::new();
        let canonical = Url::parse("file:///real/a.xsd").unwrap();
        let requested = Url::parse("file:///link/a.xsd").unwrap();
        let id = cx.add_document(canonical.clone(), requested.clone());

        assert_eq!(cx.document_by_url(&canonical), Some(id));
        assert_eq!(cx.document_by_url(&requested), Some(id));

        let other = Url::parse("file:///other/a.xsd").unwrap();
        cx.alias_url(&other, id);
        assert_eq!(cx.document_by_url(&other), Some(id));
    }

    fn child(cx: &mut Compilation, kind: TagKind, parent: Option<NodeId>) -> NodeId {
        let mut node = Node::new(kind, cx.primitives);
        node.parent = parent;
        cx.add_node(node)
    }

    #[test]
    fn test_hooks_are_indexed_by_the_bodies_they_feed() {
        let mut cx = Compilation::new();
        let url = Url::parse("mem:a").unwrap();
        let document = cx.add_document(url.clone(), url);

        let schema = child(&mut cx, TagKind::Schema, None);
        let tree = child(&mut cx, TagKind::ComplexType, Some(schema));
        let sequence = child(&mut cx, TagKind::Sequence, Some(tree));
        let element = child(&mut cx, TagKind::Element, Some(sequence));
        let body = child(&mut cx, TagKind::ComplexType, Some(element));
        let extension = child(&mut cx, TagKind::Extension, Some(body));

        assert_eq!(cx.fed_owners(extension), vec![extension, body, element]);
        assert_eq!(cx.fed_owners(element), vec![element, sequence, tree, schema]);

        cx.enqueue(document, extension);
        cx.enqueue(document, element);
        assert_eq!(cx.feeders[&element], vec![0, 1]);
        assert_eq!(cx.feeders[&tree], vec![1]);
        assert_eq!(cx.feeders[&body], vec![0]);

        cx.pending[1].status = Status::Running;
        assert!(!cx.ensure_resolved(tree));
        cx.pending[0].status = Status::Done;
        assert!(cx.ensure_resolved(body));
    }

    #[test]
    fn test_check_reports_errors() {
        let mut cx = Compilation::new();
        assert!(cx.check().is_ok());

        cx.errors.push(ResolveError::MissingReference {
            kind: TagKind::Element,
            name: QName::local("x"),
            position: SourcePosition::new("mem:a", 1),
        });
        assert!(matches!(cx.check(), Err(Error::Unresolved(errors)) if errors.len() == 1));
    }
}
