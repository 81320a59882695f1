//! Schema model nodes
//!
//! One [`Node`] is created per handled tag (plus one per built-in
//! primitive). Nodes live in the compilation's arena and refer to each
//! other through [`NodeId`]s, so the cyclic graph formed by type
//! references, element refs and substitution groups needs no shared
//! ownership.

use crate::namespaces::QName;
use indexmap::IndexMap;

use super::particles::Occurs;
use super::registry::SourceId;
use super::rules::TagKind;
use super::scope::ScopeId;

/// Identifier of a node in the compilation arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in creation order
    pub fn index(self) -> usize {
        self.0
    }
}

/// Result of resolving a type-valued attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// The referenced type node
    Resolved(NodeId),
    /// The name did not resolve; kept so consumers can still report it
    Unresolved(QName),
}

impl TypeRef {
    /// Resolved node, if any
    pub fn node(&self) -> Option<NodeId> {
        match self {
            TypeRef::Resolved(id) => Some(*id),
            TypeRef::Unresolved(_) => None,
        }
    }
}

/// How a type was derived from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// `xs:extension`
    Extension,
    /// `xs:restriction`
    Restriction,
}

/// Attributes copied from a tag, keyed by lowercase name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(IndexMap<&'static str, String>);

impl Attributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute
    pub fn insert(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.insert(name, value.into());
    }

    /// Get an attribute value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Check if an attribute is present
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Boolean attribute (`true`/`1`)
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name).map(str::trim), Some("true") | Some("1"))
    }

    /// Iterate in tag order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A schema construct
#[derive(Debug, Clone)]
pub struct Node {
    /// Tag kind
    pub kind: TagKind,
    /// Recognised attributes
    pub attributes: Attributes,
    /// Document the tag appeared in (`None` for primitives)
    pub source: Option<SourceId>,
    /// 1-based line of the opening tag
    pub line: usize,
    /// Body scope: everything declared inside this tag
    pub scope: ScopeId,
    /// Nearest enclosing node
    pub parent: Option<NodeId>,
    /// Qualified name for named constructs
    pub name: Option<QName>,
    /// Occurrence bounds from minOccurs/maxOccurs or `use`
    pub occurs: Occurs,
    /// Captured character data
    pub text: String,

    /// Element/attribute type, or list item type
    pub type_ref: Option<TypeRef>,
    /// Parent type of a complex or simple type
    pub base: Option<TypeRef>,
    /// How `base` was derived from
    pub derivation: Option<Derivation>,
    /// Target of a `ref` attribute
    pub referent: Option<NodeId>,
    /// Elements naming this one as their substitution group head
    pub substitutes: Vec<NodeId>,
    /// Union member types
    pub member_types: Vec<TypeRef>,
    /// Enumeration values of a simple type
    pub enumeration: Vec<String>,
    /// Documentation strings
    pub documentation: Vec<String>,

    /// Built-in datatype
    pub primitive: bool,
    /// Contains an `any` wildcard
    pub any_content: bool,
    /// Contains an `anyAttribute` wildcard
    pub any_attribute: bool,
    /// Resolve hook has run (or the kind has none)
    pub resolved: bool,
}

impl Node {
    /// Create a node with empty resolution state
    pub fn new(kind: TagKind, scope: ScopeId) -> Self {
        Self {
            kind,
            attributes: Attributes::new(),
            source: None,
            line: 0,
            scope,
            parent: None,
            name: None,
            occurs: Occurs::once(),
            text: String::new(),
            type_ref: None,
            base: None,
            derivation: None,
            referent: None,
            substitutes: Vec::new(),
            member_types: Vec::new(),
            enumeration: Vec::new(),
            documentation: Vec::new(),
            primitive: false,
            any_content: false,
            any_attribute: false,
            resolved: false,
        }
    }

    /// `abstract="true"`
    pub fn is_abstract(&self) -> bool {
        self.attributes.flag("abstract")
    }

    /// Local name, for named constructs
    pub fn local_name(&self) -> Option<&str> {
        self.name.as_ref().map(|n| n.local_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::scope::ScopeArena;

    #[test]
    fn test_attributes() {
        let mut attributes = Attributes::new();
        attributes.insert("name", "Foo");
        attributes.insert("abstract", " true ");
        assert_eq!(attributes.get("name"), Some("Foo"));
        assert!(attributes.flag("abstract"));
        assert!(!attributes.flag("nillable"));
        assert!(!attributes.contains("type"));
        assert_eq!(
            attributes.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["name", "abstract"]
        );
    }

    #[test]
    fn test_new_node_is_unresolved() {
        let mut scopes = ScopeArena::new();
        let node = Node::new(TagKind::Element, scopes.create(None, None));
        assert!(!node.resolved);
        assert_eq!(node.occurs, Occurs::once());
        assert!(node.type_ref.is_none());
        assert!(node.local_name().is_none());
    }

    #[test]
    fn test_type_ref_node() {
        assert_eq!(TypeRef::Resolved(NodeId::new(3)).node(), Some(NodeId::new(3)));
        assert_eq!(TypeRef::Unresolved(QName::local("x")).node(), None);
    }
}
