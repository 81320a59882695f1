//! Lexical scopes
//!
//! Scopes form a tree rooted at the primitive scope. Each namespace owns a
//! root scope whose parent is the primitive scope, and every tag opened
//! during parsing gets a body scope nested in its parent tag's scope.
//! A tag's own name is defined in the scope it was declared in, i.e. the
//! parent of its body scope.

use crate::namespaces::QName;
use indexmap::IndexMap;

use super::model::NodeId;
use super::particles::Occurs;
use super::registry::{NamespaceId, NamespaceRegistry};

/// Identifier of a scope in a [`ScopeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// Symbol table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Simple or complex type
    Type,
    /// Element declaration
    Element,
    /// Attribute declaration
    Attribute,
    /// Named model group
    Group,
    /// Named attribute group
    AttributeGroup,
}

impl DefinitionKind {
    /// Every symbol table kind
    pub const ALL: [DefinitionKind; 5] = [
        DefinitionKind::Type,
        DefinitionKind::Element,
        DefinitionKind::Attribute,
        DefinitionKind::Group,
        DefinitionKind::AttributeGroup,
    ];

    fn index(self) -> usize {
        match self {
            DefinitionKind::Type => 0,
            DefinitionKind::Element => 1,
            DefinitionKind::Attribute => 2,
            DefinitionKind::Group => 3,
            DefinitionKind::AttributeGroup => 4,
        }
    }
}

/// One symbol table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    /// Node the name refers to
    pub target: NodeId,
    /// Accumulated occurrence bounds
    pub occurs: Occurs,
    /// Copied from a base type rather than declared by the owner
    pub inherited: bool,
}

/// A scope: per-kind symbol tables plus an optional type marker
#[derive(Debug, Clone)]
pub struct Scope {
    parent: Option<ScopeId>,
    namespace: Option<NamespaceId>,
    tables: [IndexMap<QName, Definition>; 5],
    type_marker: Option<NodeId>,
}

/// Arena owning every scope of a compilation
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope
    pub fn create(&mut self, parent: Option<ScopeId>, namespace: Option<NamespaceId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            namespace,
            tables: Default::default(),
            type_marker: None,
        });
        id
    }

    /// Create a scope nested in `parent`, in the same namespace
    pub fn create_child(&mut self, parent: ScopeId) -> ScopeId {
        let namespace = self.namespace(parent);
        self.create(Some(parent), namespace)
    }

    /// Parent scope
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// Namespace a scope belongs to (`None` for the primitive scope)
    pub fn namespace(&self, scope: ScopeId) -> Option<NamespaceId> {
        self.scopes[scope.0].namespace
    }

    /// Number of scopes
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Insert directly into `scope`.
    ///
    /// A repeated name sums its bounds. An own definition replaces an
    /// inherited one of the same name, and an inherited definition never
    /// overrides an own one.
    pub fn add(
        &mut self,
        scope: ScopeId,
        name: QName,
        kind: DefinitionKind,
        definition: Definition,
    ) {
        let table = &mut self.scopes[scope.0].tables[kind.index()];
        match table.get_mut(&name) {
            None => {
                table.insert(name, definition);
            }
            Some(existing) => match (existing.inherited, definition.inherited) {
                (true, false) => *existing = definition,
                (false, true) => {}
                _ => existing.occurs = existing.occurs + definition.occurs,
            },
        }
    }

    /// Define a name visible to the siblings of `scope`'s owner: the entry
    /// goes into the parent of `scope` (or `scope` itself at the top)
    pub fn define(
        &mut self,
        scope: ScopeId,
        name: QName,
        kind: DefinitionKind,
        target: NodeId,
        occurs: Occurs,
    ) {
        let into = self.parent(scope).unwrap_or(scope);
        self.add(
            into,
            name,
            kind,
            Definition {
                target,
                occurs,
                inherited: false,
            },
        );
    }

    /// Look a name up in `scope` and its ancestors only
    pub fn lookup_local(&self, scope: ScopeId, name: &QName, kind: DefinitionKind) -> Option<Definition> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = &self.scopes[id.0];
            if let Some(definition) = entry.tables[kind.index()].get(name) {
                return Some(*definition);
            }
            current = entry.parent;
        }
        None
    }

    /// Look a name up from `scope`.
    ///
    /// A name in a foreign namespace jumps to that namespace's root scope
    /// before walking parents; names in unknown namespaces never resolve.
    pub fn lookup(
        &self,
        scope: ScopeId,
        name: &QName,
        kind: DefinitionKind,
        registry: &NamespaceRegistry,
    ) -> Option<Definition> {
        let target = registry.find(name.namespace_uri())?;
        let start = if self.namespace(scope) == Some(target) {
            scope
        } else {
            registry.get(target).scope
        };
        self.lookup_local(start, name, kind)
    }

    /// Copy every `kind` definition of `source` into `target`, multiplying
    /// bounds by `multiplier`
    pub fn inline_into(
        &mut self,
        target: ScopeId,
        kind: DefinitionKind,
        multiplier: Occurs,
        source: ScopeId,
        inherited: bool,
    ) {
        let entries: Vec<(QName, Definition)> = self.scopes[source.0].tables[kind.index()]
            .iter()
            .map(|(name, definition)| (name.clone(), *definition))
            .collect();

        for (name, definition) in entries {
            self.add(
                target,
                name,
                kind,
                Definition {
                    target: definition.target,
                    occurs: definition.occurs * multiplier,
                    inherited: inherited || definition.inherited,
                },
            );
        }
    }

    /// Copy the `kind` definitions of `source` (default: `scope` itself)
    /// into the parent of `scope`, i.e. where the owner of `scope` is
    /// declared
    pub fn inline_into_parent(
        &mut self,
        scope: ScopeId,
        kind: DefinitionKind,
        multiplier: Occurs,
        source: Option<ScopeId>,
    ) {
        if let Some(parent) = self.parent(scope) {
            self.inline_into(parent, kind, multiplier, source.unwrap_or(scope), false);
        }
    }

    /// Record the type declared directly in `scope`. Set once; later
    /// calls are ignored and return false.
    pub fn set_type(&mut self, scope: ScopeId, node: NodeId) -> bool {
        let marker = &mut self.scopes[scope.0].type_marker;
        if marker.is_some() {
            return false;
        }
        *marker = Some(node);
        true
    }

    /// Type declared directly in `scope`
    pub fn type_of(&self, scope: ScopeId) -> Option<NodeId> {
        self.scopes[scope.0].type_marker
    }

    /// Definitions of one kind held directly by `scope`, in insertion order
    pub fn definitions(
        &self,
        scope: ScopeId,
        kind: DefinitionKind,
    ) -> impl Iterator<Item = (&QName, &Definition)> {
        self.scopes[scope.0].tables[kind.index()].iter()
    }

    /// Check if `scope` is `ancestor` or nested inside it
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}
