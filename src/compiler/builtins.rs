//! XSD built-in datatypes
//!
//! Every built-in type becomes a primitive node defined in one shared,
//! parentless scope. Namespace root scopes hang off this scope, so the
//! built-ins are the last stop of every lookup in the XSD namespace.

use crate::namespaces::QName;
use crate::XSD_NAMESPACE;

use super::model::{Node, NodeId};
use super::particles::Occurs;
use super::rules::TagKind;
use super::scope::{Definition, DefinitionKind, ScopeArena, ScopeId};

/// Local names of the XSD 1.0 built-in datatypes
pub const BUILTIN_TYPES: &[&str] = &[
    "anyType",
    "anySimpleType",
    "string",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "ID",
    "IDREF",
    "IDREFS",
    "ENTITY",
    "ENTITIES",
    "NMTOKEN",
    "NMTOKENS",
    "boolean",
    "decimal",
    "integer",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "positiveInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
    "nonPositiveInteger",
    "negativeInteger",
    "float",
    "double",
    "duration",
    "dateTime",
    "time",
    "date",
    "gYearMonth",
    "gYear",
    "gMonthDay",
    "gDay",
    "gMonth",
    "hexBinary",
    "base64Binary",
    "anyURI",
    "QName",
    "NOTATION",
];

/// Check if a local name is an XSD built-in type
pub fn is_builtin(local_name: &str) -> bool {
    BUILTIN_TYPES.contains(&local_name)
}

/// Create the primitive scope and one node per built-in type
pub fn install(scopes: &mut ScopeArena, nodes: &mut Vec<Node>) -> ScopeId {
    let primitives = scopes.create(None, None);

    for local in BUILTIN_TYPES {
        let id = NodeId::new(nodes.len());
        let name = QName::namespaced(XSD_NAMESPACE, *local);
        let kind = if *local == "anyType" {
            TagKind::ComplexType
        } else {
            TagKind::SimpleType
        };

        let mut node = Node::new(kind, primitives);
        node.name = Some(name.clone());
        node.primitive = true;
        node.resolved = true;
        nodes.push(node);

        scopes.add(
            primitives,
            name,
            DefinitionKind::Type,
            Definition {
                target: id,
                occurs: Occurs::once(),
                inherited: false,
            },
        );
    }

    primitives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_defines_every_builtin() {
        let mut scopes = ScopeArena::new();
        let mut nodes = Vec::new();
        let primitives = install(&mut scopes, &mut nodes);

        assert_eq!(nodes.len(), BUILTIN_TYPES.len());
        assert_eq!(
            scopes.definitions(primitives, DefinitionKind::Type).count(),
            BUILTIN_TYPES.len()
        );

        let string = scopes
            .lookup_local(
                primitives,
                &QName::namespaced(XSD_NAMESPACE, "string"),
                DefinitionKind::Type,
            )
            .unwrap();
        let node = &nodes[string.target.index()];
        assert!(node.primitive);
        assert_eq!(node.kind, TagKind::SimpleType);
        assert_eq!(node.local_name(), Some("string"));
    }

    #[test]
    fn test_is_builtin() {
        assert!(is_builtin("dateTime"));
        assert!(is_builtin("anyType"));
        assert!(!is_builtin("Foo"));
    }
}
