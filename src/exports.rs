//! Schema export model
//!
//! A serializable, language-neutral view of a finished [`Compilation`],
//! meant for code generators. One [`NamespaceExport`] is produced per
//! namespace that has schema documents; types list only their own
//! attributes and elements, with inherited content reachable through
//! `parent`.
//!
//! Substitution groups are expanded where an element is used: each
//! concrete alternative is listed, and when there is more than one each
//! gets a lower bound of zero.

use serde::Serialize;

use crate::compiler::{
    Compilation, DefinitionKind, Derivation, Member, Namespace, NodeId, TagKind, TypeRef,
};
use crate::error::Result;
use crate::namespaces::QName;

/// Kind of an exported type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Complex type
    Complex,
    /// User-defined simple type
    Simple,
    /// XSD built-in datatype
    Primitive,
}

/// How a type relates to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationKind {
    /// `extension`
    Extension,
    /// `restriction`
    Restriction,
}

impl From<Derivation> for DerivationKind {
    fn from(derivation: Derivation) -> Self {
        match derivation {
            Derivation::Extension => DerivationKind::Extension,
            Derivation::Restriction => DerivationKind::Restriction,
        }
    }
}

/// An attribute or child element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberExport {
    /// Qualified name, `{namespace}local`
    pub name: String,
    /// Qualified type name; `unresolved:` prefixed when the name did not
    /// resolve; absent for anonymous types and untyped declarations
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Locally declared anonymous type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_type: Option<Box<TypeExport>>,
    /// The anonymous type is one an enclosing member is already exporting
    /// (a model group that reaches its own element again); it is not
    /// expanded a second time
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recursive: bool,
    /// Declared at the top level of its namespace
    pub global: bool,
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences, `None` for unbounded
    pub max: Option<u32>,
    /// Documentation strings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documentation: Vec<String>,
}

/// A named or anonymous type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeExport {
    /// Qualified name, absent for anonymous types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Complex, simple or primitive
    pub kind: TypeKind,
    /// Parent type, `unresolved:` prefixed when the base did not resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// How the parent is derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<DerivationKind>,
    /// `abstract="true"`
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    /// Own attributes
    pub attributes: Vec<MemberExport>,
    /// Own child elements
    pub elements: Vec<MemberExport>,
    /// Accepts any element (`any`)
    pub any_content: bool,
    /// Accepts any attribute (`anyAttribute`)
    pub any_attribute: bool,
    /// Enumeration values
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<String>,
    /// List item type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    /// Union member types
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_types: Vec<String>,
    /// Documentation strings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documentation: Vec<String>,
}

/// One namespace with schema documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceExport {
    /// Namespace URI, empty for no namespace
    pub name: String,
    /// URL of the first document defining it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Short alias
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Foreign namespaces whose definitions are used
    pub references: Vec<String>,
    /// Global elements
    pub elements: Vec<MemberExport>,
    /// Global attributes
    pub attributes: Vec<MemberExport>,
    /// Named types
    pub types: Vec<TypeExport>,
}

/// Export of a whole compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaExport {
    /// Target namespace of the root document
    pub root: Option<String>,
    /// Namespaces with schema documents, in discovery order
    pub namespaces: Vec<NamespaceExport>,
}

fn label(name: &QName) -> String {
    name.to_string()
}

fn type_label(cx: &Compilation, type_ref: &TypeRef) -> Option<String> {
    match type_ref {
        TypeRef::Resolved(id) => cx.node(*id).name.as_ref().map(label),
        TypeRef::Unresolved(name) => Some(format!("unresolved:{}", label(name))),
    }
}

fn is_global(cx: &Compilation, id: NodeId) -> bool {
    cx.node(id)
        .parent
        .map(|parent| cx.node(parent).kind == TagKind::Schema)
        .unwrap_or(false)
}

fn export_member(
    cx: &Compilation,
    member: &Member,
    inline_anonymous: bool,
    enclosing: &mut Vec<NodeId>,
) -> MemberExport {
    let node = cx.node(member.node);
    let type_ref = cx.type_of(member.node);
    let global = is_global(cx, member.node);

    let anonymous = match type_ref {
        Some(TypeRef::Resolved(id)) if cx.node(*id).name.is_none() => Some(*id),
        _ => None,
    }
    .filter(|_| inline_anonymous || !global);
    let recursive = anonymous.map_or(false, |id| enclosing.contains(&id));
    let anonymous_type = anonymous
        .filter(|_| !recursive)
        .map(|id| Box::new(export_nested(cx, id, enclosing)));

    MemberExport {
        name: label(&member.name),
        type_name: type_ref.and_then(|t| type_label(cx, t)),
        anonymous_type,
        recursive,
        global,
        min: member.occurs.min,
        max: member.occurs.max,
        documentation: node.documentation.clone(),
    }
}

/// Export one type node
pub fn export_type(cx: &Compilation, id: NodeId) -> TypeExport {
    export_nested(cx, id, &mut Vec::new())
}

/// Export a type while `enclosing` holds the anonymous types being
/// exported around it
fn export_nested(cx: &Compilation, id: NodeId, enclosing: &mut Vec<NodeId>) -> TypeExport {
    let node = cx.node(id);
    let kind = if node.primitive {
        TypeKind::Primitive
    } else if node.kind == TagKind::ComplexType {
        TypeKind::Complex
    } else {
        TypeKind::Simple
    };

    enclosing.push(id);
    let mut own = |kind: DefinitionKind| -> Vec<MemberExport> {
        cx.members(id, kind)
            .iter()
            .filter(|member| !member.inherited)
            .map(|member| export_member(cx, member, false, enclosing))
            .collect()
    };
    let attributes = own(DefinitionKind::Attribute);
    let elements = own(DefinitionKind::Element);
    enclosing.pop();

    let (item_type, member_types) = match kind {
        TypeKind::Simple => (
            node.type_ref.as_ref().and_then(|t| type_label(cx, t)),
            node.member_types
                .iter()
                .filter_map(|t| type_label(cx, t))
                .collect(),
        ),
        _ => (None, Vec::new()),
    };

    TypeExport {
        name: node.name.as_ref().map(label),
        kind,
        parent: node.base.as_ref().and_then(|t| type_label(cx, t)),
        derivation: node.derivation.map(DerivationKind::from),
        is_abstract: node.is_abstract(),
        attributes,
        elements,
        any_content: node.any_content,
        any_attribute: node.any_attribute,
        enumeration: node.enumeration.clone(),
        item_type,
        member_types,
        documentation: node.documentation.clone(),
    }
}

fn export_namespace(cx: &Compilation, namespace: &Namespace) -> NamespaceExport {
    let globals = |kind: DefinitionKind| -> Vec<MemberExport> {
        cx.globals(namespace.id, kind)
            .iter()
            .map(|member| export_member(cx, member, true, &mut Vec::new()))
            .collect()
    };

    NamespaceExport {
        name: namespace.name.clone().unwrap_or_default(),
        url: namespace.url.clone(),
        short: namespace.short.clone(),
        references: namespace
            .references
            .iter()
            .filter_map(|id| cx.namespace_by_id(*id).name.clone())
            .collect(),
        elements: globals(DefinitionKind::Element),
        attributes: globals(DefinitionKind::Attribute),
        types: cx
            .globals(namespace.id, DefinitionKind::Type)
            .iter()
            .map(|member| export_type(cx, member.node))
            .collect(),
    }
}

impl SchemaExport {
    /// Build the export of a finished compilation
    pub fn from_compilation(cx: &Compilation) -> Self {
        Self {
            root: cx
                .root_source()
                .and_then(|source| source.prefixes.get_target_namespace())
                .map(str::to_string),
            namespaces: cx
                .namespaces()
                .filter(|namespace| !namespace.sources.is_empty())
                .map(|namespace| export_namespace(cx, namespace))
                .collect(),
        }
    }

    /// Find a namespace by URI
    pub fn namespace(&self, name: &str) -> Option<&NamespaceExport> {
        self.namespaces.iter().find(|namespace| namespace.name == name)
    }

    /// Serialize to JSON
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

impl NamespaceExport {
    /// Find a named type by local name
    pub fn find_type(&self, local_name: &str) -> Option<&TypeExport> {
        self.types.iter().find(|t| {
            t.name
                .as_deref()
                .map(|name| name.ends_with(&format!("}}{}", local_name)) || name == local_name)
                .unwrap_or(false)
        })
    }

    /// Find a global element by local name
    pub fn find_element(&self, local_name: &str) -> Option<&MemberExport> {
        self.elements.iter().find(|e| {
            e.name.ends_with(&format!("}}{}", local_name)) || e.name == local_name
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::loaders::MemoryLoader;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn export(xsd: &str) -> SchemaExport {
        let loader = MemoryLoader::new().with_document("http://schemas.test/main.xsd", xsd);
        let cx = Compiler::new(loader)
            .compile(&Url::parse("http://schemas.test/main.xsd").unwrap())
            .unwrap();
        SchemaExport::from_compilation(&cx)
    }

    #[test]
    fn test_export_simple_enumeration() {
        let export = export(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:e">
                 <xs:simpleType name="Color">
                   <xs:annotation><xs:documentation>A color</xs:documentation></xs:annotation>
                   <xs:restriction base="xs:string">
                     <xs:enumeration value="red"/>
                     <xs:enumeration value="green"/>
                   </xs:restriction>
                 </xs:simpleType>
               </xs:schema>"#,
        );

        let namespace = export.namespace("urn:e").unwrap();
        let color = namespace.find_type("Color").unwrap();
        assert_eq!(color.kind, TypeKind::Simple);
        assert_eq!(
            color.parent.as_deref(),
            Some("{http://www.w3.org/2001/XMLSchema}string")
        );
        assert_eq!(color.derivation, Some(DerivationKind::Restriction));
        assert_eq!(color.enumeration, vec!["red".to_string(), "green".to_string()]);
        assert_eq!(color.documentation, vec!["A color".to_string()]);
    }

    #[test]
    fn test_export_anonymous_local_type() {
        let export = export(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:e">
                 <xs:complexType name="Outer">
                   <xs:sequence>
                     <xs:element name="inner">
                       <xs:complexType>
                         <xs:attribute name="id" type="xs:ID" use="required"/>
                       </xs:complexType>
                     </xs:element>
                   </xs:sequence>
                 </xs:complexType>
               </xs:schema>"#,
        );

        let outer = export.namespace("urn:e").unwrap().find_type("Outer").unwrap();
        let inner = &outer.elements[0];
        assert_eq!(inner.name, "{urn:e}inner");
        assert!(!inner.global);
        assert!(!inner.recursive);
        assert_eq!(inner.type_name, None);
        let anonymous = inner.anonymous_type.as_ref().unwrap();
        assert_eq!(anonymous.name, None);
        assert_eq!(anonymous.attributes.len(), 1);
        assert_eq!((anonymous.attributes[0].min, anonymous.attributes[0].max), (1, Some(1)));
    }

    #[test]
    fn test_recursive_global_element_is_not_inlined() {
        let export = export(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:t="urn:e" targetNamespace="urn:e">
                 <xs:element name="node">
                   <xs:complexType>
                     <xs:sequence>
                       <xs:element ref="t:node" minOccurs="0" maxOccurs="unbounded"/>
                     </xs:sequence>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        );

        let node = export.namespace("urn:e").unwrap().find_element("node").unwrap();
        let anonymous = node.anonymous_type.as_ref().unwrap();
        let child = &anonymous.elements[0];
        assert!(child.global);
        assert!(child.anonymous_type.is_none());
        assert_eq!((child.min, child.max), (0, None));
    }

    #[test]
    fn test_self_reaching_anonymous_type_is_expanded_once() {
        let export = export(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:t="urn:e" targetNamespace="urn:e">
                 <xs:group name="Items">
                   <xs:choice>
                     <xs:element name="item">
                       <xs:complexType>
                         <xs:group ref="t:Items" minOccurs="0"/>
                       </xs:complexType>
                     </xs:element>
                   </xs:choice>
                 </xs:group>
                 <xs:element name="list">
                   <xs:complexType>
                     <xs:group ref="t:Items"/>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        );

        let list = export.namespace("urn:e").unwrap().find_element("list").unwrap();
        let item = &list.anonymous_type.as_ref().unwrap().elements[0];
        assert!(!item.recursive);
        let nested = &item.anonymous_type.as_ref().unwrap().elements[0];
        assert_eq!(nested.name, "{urn:e}item");
        assert!(nested.recursive);
        assert!(nested.anonymous_type.is_none());
        assert_eq!(nested.min, 0);
    }

    #[test]
    fn test_to_json() {
        let export = export(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:e">
                 <xs:element name="Foo" type="xs:string"/>
               </xs:schema>"#,
        );
        let json = export.to_json(false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["root"], "urn:e");
        assert_eq!(value["namespaces"][0]["elements"][0]["name"], "{urn:e}Foo");
        assert_eq!(
            value["namespaces"][0]["elements"][0]["type"],
            "{http://www.w3.org/2001/XMLSchema}string"
        );
        assert!(export.to_json(true).unwrap().contains('\n'));
    }
}
