//! Tag handlers
//!
//! Each tag kind may have three hooks:
//!
//! - `init` runs when the opening tag is read, with the tag's attributes
//!   already copied onto its node. It defines names and records imports.
//! - `loaded` runs at the closing tag, when the tag's whole subtree has been
//!   read.
//! - `resolve` runs in the second pass, after every document reachable from
//!   the root has finished its first pass. It turns names into nodes.
//!
//! Dispatch is an exhaustive match on [`TagKind`].

use crate::error::{ParseError, Result};
use crate::locations::resolve_schema_location;
use crate::names::validate_ncname;
use crate::namespaces::QName;
use std::mem;
use tracing::{debug, trace};

use super::compilation::{Compilation, DocumentId, ImportRecord};
use super::model::{Derivation, NodeId, TypeRef};
use super::parsing::State;
use super::particles::{parse_occurs, Occurs};
use super::registry::{Source, SourceId};
use super::rules::TagKind;
use super::scope::DefinitionKind;

/// Check if a kind has a `loaded` hook
pub(crate) fn has_loaded(kind: TagKind) -> bool {
    matches!(kind, TagKind::Documentation)
}

/// Check if a kind has a `resolve` hook
pub(crate) fn has_resolve(kind: TagKind) -> bool {
    match kind {
        TagKind::Element
        | TagKind::Attribute
        | TagKind::Group
        | TagKind::AttributeGroup
        | TagKind::Sequence
        | TagKind::Choice
        | TagKind::All
        | TagKind::ComplexContent
        | TagKind::SimpleContent
        | TagKind::Extension
        | TagKind::Restriction
        | TagKind::List
        | TagKind::Union => true,
        TagKind::Schema
        | TagKind::Import
        | TagKind::Include
        | TagKind::Annotation
        | TagKind::Documentation
        | TagKind::ComplexType
        | TagKind::SimpleType
        | TagKind::Any
        | TagKind::AnyAttribute
        | TagKind::Enumeration => false,
    }
}

// =============================================================================
// init
// =============================================================================

pub(crate) fn init(
    cx: &mut Compilation,
    document: DocumentId,
    state: &mut State,
    id: NodeId,
) -> Result<()> {
    match cx.node(id).kind {
        TagKind::Schema => init_schema(cx, document, state, id),
        TagKind::Import | TagKind::Include => init_import(cx, document, id),
        TagKind::Element => init_element(cx, id),
        TagKind::Attribute => init_attribute(cx, id),
        TagKind::ComplexType | TagKind::SimpleType => init_type(cx, id),
        TagKind::Group => init_group(cx, id, DefinitionKind::Group),
        TagKind::AttributeGroup => init_group(cx, id, DefinitionKind::AttributeGroup),
        TagKind::Sequence | TagKind::Choice | TagKind::All => init_particle(cx, id),
        TagKind::Any => {
            init_particle(cx, id)?;
            set_wildcard(cx, id, false);
            Ok(())
        }
        TagKind::AnyAttribute => {
            set_wildcard(cx, id, true);
            Ok(())
        }
        TagKind::Documentation => {
            state.capture = Some(id);
            Ok(())
        }
        TagKind::Enumeration => init_enumeration(cx, id),
        TagKind::Annotation
        | TagKind::ComplexContent
        | TagKind::SimpleContent
        | TagKind::Extension
        | TagKind::Restriction
        | TagKind::List
        | TagKind::Union => Ok(()),
    }
}

/// Create the source record and switch to the namespace root scope
fn init_schema(
    cx: &mut Compilation,
    document: DocumentId,
    state: &mut State,
    id: NodeId,
) -> Result<()> {
    if cx.document(document).source.is_some() {
        return Err(ParseError::new("document has more than one schema root").into());
    }

    let prefixes = cx.document(document).prefixes.clone();
    let url = cx.document(document).url.clone();
    let requested_url = cx.document(document).requested_url.clone();

    let target = prefixes.get_target_namespace().unwrap_or("");
    let target_namespace =
        cx.registry
            .register(&mut cx.scopes, Some(target), Some(url.as_str()), None);

    let mut declared: Vec<(&str, &str)> = prefixes.iter().collect();
    declared.sort();
    for (prefix, uri) in declared {
        cx.registry
            .register(&mut cx.scopes, Some(uri), None, Some(prefix));
    }

    let default_namespace = prefixes
        .get_default_namespace()
        .filter(|uri| !uri.is_empty())
        .map(|uri| cx.registry.register(&mut cx.scopes, Some(uri), None, None));

    let source = SourceId::new(cx.sources.len());
    debug!(url = %url, namespace = target, "new source");
    cx.sources.push(Source {
        id: source,
        url,
        requested_url,
        target_namespace,
        default_namespace,
        prefixes,
    });
    cx.registry.add_source(target_namespace, source);
    cx.document_mut(document).source = Some(source);

    let root = cx.registry.get(target_namespace).scope;
    state.scope = root;
    let node = cx.node_mut(id);
    node.source = Some(source);
    node.scope = root;
    Ok(())
}

fn init_import(cx: &mut Compilation, document: DocumentId, id: NodeId) -> Result<()> {
    let node = cx.node(id);
    let kind = node.kind;
    let line = node.line;
    let declared = node.attributes.get("namespace").map(str::to_string);
    let location = node.attributes.get("schemalocation").map(str::to_string);

    let namespace = match kind {
        TagKind::Include => cx.target_namespace_of(id),
        _ => declared,
    };

    if let (TagKind::Import, Some(uri)) = (kind, namespace.as_deref()) {
        cx.registry.register(&mut cx.scopes, Some(uri), None, None);
    }

    match location {
        Some(location) => {
            let base = cx.document(document).url.clone();
            let location = resolve_schema_location(&base, &location)?;
            debug!(%kind, location = %location, "found import");
            cx.document_mut(document).imports.push(ImportRecord {
                kind,
                namespace,
                location,
                line,
            });
        }
        None => trace!(%kind, ?namespace, "import without schemaLocation"),
    }
    Ok(())
}

/// Qualify a `name` attribute with the document's target namespace
fn own_name(cx: &Compilation, id: NodeId) -> Result<Option<QName>> {
    match cx.node(id).attributes.get("name") {
        Some(name) => {
            let name = name.trim();
            validate_ncname(name)?;
            Ok(Some(QName::new(cx.target_namespace_of(id), name)))
        }
        None => Ok(None),
    }
}

fn define_own_name(cx: &mut Compilation, id: NodeId, kind: DefinitionKind) -> Result<()> {
    if let Some(name) = own_name(cx, id)? {
        let node = cx.node_mut(id);
        node.name = Some(name.clone());
        let (scope, occurs) = (node.scope, node.occurs);
        cx.scopes.define(scope, name, kind, id, occurs);
    }
    Ok(())
}

fn occurs_attributes(cx: &Compilation, id: NodeId) -> Result<Occurs> {
    let attributes = &cx.node(id).attributes;
    parse_occurs(attributes.get("minoccurs"), attributes.get("maxoccurs"))
}

fn init_element(cx: &mut Compilation, id: NodeId) -> Result<()> {
    let occurs = occurs_attributes(cx, id)?;
    cx.node_mut(id).occurs = occurs;
    define_own_name(cx, id, DefinitionKind::Element)
}

fn init_attribute(cx: &mut Compilation, id: NodeId) -> Result<()> {
    let occurs = match cx.node(id).attributes.get("use").map(str::trim) {
        Some("required") => Occurs::once(),
        Some("prohibited") => Occurs::prohibited(),
        _ => Occurs::optional(),
    };
    cx.node_mut(id).occurs = occurs;
    define_own_name(cx, id, DefinitionKind::Attribute)
}

fn init_type(cx: &mut Compilation, id: NodeId) -> Result<()> {
    if cx.node(id).attributes.contains("name") {
        return define_own_name(cx, id, DefinitionKind::Type);
    }

    // Anonymous: a union collects it as a member, anything else adopts it
    let parent = cx.node(id).parent;
    if let Some(union) = parent.filter(|p| cx.node(*p).kind == TagKind::Union) {
        cx.node_mut(union).member_types.push(TypeRef::Resolved(id));
        return Ok(());
    }

    let scope = cx.node(id).scope;
    if let Some(declared_in) = cx.scopes.parent(scope) {
        if !cx.scopes.set_type(declared_in, id) {
            debug!(line = cx.node(id).line, "second anonymous type in one body ignored");
        }
    }
    Ok(())
}

fn init_group(cx: &mut Compilation, id: NodeId, kind: DefinitionKind) -> Result<()> {
    if kind == DefinitionKind::Group {
        let occurs = occurs_attributes(cx, id)?;
        cx.node_mut(id).occurs = occurs;
    }
    define_own_name(cx, id, kind)
}

fn init_particle(cx: &mut Compilation, id: NodeId) -> Result<()> {
    let occurs = occurs_attributes(cx, id)?;
    cx.node_mut(id).occurs = occurs;
    Ok(())
}

fn is_wildcard_owner(kind: TagKind) -> bool {
    matches!(
        kind,
        TagKind::ComplexType | TagKind::Group | TagKind::AttributeGroup
    )
}

fn set_wildcard(cx: &mut Compilation, id: NodeId, attribute: bool) {
    if let Some(owner) = cx.ancestor(id, is_wildcard_owner) {
        let owner = cx.node_mut(owner);
        if attribute {
            owner.any_attribute = true;
        } else {
            owner.any_content = true;
        }
    }
}

fn init_enumeration(cx: &mut Compilation, id: NodeId) -> Result<()> {
    let value = match cx.node(id).attributes.get("value") {
        Some(value) => value.to_string(),
        None => return Err(ParseError::new("enumeration without a value").into()),
    };
    if let Some(owner) = cx.ancestor(id, TagKind::is_type) {
        cx.node_mut(owner).enumeration.push(value);
    }
    Ok(())
}

// =============================================================================
// loaded
// =============================================================================

fn is_documented(kind: TagKind) -> bool {
    matches!(
        kind,
        TagKind::Schema
            | TagKind::Element
            | TagKind::Attribute
            | TagKind::ComplexType
            | TagKind::SimpleType
            | TagKind::Group
            | TagKind::AttributeGroup
    )
}

pub(crate) fn loaded(cx: &mut Compilation, id: NodeId) {
    if cx.node(id).kind != TagKind::Documentation {
        return;
    }
    let text = cx.node(id).text.trim().to_string();
    if text.is_empty() {
        return;
    }
    if let Some(owner) = cx.ancestor(id, is_documented) {
        cx.node_mut(owner).documentation.push(text);
    }
}

// =============================================================================
// resolve
// =============================================================================

pub(crate) fn resolve(cx: &mut Compilation, id: NodeId) {
    trace!(node = id.index(), kind = %cx.node(id).kind, "resolve");
    match cx.node(id).kind {
        TagKind::Element => resolve_member(cx, id, DefinitionKind::Element),
        TagKind::Attribute => resolve_member(cx, id, DefinitionKind::Attribute),
        TagKind::Group => resolve_group_ref(cx, id, DefinitionKind::Group),
        TagKind::AttributeGroup => resolve_group_ref(cx, id, DefinitionKind::AttributeGroup),
        TagKind::Sequence | TagKind::All => {
            let occurs = cx.node(id).occurs;
            inline_body(cx, id, &[DefinitionKind::Element], occurs);
        }
        TagKind::Choice => {
            // Each branch is optional on its own
            let occurs = cx.node(id).occurs.optionalized();
            inline_body(cx, id, &[DefinitionKind::Element], occurs);
        }
        TagKind::ComplexContent | TagKind::SimpleContent => inline_body(
            cx,
            id,
            &[DefinitionKind::Element, DefinitionKind::Attribute],
            Occurs::once(),
        ),
        TagKind::Extension => resolve_derivation(cx, id, Derivation::Extension),
        TagKind::Restriction => resolve_derivation(cx, id, Derivation::Restriction),
        TagKind::List => resolve_list(cx, id),
        TagKind::Union => resolve_union(cx, id),
        TagKind::Schema
        | TagKind::Import
        | TagKind::Include
        | TagKind::Annotation
        | TagKind::Documentation
        | TagKind::ComplexType
        | TagKind::SimpleType
        | TagKind::Any
        | TagKind::AnyAttribute
        | TagKind::Enumeration => {}
    }
}

/// Copy a tag's body definitions to where the tag itself is declared
fn inline_body(cx: &mut Compilation, id: NodeId, kinds: &[DefinitionKind], multiplier: Occurs) {
    let scope = cx.node(id).scope;
    for &kind in kinds {
        cx.scopes.inline_into_parent(scope, kind, multiplier, None);
    }
}

/// Resolve a type-valued attribute, reporting it when missing
fn resolve_type(cx: &mut Compilation, id: NodeId, value: &str) -> Option<TypeRef> {
    let name = cx.reference(id, value)?;
    match cx.lookup(id, &name, DefinitionKind::Type) {
        Some(target) => Some(TypeRef::Resolved(target)),
        None => {
            cx.missing(id, name.clone());
            Some(TypeRef::Unresolved(name))
        }
    }
}

fn attribute(cx: &Compilation, id: NodeId, name: &str) -> Option<String> {
    cx.node(id).attributes.get(name).map(str::to_string)
}

/// Elements and attributes: `ref`, `type`, `substitutionGroup`
fn resolve_member(cx: &mut Compilation, id: NodeId, kind: DefinitionKind) {
    let reference = attribute(cx, id, "ref");

    if let Some(reference) = &reference {
        if let Some(name) = cx.reference(id, reference) {
            match cx.lookup(id, &name, kind) {
                Some(target) => {
                    let name = cx.node(target).name.clone().unwrap_or(name);
                    let node = cx.node_mut(id);
                    node.referent = Some(target);
                    let (scope, occurs) = (node.scope, node.occurs);
                    cx.scopes.define(scope, name, kind, target, occurs);
                }
                None => cx.missing(id, name),
            }
        }
    }

    if let Some(value) = attribute(cx, id, "type") {
        let type_ref = resolve_type(cx, id, &value);
        cx.node_mut(id).type_ref = type_ref;
    } else if reference.is_none() {
        let scope = cx.node(id).scope;
        if let Some(anonymous) = cx.scopes.type_of(scope) {
            cx.node_mut(id).type_ref = Some(TypeRef::Resolved(anonymous));
        }
    }

    if let Some(head) = attribute(cx, id, "substitutiongroup") {
        if let Some(name) = cx.reference(id, &head) {
            match cx.lookup(id, &name, DefinitionKind::Element) {
                Some(head) => cx.node_mut(head).substitutes.push(id),
                None => cx.missing(id, name),
            }
        }
    }
}

/// `group ref` / `attributeGroup ref`: inline the referenced body
fn resolve_group_ref(cx: &mut Compilation, id: NodeId, kind: DefinitionKind) {
    let Some(reference) = attribute(cx, id, "ref") else {
        return;
    };
    let Some(name) = cx.reference(id, &reference) else {
        return;
    };
    let Some(target) = cx.lookup(id, &name, kind) else {
        cx.missing(id, name);
        return;
    };

    cx.node_mut(id).referent = Some(target);
    if !cx.ensure_resolved(target) {
        cx.circular(id, name);
        return;
    }

    let (scope, occurs) = {
        let node = cx.node(id);
        (node.scope, node.occurs)
    };
    let body = cx.node(target).scope;
    let members = match kind {
        DefinitionKind::Group => DefinitionKind::Element,
        _ => DefinitionKind::Attribute,
    };
    cx.scopes.inline_into_parent(scope, members, occurs, Some(body));

    let (any_content, any_attribute) = {
        let target = cx.node(target);
        (target.any_content, target.any_attribute)
    };
    if any_content {
        set_wildcard(cx, id, false);
    }
    if any_attribute {
        set_wildcard(cx, id, true);
    }
}

/// `extension` / `restriction`: record the base on the owning type, copy
/// the base's definitions into it, then pass the own body upward
fn resolve_derivation(cx: &mut Compilation, id: NodeId, derivation: Derivation) {
    let owner = cx.ancestor(id, TagKind::is_type);
    let mut inherit = None;

    let base = match attribute(cx, id, "base") {
        Some(value) => match resolve_type(cx, id, &value) {
            Some(TypeRef::Resolved(target)) => {
                if cx.ensure_resolved(target) {
                    inherit = Some(target);
                } else {
                    let name = cx
                        .node(target)
                        .name
                        .clone()
                        .unwrap_or_else(|| QName::local(value.trim()));
                    cx.circular(id, name);
                }
                Some(TypeRef::Resolved(target))
            }
            other => other,
        },
        None => {
            // restriction with a nested anonymous simpleType
            let scope = cx.node(id).scope;
            cx.scopes.type_of(scope).map(TypeRef::Resolved)
        }
    };

    if let Some(owner) = owner {
        let owner_scope = cx.node(owner).scope;
        if let Some(target) = inherit {
            let base_scope = cx.node(target).scope;
            for kind in [
                DefinitionKind::Element,
                DefinitionKind::Attribute,
                DefinitionKind::Group,
                DefinitionKind::AttributeGroup,
            ] {
                cx.scopes
                    .inline_into(owner_scope, kind, Occurs::once(), base_scope, true);
            }
        }
        let node = cx.node_mut(owner);
        node.base = base;
        node.derivation = Some(derivation);
    }

    inline_body(
        cx,
        id,
        &[DefinitionKind::Element, DefinitionKind::Attribute],
        Occurs::once(),
    );
}

/// `list`: the item type becomes the owning simple type's type
fn resolve_list(cx: &mut Compilation, id: NodeId) {
    let item = match attribute(cx, id, "itemtype") {
        Some(value) => resolve_type(cx, id, &value),
        None => {
            let scope = cx.node(id).scope;
            cx.scopes.type_of(scope).map(TypeRef::Resolved)
        }
    };
    cx.node_mut(id).type_ref = item.clone();
    if let Some(owner) = cx.ancestor(id, TagKind::is_type) {
        cx.node_mut(owner).type_ref = item;
    }
}

/// `union`: named member types first, then anonymous ones
fn resolve_union(cx: &mut Compilation, id: NodeId) {
    let mut members = Vec::new();
    if let Some(value) = attribute(cx, id, "membertypes") {
        for name in value.split_whitespace() {
            if let Some(member) = resolve_type(cx, id, name) {
                members.push(member);
            }
        }
    }
    members.extend(mem::take(&mut cx.node_mut(id).member_types));

    cx.node_mut(id).member_types = members.clone();
    if let Some(owner) = cx.ancestor(id, TagKind::is_type) {
        cx.node_mut(owner).member_types = members;
    }
}
