//! First pass: streaming parse of one schema document
//!
//! The parser keeps a stack of [`State`]s, one per open tag. Each state
//! knows the rule for its position, its body scope and the node created
//! for it (if the tag is handled). Tags with no rule at their position are
//! skipped along with their whole subtree.

use crate::error::{Error, ParseError, Result, SourcePosition};
use crate::limits::Limits;
use crate::namespaces::NamespaceContext;
use crate::tokenizer::{Tokenizer, XmlEvent};
use tracing::{debug, trace};

use super::compilation::{Compilation, DocumentId, SkippedTag};
use super::handlers;
use super::model::{Attributes, Node, NodeId};
use super::rules::{RuleId, RuleSet, TagKind};
use super::scope::ScopeId;

/// Parser state for one open tag
#[derive(Debug, Clone)]
pub(crate) struct State {
    /// Rule at this position; `None` inside a skipped subtree
    pub rule: Option<RuleId>,
    /// Body scope
    pub scope: ScopeId,
    /// Node created for the tag, if handled
    pub node: Option<NodeId>,
    /// Node receiving character data
    pub capture: Option<NodeId>,
}

/// Check if the root tag declares a non-empty target namespace
fn declares_target(attributes: &[(String, String)]) -> bool {
    attributes
        .iter()
        .any(|(name, value)| name.eq_ignore_ascii_case("targetnamespace") && !value.is_empty())
}

/// Build the prefix table from the root tag's raw attributes
fn root_context(attributes: &[(String, String)], chameleon: Option<&str>) -> NamespaceContext {
    let mut context = NamespaceContext::new();
    let mut target = None;

    for (name, value) in attributes {
        if name == "xmlns" {
            context.set_default_namespace(value.as_str());
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            context.add_prefix(prefix, value.as_str());
        } else if name.eq_ignore_ascii_case("targetnamespace") {
            target = Some(value.clone());
        }
    }

    let target = target
        .filter(|t| !t.is_empty())
        .or_else(|| chameleon.map(str::to_string));
    context.set_target_namespace(target);
    context
}

/// Copy the attributes `kind` understands, matching names
/// case-insensitively. An exact lowercase spelling wins over other
/// casings of the same name.
fn copy_attributes(kind: TagKind, raw: &[(String, String)]) -> Attributes {
    let mut attributes = Attributes::new();
    for &name in kind.attributes() {
        let value = raw
            .iter()
            .find(|(key, _)| key == name)
            .or_else(|| raw.iter().find(|(key, _)| key.to_lowercase() == name));
        if let Some((_, value)) = value {
            attributes.insert(name, value.clone());
        }
    }
    attributes
}

fn locate(error: Error, url: &str, line: usize) -> Error {
    let position = SourcePosition::new(url, line);
    match error {
        Error::Parse(e) if e.location.is_none() => e.with_location(position).into(),
        Error::Parse(e) => Error::Parse(e),
        Error::Name(message) | Error::Namespace(message) => {
            ParseError::new(message).with_location(position).into()
        }
        other => other,
    }
}

/// Run the first pass over `bytes`, creating nodes and queueing resolve
/// hooks. Any error aborts the document.
pub(crate) fn parse_document(
    cx: &mut Compilation,
    document: DocumentId,
    bytes: &[u8],
    chameleon: Option<&str>,
    limits: &Limits,
) -> Result<()> {
    let rules = RuleSet::global();
    let url = cx.document(document).url.to_string();
    let mut tokenizer = Tokenizer::new(bytes);
    let mut context: Option<NamespaceContext> = None;
    let mut stack = vec![State {
        rule: Some(rules.root()),
        scope: cx.primitives,
        node: None,
        capture: None,
    }];

    debug!(url = %url, "first pass");

    while let Some(event) = tokenizer.next_event()? {
        let line = tokenizer.line();
        match event {
            XmlEvent::Open { name, attributes } => {
                limits.check_xml_depth(stack.len())?;
                limits.check_attributes(attributes.len())?;

                let context = context.get_or_insert_with(|| {
                    let root = root_context(&attributes, chameleon);
                    let entry = cx.document_mut(document);
                    entry.prefixes = root.clone();
                    entry.chameleon = !declares_target(&attributes);
                    root
                });
                let tag = context
                    .resolve_tag(&name)
                    .map_err(|e| locate(e, &url, line))?;

                let parent = stack.last().ok_or_else(|| {
                    ParseError::new("content after the root element")
                        .with_location(SourcePosition::new(url.as_str(), line))
                })?;
                let rule = parent.rule.and_then(|r| rules.follower(r, &tag));
                let parent_node = stack.iter().rev().find_map(|s| s.node);
                let mut state = State {
                    rule,
                    scope: cx.scopes.create_child(parent.scope),
                    node: None,
                    capture: parent.capture,
                };

                match rule.and_then(|r| rules.get(r).kind) {
                    Some(kind) => {
                        let mut node = Node::new(kind, state.scope);
                        node.attributes = copy_attributes(kind, &attributes);
                        node.source = cx.document(document).source;
                        node.line = line;
                        node.parent = parent_node;
                        let id = cx.add_node(node);
                        state.node = Some(id);
                        handlers::init(cx, document, &mut state, id)
                            .map_err(|e| locate(e, &url, line))?;
                    }
                    None if rule.is_none() && parent.rule.is_some() => {
                        debug!(tag = %tag, line, "skipping unhandled child tag");
                        cx.skipped.push(SkippedTag {
                            url: url.clone(),
                            line,
                            name: tag,
                        });
                    }
                    None => trace!(tag = %tag, line, "unhandled content"),
                }

                stack.push(state);
            }
            XmlEvent::Text(text) => {
                if let Some(capture) = stack.last().and_then(|s| s.capture) {
                    let buffer = &mut cx.node_mut(capture).text;
                    if !buffer.is_empty() {
                        buffer.push(' ');
                    }
                    buffer.push_str(text.trim());
                }
            }
            XmlEvent::Close { .. } => {
                if stack.len() < 2 {
                    return Err(ParseError::new("unexpected closing tag")
                        .with_location(SourcePosition::new(url.as_str(), line))
                        .into());
                }
                let state = stack.pop();
                if let Some(id) = state.and_then(|s| s.node) {
                    let kind = cx.node(id).kind;
                    if handlers::has_loaded(kind) {
                        handlers::loaded(cx, id);
                    }
                    if handlers::has_resolve(kind) {
                        cx.enqueue(document, id);
                    } else {
                        cx.node_mut(id).resolved = true;
                    }
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::new("unexpected end of document")
            .with_location(SourcePosition::new(url.as_str(), tokenizer.line()))
            .into());
    }
    if cx.document(document).source.is_none() {
        return Err(ParseError::new("document root is not an XSD schema")
            .with_location(SourcePosition::new(url.as_str(), 1))
            .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_root_context() {
        let attributes = raw(&[
            ("xmlns:xs", "http://www.w3.org/2001/XMLSchema"),
            ("xmlns", "urn:default"),
            ("targetNamespace", "urn:target"),
        ]);
        let context = root_context(&attributes, Some("urn:ignored"));
        assert_eq!(context.get_target_namespace(), Some("urn:target"));
        assert_eq!(context.get_default_namespace(), Some("urn:default"));
        assert_eq!(
            context.get_namespace("xs"),
            Some("http://www.w3.org/2001/XMLSchema")
        );
    }

    #[test]
    fn test_chameleon_target_namespace() {
        let context = root_context(&raw(&[]), Some("urn:includer"));
        assert_eq!(context.get_target_namespace(), Some("urn:includer"));

        let context = root_context(&raw(&[]), None);
        assert_eq!(context.get_target_namespace(), None);
    }

    #[test]
    fn test_declares_target() {
        assert!(declares_target(&raw(&[("targetNamespace", "urn:a")])));
        assert!(declares_target(&raw(&[("TARGETNAMESPACE", "urn:a")])));
        assert!(!declares_target(&raw(&[("targetNamespace", "")])));
        assert!(!declares_target(&raw(&[("xmlns", "urn:a")])));
    }

    #[test]
    fn test_copy_attributes_lowercases_without_clobbering() {
        let attributes = copy_attributes(
            TagKind::Element,
            &raw(&[
                ("minOccurs", "2"),
                ("maxoccurs", "5"),
                ("MAXOCCURS", "7"),
                ("name", "a"),
                ("unknown", "x"),
            ]),
        );
        assert_eq!(attributes.get("minoccurs"), Some("2"));
        assert_eq!(attributes.get("maxoccurs"), Some("5"));
        assert_eq!(attributes.get("name"), Some("a"));
        assert!(!attributes.contains("unknown"));
        assert_eq!(attributes.len(), 3);
    }

    #[test]
    fn test_locate_adds_position() {
        let error = locate(Error::Name("Invalid NCName: '1x'".into()), "mem:a", 4);
        match error {
            Error::Parse(e) => {
                assert_eq!(e.location, Some(SourcePosition::new("mem:a", 4)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
