//! Tag rules
//!
//! Each XSD tag kind declares the attributes it understands and the child
//! kinds it may contain. [`RuleSet`] turns those declarations into a graph
//! of [`Rule`]s the parser walks while descending into a document: the
//! follower of a rule for a child tag name is the rule to use for that
//! child. The graph is cyclic (`sequence` may contain `sequence`), so rules
//! are memoized per kind and created before their followers are linked.

use crate::namespaces::QName;
use crate::XSD_NAMESPACE;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use super::scope::DefinitionKind;

/// XSD tag kinds understood by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    /// `xs:schema`
    Schema,
    /// `xs:import`
    Import,
    /// `xs:include`
    Include,
    /// `xs:annotation`
    Annotation,
    /// `xs:documentation`
    Documentation,
    /// `xs:element`
    Element,
    /// `xs:attribute`
    Attribute,
    /// `xs:complexType`
    ComplexType,
    /// `xs:simpleType`
    SimpleType,
    /// `xs:complexContent`
    ComplexContent,
    /// `xs:simpleContent`
    SimpleContent,
    /// `xs:extension`
    Extension,
    /// `xs:restriction`
    Restriction,
    /// `xs:sequence`
    Sequence,
    /// `xs:choice`
    Choice,
    /// `xs:all`
    All,
    /// `xs:group`
    Group,
    /// `xs:attributeGroup`
    AttributeGroup,
    /// `xs:any`
    Any,
    /// `xs:anyAttribute`
    AnyAttribute,
    /// `xs:list`
    List,
    /// `xs:union`
    Union,
    /// `xs:enumeration`
    Enumeration,
}

/// One entry of a may-contain list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    /// A specific tag kind
    Tag(TagKind),
    /// Any tag at all, recursively (documentation markup)
    Anything,
}

use Child::{Anything, Tag};
use TagKind::*;

const CONTENT_MODEL: &[Child] = &[
    Tag(Annotation),
    Tag(Element),
    Tag(Sequence),
    Tag(Choice),
    Tag(Group),
    Tag(Any),
];

const DERIVATION: &[Child] = &[
    Tag(Annotation),
    Tag(Sequence),
    Tag(Choice),
    Tag(All),
    Tag(Group),
    Tag(Attribute),
    Tag(AttributeGroup),
    Tag(AnyAttribute),
];

const RESTRICTION: &[Child] = &[
    Tag(Annotation),
    Tag(Sequence),
    Tag(Choice),
    Tag(All),
    Tag(Group),
    Tag(Attribute),
    Tag(AttributeGroup),
    Tag(AnyAttribute),
    Tag(SimpleType),
    Tag(Enumeration),
];

const ANNOTATED: &[Child] = &[Tag(Annotation)];

impl TagKind {
    /// Every kind, in declaration order
    pub const ALL: [TagKind; 23] = [
        Schema,
        Import,
        Include,
        Annotation,
        Documentation,
        Element,
        Attribute,
        ComplexType,
        SimpleType,
        ComplexContent,
        SimpleContent,
        Extension,
        Restriction,
        Sequence,
        Choice,
        All,
        Group,
        AttributeGroup,
        Any,
        AnyAttribute,
        List,
        Union,
        Enumeration,
    ];

    /// Local tag name in the XSD namespace
    pub const fn local_name(self) -> &'static str {
        match self {
            Schema => "schema",
            Import => "import",
            Include => "include",
            Annotation => "annotation",
            Documentation => "documentation",
            Element => "element",
            Attribute => "attribute",
            ComplexType => "complexType",
            SimpleType => "simpleType",
            ComplexContent => "complexContent",
            SimpleContent => "simpleContent",
            Extension => "extension",
            Restriction => "restriction",
            Sequence => "sequence",
            Choice => "choice",
            All => "all",
            Group => "group",
            AttributeGroup => "attributeGroup",
            Any => "any",
            AnyAttribute => "anyAttribute",
            List => "list",
            Union => "union",
            Enumeration => "enumeration",
        }
    }

    /// Attribute names (lowercase) copied onto a node of this kind
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            Schema => &[
                "targetnamespace",
                "elementformdefault",
                "attributeformdefault",
                "version",
            ],
            Import => &["namespace", "schemalocation"],
            Include => &["schemalocation"],
            Annotation => &[],
            Documentation => &["source", "xml:lang"],
            Element => &[
                "name",
                "ref",
                "type",
                "minoccurs",
                "maxoccurs",
                "abstract",
                "substitutiongroup",
                "nillable",
                "default",
                "fixed",
            ],
            Attribute => &["name", "ref", "type", "use", "default", "fixed"],
            ComplexType => &["name", "abstract", "mixed"],
            SimpleType => &["name"],
            ComplexContent => &["mixed"],
            SimpleContent => &[],
            Extension | Restriction => &["base"],
            Sequence | Choice | All => &["minoccurs", "maxoccurs"],
            Group => &["name", "ref", "minoccurs", "maxoccurs"],
            AttributeGroup => &["name", "ref"],
            Any => &["namespace", "processcontents", "minoccurs", "maxoccurs"],
            AnyAttribute => &["namespace", "processcontents"],
            List => &["itemtype"],
            Union => &["membertypes"],
            Enumeration => &["value"],
        }
    }

    /// Child kinds a tag of this kind may contain
    pub fn may_contain(self) -> &'static [Child] {
        match self {
            Schema => &[
                Tag(Annotation),
                Tag(Import),
                Tag(Include),
                Tag(Element),
                Tag(Attribute),
                Tag(ComplexType),
                Tag(SimpleType),
                Tag(Group),
                Tag(AttributeGroup),
            ],
            Annotation => &[Tag(Documentation)],
            Documentation => &[Anything],
            Element => &[Tag(Annotation), Tag(SimpleType), Tag(ComplexType)],
            Attribute => &[Tag(Annotation), Tag(SimpleType)],
            ComplexType => &[
                Tag(Annotation),
                Tag(Sequence),
                Tag(Choice),
                Tag(All),
                Tag(Group),
                Tag(Attribute),
                Tag(AttributeGroup),
                Tag(AnyAttribute),
                Tag(ComplexContent),
                Tag(SimpleContent),
            ],
            SimpleType => &[Tag(Annotation), Tag(Restriction), Tag(List), Tag(Union)],
            ComplexContent | SimpleContent => {
                &[Tag(Annotation), Tag(Extension), Tag(Restriction)]
            }
            Extension => DERIVATION,
            Restriction => RESTRICTION,
            Sequence | Choice => CONTENT_MODEL,
            All => &[Tag(Annotation), Tag(Element)],
            Group => &[Tag(Annotation), Tag(Sequence), Tag(Choice), Tag(All)],
            AttributeGroup => &[
                Tag(Annotation),
                Tag(Attribute),
                Tag(AttributeGroup),
                Tag(AnyAttribute),
            ],
            List | Union => &[Tag(Annotation), Tag(SimpleType)],
            Import | Include | Any | AnyAttribute | Enumeration => ANNOTATED,
        }
    }

    /// Symbol table a named tag of this kind is defined in
    pub fn definition_kind(self) -> Option<DefinitionKind> {
        match self {
            Element => Some(DefinitionKind::Element),
            Attribute => Some(DefinitionKind::Attribute),
            ComplexType | SimpleType => Some(DefinitionKind::Type),
            Group => Some(DefinitionKind::Group),
            AttributeGroup => Some(DefinitionKind::AttributeGroup),
            _ => None,
        }
    }

    /// Check if this kind defines a type
    pub fn is_type(self) -> bool {
        matches!(self, ComplexType | SimpleType)
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

/// Identifier of a rule within a [`RuleSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);

/// Parsing rule for one tag position
#[derive(Debug, Default)]
pub struct Rule {
    /// Tag kind handled at this position; `None` for the document root and
    /// for wildcard content, which create no nodes
    pub kind: Option<TagKind>,
    followers: HashMap<QName, RuleId>,
    by_local_name: HashMap<&'static str, RuleId>,
    wildcard: Option<RuleId>,
}

/// Memoized, possibly cyclic graph of rules
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
    memo: HashMap<TagKind, RuleId>,
    anything: Option<RuleId>,
    root: RuleId,
}

static RULES: Lazy<RuleSet> = Lazy::new(RuleSet::build);

impl RuleSet {
    /// The shared rule graph
    pub fn global() -> &'static RuleSet {
        &RULES
    }

    /// Build the rule graph, starting from the document root which may
    /// contain only `schema`
    pub fn build() -> Self {
        let mut set = Self {
            rules: vec![Rule::default()],
            memo: HashMap::new(),
            anything: None,
            root: RuleId(0),
        };
        let schema = set.rule_for(Schema);
        set.link(RuleId(0), Schema, schema);
        set
    }

    fn rule_for(&mut self, kind: TagKind) -> RuleId {
        if let Some(&id) = self.memo.get(&kind) {
            return id;
        }

        let id = RuleId(self.rules.len());
        self.rules.push(Rule {
            kind: Some(kind),
            ..Rule::default()
        });
        // Registered before the followers so cycles terminate
        self.memo.insert(kind, id);

        for child in kind.may_contain() {
            match *child {
                Tag(child_kind) => {
                    let follower = self.rule_for(child_kind);
                    self.link(id, child_kind, follower);
                }
                Anything => {
                    let follower = self.anything_rule();
                    self.rules[id.0].wildcard = Some(follower);
                }
            }
        }

        id
    }

    fn anything_rule(&mut self) -> RuleId {
        if let Some(id) = self.anything {
            return id;
        }
        let id = RuleId(self.rules.len());
        self.rules.push(Rule {
            wildcard: Some(id),
            ..Rule::default()
        });
        self.anything = Some(id);
        id
    }

    fn link(&mut self, from: RuleId, kind: TagKind, to: RuleId) {
        let rule = &mut self.rules[from.0];
        rule.followers
            .insert(QName::namespaced(XSD_NAMESPACE, kind.local_name()), to);
        rule.by_local_name.insert(kind.local_name(), to);
    }

    /// Rule for the document itself
    pub fn root(&self) -> RuleId {
        self.root
    }

    /// Get a rule
    pub fn get(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    /// Rule for a child tag: exact qualified name first, then bare local
    /// name, then the wildcard
    pub fn follower(&self, rule: RuleId, name: &QName) -> Option<RuleId> {
        let rule = self.get(rule);
        rule.followers
            .get(name)
            .or_else(|| rule.by_local_name.get(name.local_name.as_str()))
            .copied()
            .or(rule.wildcard)
    }

    /// Rule handling `kind`, if reachable from the root
    pub fn rule_of(&self, kind: TagKind) -> Option<RuleId> {
        self.memo.get(&kind).copied()
    }

    /// Number of distinct rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the set is empty (never true for a built set)
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
