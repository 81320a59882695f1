//! XSD compiler
//!
//! Compilation is a two-pass process over a set of schema documents:
//!
//! 1. **First pass** (streaming, per document): tags are matched against the
//!    [`rules`] graph, handled tags become [`Node`]s, names are defined in
//!    lexical [`scope`]s and resolve hooks are queued.
//! 2. **Second pass** (after every reachable document's first pass): queued
//!    hooks run in close order, turning names into node references and
//!    flattening particles into their owning types.

pub mod builtins;
mod compilation;
mod handlers;
pub mod model;
mod parsing;
pub mod particles;
pub mod registry;
pub mod rules;
mod schemas;
pub mod scope;

pub use compilation::{
    Compilation, DocumentError, DocumentId, ImportRecord, Member, Phase, SkippedTag,
};
pub use model::{Attributes, Derivation, Node, NodeId, TypeRef};
pub use particles::Occurs;
pub use registry::{Namespace, NamespaceId, NamespaceRegistry, Source, SourceId};
pub use rules::{RuleSet, TagKind};
pub use schemas::{Compiler, CompilerOptions};
pub use scope::{Definition, DefinitionKind, ScopeArena, ScopeId};
