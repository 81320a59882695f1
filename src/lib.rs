//! # xsd-compiler
//!
//! Compiles XML Schema (XSD) documents into a fully resolved,
//! language-agnostic type model, ready for code generators.
//!
//! ## Features
//!
//! - Streaming, rule-driven first pass over each schema document
//! - Transitive `import`/`include` handling, each document compiled once
//! - Lexical scopes with occurrence bounds accumulated through particles
//! - Deferred second pass resolving `ref`, `type`, `base`,
//!   `substitutionGroup`, `itemType` and `memberTypes`
//! - Serializable export model (JSON via `serde_json`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use xsd_compiler::{Compiler, FileLoader, SchemaExport};
//!
//! let compilation = Compiler::new(FileLoader::new()).compile_location("schema.xsd")?;
//! compilation.check()?;
//! let json = SchemaExport::from_compilation(&compilation).to_json(true)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and locations
pub mod locations;
pub mod names;
pub mod namespaces;

// Input
pub mod loaders;
pub mod tokenizer;

// Compilation
pub mod compiler;
pub mod exports;

// Re-exports for convenience
pub use compiler::{Compilation, Compiler, CompilerOptions};
pub use error::{Error, ResolveError, Result};
pub use exports::SchemaExport;
pub use loaders::{Fetch, FileLoader, MemoryLoader};
pub use namespaces::{QName, XML_NAMESPACE};

/// Version of the xsd-compiler library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
