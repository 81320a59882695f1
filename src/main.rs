//! Command-line interface for xsd-compiler

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xsd_compiler::compiler::DefinitionKind;
#[cfg(feature = "cli")]
use xsd_compiler::locations::path_to_url;
#[cfg(feature = "cli")]
use xsd_compiler::{Compilation, Compiler, CompilerOptions, FileLoader, SchemaExport};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsd-compiler")]
#[command(author, version, about = "XML Schema compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile an XSD schema and print its resolved model as JSON
    Inspect {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Pretty print the JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Print a short summary instead of JSON
        #[arg(short, long)]
        summary: bool,

        /// Refuse to fetch non-file imports
        #[arg(long)]
        offline: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            schema,
            pretty,
            summary,
            offline,
        } => cmd_inspect(schema, pretty, summary, offline),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the schema compiled without errors
#[cfg(feature = "cli")]
fn cmd_inspect(
    schema_path: PathBuf,
    pretty: bool,
    summary: bool,
    offline: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let url = path_to_url(&schema_path)?;
    let options = CompilerOptions::new().with_remote(!offline);
    let compilation = Compiler::new(FileLoader::new())
        .with_options(options)
        .compile(&url)?;

    for failed in compilation.document_errors() {
        eprintln!("Error: {}: {}", failed.url, failed.error);
    }
    for error in compilation.errors() {
        eprintln!("Error: {}", error);
    }

    if summary {
        print_summary(&compilation);
    } else {
        let export = SchemaExport::from_compilation(&compilation);
        println!("{}", export.to_json(pretty)?);
    }

    Ok(compilation.errors().is_empty() && compilation.document_errors().is_empty())
}

#[cfg(feature = "cli")]
fn print_summary(compilation: &Compilation) {
    println!("xsd-compiler v{}", xsd_compiler::VERSION);
    println!();
    println!("Documents: {}", compilation.sources().len());
    for namespace in compilation.namespaces().filter(|n| !n.sources.is_empty()) {
        let name = namespace.name.as_deref().unwrap_or("");
        println!();
        println!(
            "Namespace: {}",
            if name.is_empty() { "(none)" } else { name }
        );
        if let Some(short) = &namespace.short {
            println!("  Short name: {}", short);
        }
        println!("  Documents: {}", namespace.sources.len());
        println!(
            "  Global Elements: {}",
            compilation.globals(namespace.id, DefinitionKind::Element).len()
        );
        println!(
            "  Global Types: {}",
            compilation.globals(namespace.id, DefinitionKind::Type).len()
        );
        println!(
            "  Global Attributes: {}",
            compilation.globals(namespace.id, DefinitionKind::Attribute).len()
        );
        println!(
            "  Model Groups: {}",
            compilation.globals(namespace.id, DefinitionKind::Group).len()
        );
        println!(
            "  Attribute Groups: {}",
            compilation
                .globals(namespace.id, DefinitionKind::AttributeGroup)
                .len()
        );
    }
    println!();
    println!("Unresolved references: {}", compilation.errors().len());
    println!("Skipped tags: {}", compilation.skipped_tags().len());
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
