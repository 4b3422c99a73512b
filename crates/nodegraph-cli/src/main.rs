//! Node graph document tools.
//!
//! Provides the `nodegraph` binary for inspecting and maintaining stored
//! graph documents:
//! - `inspect`: load a document and report placeholders and load anomalies
//! - `deps`: print dependencies in processing order
//! - `markers`: aggregate a diagnostics batch into per-element markers
//! - `resave`: load and save a document, keeping placeholder payloads intact
//! - `import`: copy a document into a SQLite document store
//!
//! Configuration via environment variables:
//! - `NODEGRAPH_TYPES`: type manifest path, used when `--types` is absent
//!
//! Exit codes: 0 = success, 1 = invalid input, 2 = error markers present,
//! 3 = I/O error.

mod manifest;
mod report;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use nodegraph_check::diagnostics::{aggregate, RawDiagnostic};
use nodegraph_core::id::Guid;
use nodegraph_core::type_registry::TypeRegistry;
use nodegraph_storage::convert::{decompose, recompose, LoadedDocument};
use nodegraph_storage::dirty::compute_dirty_regions;
use nodegraph_storage::document::StoredDocument;
use nodegraph_storage::traits::DocumentStore;
use nodegraph_storage::{SqliteStore, StorageError};

use crate::manifest::{ManifestError, TypeManifest};

/// Node graph document tools.
#[derive(Parser)]
#[command(name = "nodegraph", about = "Inspect and maintain node graph documents")]
struct Cli {
    /// Type manifest (JSON). Defaults to $NODEGRAPH_TYPES.
    #[arg(short, long, global = true)]
    types: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and report what did not resolve.
    Inspect {
        document: PathBuf,

        /// Print the load report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print dependencies in processing order.
    Deps {
        document: PathBuf,

        /// Only list nodes affected by an edit of this node.
        #[arg(long)]
        node: Option<String>,
    },
    /// Aggregate a JSON array of diagnostics into markers.
    Markers {
        document: PathBuf,

        /// Diagnostics batch file.
        #[arg(short, long)]
        diagnostics: PathBuf,

        /// Print the marker set as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Load and save a document.
    Resave {
        document: PathBuf,

        /// Output path (default: overwrite the input).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store a document in a SQLite database.
    Import {
        document: PathBuf,

        /// Path to the database file.
        #[arg(long)]
        db: String,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let types = cli
        .types
        .or_else(|| std::env::var("NODEGRAPH_TYPES").ok().map(PathBuf::from));
    let registry = match load_registry(types.as_deref()) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(match e {
                ManifestError::Io(_) => 3,
                _ => 1,
            });
        }
    };

    let exit_code = match cli.command {
        Commands::Inspect { document, json } => run_inspect(&document, &registry, json),
        Commands::Deps { document, node } => run_deps(&document, &registry, node.as_deref()),
        Commands::Markers {
            document,
            diagnostics,
            json,
        } => run_markers(&document, &diagnostics, &registry, json),
        Commands::Resave { document, output } => {
            run_resave(&document, output.as_deref(), &registry)
        }
        Commands::Import { document, db } => run_import(&document, &db, &registry),
    };
    process::exit(exit_code);
}

fn load_registry(path: Option<&Path>) -> Result<TypeRegistry, ManifestError> {
    match path {
        Some(path) => TypeManifest::read_from(path)?.into_registry(),
        None => Ok(TypeRegistry::new()),
    }
}

/// Exit code for a storage failure: 3 for I/O, 1 for malformed input.
fn storage_exit_code(error: &StorageError) -> i32 {
    match error {
        StorageError::Io(_) | StorageError::Sqlite(_) | StorageError::Migration(_) => 3,
        _ => 1,
    }
}

fn load(path: &Path, registry: &TypeRegistry) -> Result<LoadedDocument, i32> {
    match StoredDocument::read_from(path) {
        Ok(document) => Ok(recompose(&document, registry)),
        Err(e) => {
            eprintln!("Error: failed to load '{}': {}", path.display(), e);
            Err(storage_exit_code(&e))
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

fn run_inspect(path: &Path, registry: &TypeRegistry, json: bool) -> i32 {
    let loaded = match load(path, registry) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if json {
        print_json(&loaded.report);
    } else {
        println!("{}", report::render_inspect(&loaded));
    }
    0
}

fn run_deps(path: &Path, registry: &TypeRegistry, node: Option<&str>) -> i32 {
    let focus = match node.map(|text| Guid::parse(text).ok_or(text)).transpose() {
        Ok(focus) => focus,
        Err(text) => {
            eprintln!("Error: '{}' is not a GUID", text);
            return 1;
        }
    };
    let loaded = match load(path, registry) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    println!("{}", report::render_dependencies(&loaded.graph, focus));
    0
}

fn run_markers(path: &Path, diagnostics: &Path, registry: &TypeRegistry, json: bool) -> i32 {
    let loaded = match load(path, registry) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let text = match std::fs::read_to_string(diagnostics) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", diagnostics.display(), e);
            return 3;
        }
    };
    let batch: Vec<RawDiagnostic> = match serde_json::from_str(&text) {
        Ok(batch) => batch,
        Err(e) => {
            eprintln!("Error: malformed diagnostics: {}", e);
            return 1;
        }
    };

    let markers = aggregate(&loaded.graph, batch);
    if json {
        print_json(&markers);
    } else {
        println!("{}", markers.summary());
    }
    if markers.has_errors() {
        2
    } else {
        0
    }
}

fn run_resave(path: &Path, output: Option<&Path>, registry: &TypeRegistry) -> i32 {
    let loaded = match load(path, registry) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let target = output.unwrap_or(path);
    let saved = decompose(&loaded.graph).and_then(|document| {
        document.write_to(target)?;
        Ok(document)
    });
    match saved {
        Ok(document) => {
            let regions = compute_dirty_regions(&document, &loaded.fingerprints);
            info!(path = %target.display(), changed = regions.total(), "document saved");
            println!("{}", report::render_resave(&loaded, &regions));
            0
        }
        Err(e) => {
            eprintln!("Error: failed to save '{}': {}", target.display(), e);
            storage_exit_code(&e)
        }
    }
}

fn run_import(path: &Path, db: &str, registry: &TypeRegistry) -> i32 {
    let loaded = match load(path, registry) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let imported = SqliteStore::new(db).and_then(|mut store| {
        let id = store.create_document(loaded.graph.name())?;
        store.save_graph(id, &loaded.graph)?;
        Ok(id)
    });
    match imported {
        Ok(id) => {
            println!("{}", id.0);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to import into '{}': {}", db, e);
            storage_exit_code(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegraph_check::diagnostics::Severity;
    use nodegraph_core::element::{ElementBody, ElementCategory, NodeData};
    use nodegraph_core::graph::GraphModel;
    use nodegraph_core::GraphElement;

    fn write_sample(dir: &Path) -> (PathBuf, Guid, Guid) {
        let mut graph = GraphModel::new("main");
        let node = graph
            .insert(
                GraphElement::new(
                    Guid::generate(),
                    "Legacy.Sink",
                    ElementCategory::Node,
                    ElementBody::Node(NodeData::default()),
                )
                .unwrap(),
            )
            .unwrap();
        let path = dir.join("main.graph.json");
        decompose(&graph).unwrap().write_to(&path).unwrap();
        (path, graph.guid(), node)
    }

    #[test]
    fn resave_without_types_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _, _) = write_sample(dir.path());
        let before = std::fs::read_to_string(&path).unwrap();
        let output = dir.path().join("out.graph.json");

        assert_eq!(run_resave(&path, Some(&output), &TypeRegistry::new()), 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), before);
    }

    #[test]
    fn error_markers_exit_with_two() {
        let dir = tempfile::tempdir().unwrap();
        let (path, graph, node) = write_sample(dir.path());
        let diagnostics = dir.path().join("diagnostics.json");
        let batch = vec![
            RawDiagnostic::new(node, graph, Severity::Warning, "slow"),
            RawDiagnostic::new(node, graph, Severity::Error, "broken"),
        ];
        std::fs::write(&diagnostics, serde_json::to_string(&batch).unwrap()).unwrap();
        assert_eq!(
            run_markers(&path, &diagnostics, &TypeRegistry::new(), false),
            2
        );
    }

    #[test]
    fn missing_document_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(run_inspect(&missing, &TypeRegistry::new(), false), 3);
        assert_eq!(run_deps(&missing, &TypeRegistry::new(), Some("nope")), 1);
    }

    #[test]
    fn import_stores_document() {
        let dir = tempfile::tempdir().unwrap();
        let (path, graph, _) = write_sample(dir.path());
        let db = dir.path().join("graphs.db");
        let db = db.to_str().unwrap();
        assert_eq!(run_import(&path, db, &TypeRegistry::new()), 0);

        let store = SqliteStore::new(db).unwrap();
        let summaries = store.list_documents().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].graph, graph);
    }
}
