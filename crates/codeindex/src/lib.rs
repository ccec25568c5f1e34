//! # codeindex
//!
//! Incremental structural code indexer. Parses a corpus of source files
//! into a graph of entities (functions, structs, unions, enums, typedefs,
//! macros, globals, files) and the calls, type references, includes and
//! function-pointer assignments between them, and keeps that graph
//! consistent as files are added, edited or removed.
//!
//! ## Pipeline
//!
//! ```text
//! loader -> adapter parse -> extract -> references (pass 1)
//!        -> local resolution (pass 2a)            [worker pool]
//!        -> external resolution (pass 2b) -> upsert -> reconcile
//!                                                 [single writer]
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use codeindex::{Indexer, IndexerConfig};
//!
//! let indexer = Indexer::for_root("path/to/project", IndexerConfig::default())?;
//! let report = indexer.scan_root()?;
//! println!("{report}");
//!
//! let graph = indexer.read()?;
//! for entity in graph.find_by_name("main") {
//!     println!("{} at {}:{}", entity.id, entity.unit, entity.line_start);
//! }
//! # Ok::<(), codeindex::IndexError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod registry;
pub mod report;
pub mod resolver;

pub use cancel::CancellationToken;
pub use config::IndexerConfig;
pub use error::{IndexError, Result};
pub use indexer::{CorpusFile, Indexer};
pub use loader::{load, LoadedSource};
pub use registry::ParserRegistry;
pub use report::ReindexReport;

// Re-export the graph and adapter API for convenience
pub use codeindex_graph::{
    Edge, EdgeKind, Entity, EntityId, EntityKind, GraphSnapshot, GraphStore, KernelRole, Linkage,
    LockKind, SourceUnit, Span, UnitId, UnitState,
};
pub use codeindex_parser_api::{LanguageParser, ParserConfig, ParserError};
