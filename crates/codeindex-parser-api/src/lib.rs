//! codeindex Parser API
//!
//! Shared trait and types for building codeindex language adapters.
//!
//! This crate defines:
//!
//! - **LanguageParser trait**: The interface every language adapter implements
//! - **SyntaxTree**: A tolerant parse with its diagnostics
//! - **Reference**: Pass-1 output, a name mention awaiting resolution
//! - **Configuration**: Customizable adapter behavior
//! - **Error handling**: Per-unit error types
//!
//! Entities and edges themselves live in `codeindex-graph`.
//!
//! # Example
//!
//! ```rust,ignore
//! use codeindex_parser_api::{LanguageParser, ParserConfig, ParserResult, Reference, SyntaxTree};
//! use codeindex_graph::{Entity, SourceUnit};
//! use std::path::Path;
//!
//! struct MyParser {
//!     config: ParserConfig,
//! }
//!
//! impl LanguageParser for MyParser {
//!     fn language(&self) -> &str {
//!         "mylang"
//!     }
//!
//!     fn file_extensions(&self) -> &[&str] {
//!         &[".my"]
//!     }
//!
//!     fn parse(&self, text: &str, path: &Path) -> ParserResult<SyntaxTree> {
//!         todo!()
//!     }
//!
//!     fn extract(&self, tree: &SyntaxTree, unit: &SourceUnit) -> Vec<Entity> {
//!         todo!()
//!     }
//!
//!     fn collect_references(&self, tree: &SyntaxTree, unit: &SourceUnit, entities: &[Entity])
//!         -> Vec<Reference> {
//!         todo!()
//!     }
//!
//!     fn config(&self) -> &ParserConfig {
//!         &self.config
//!     }
//! }
//! ```

pub mod config;
pub mod errors;
pub mod reference;
pub mod traits;

// Re-export commonly used types
pub use config::ParserConfig;
pub use errors::{ParserError, ParserResult};
pub use reference::{Reference, CALLABLE_KINDS};
pub use traits::{Diagnostic, DiagnosticKind, LanguageParser, SyntaxTree};
