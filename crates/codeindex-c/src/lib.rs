//! # codeindex-c
//!
//! C adapter for codeindex - extracts entities and unresolved references
//! from C source files.
//!
//! ## Features
//!
//! - Parse C source files (.c) and header files (.h)
//! - Extract functions, structs, unions, enums, typedefs, macros and globals
//! - Collect calls, type mentions, includes and function-pointer assignments
//! - Over-approximate calls through function pointers
//! - **Tolerant parsing** of incomplete code: syntax errors become diagnostics
//! - **Annotation blanking** for Linux kernel and system code
//! - Kernel macros: `SYSCALL_DEFINEn`, `module_init`/`module_exit`,
//!   `EXPORT_SYMBOL*`, `module_param` and lock objects
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codeindex_c::CParser;
//! use codeindex_graph::{SourceUnit, UnitId};
//! use codeindex_parser_api::LanguageParser;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = CParser::new();
//! let source = "int add(int a, int b) { return a + b; }\n";
//! let unit = SourceUnit::new(UnitId::new("math.c"), "math.c", "c");
//!
//! let tree = parser.parse(source, Path::new("math.c"))?;
//! let entities = parser.extract(&tree, &unit);
//! let references = parser.collect_references(&tree, &unit, &entities);
//! println!("{} entities, {} references", entities.len(), references.len());
//! # Ok(())
//! # }
//! ```

mod declarator;
pub mod kernel;
mod parser_impl;
pub mod preprocessor;
pub mod references;
pub mod visitor;

// Re-export parser-api types for convenience
pub use codeindex_parser_api::{LanguageParser, ParserConfig, ParserError};

// Export the C parser implementation
pub use parser_impl::CParser;

pub use kernel::KernelMacros;
pub use preprocessor::CPreprocessor;
pub use references::ReferenceCollector;
pub use visitor::CVisitor;
