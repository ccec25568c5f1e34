use crate::{config::ParserConfig, errors::ParserResult, reference::Reference};
use codeindex_graph::{Entity, SourceUnit, Span};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree};

/// What kind of syntax problem a diagnostic records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Text the grammar could not place (`ERROR` node)
    Error,
    /// Token the parser had to invent to recover (`MISSING` node)
    Missing,
}

/// A syntax problem found in a tolerant parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or missing token
    pub kind: DiagnosticKind,
    /// Byte range of the offending node
    pub span: Span,
    /// 1-based line
    pub line: usize,
    /// 1-based byte column
    pub column: usize,
    /// Short human-readable description
    pub message: String,
}

/// A parsed unit: the concrete syntax tree, the exact text it was parsed
/// from, and the syntax diagnostics of the parse.
///
/// Parsing is tolerant: a tree with diagnostics is still a usable tree.
pub struct SyntaxTree {
    tree: Tree,
    source: String,
    language: String,
    path: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// Wrap a tree and collect its `ERROR`/`MISSING` diagnostics.
    pub fn new(
        tree: Tree,
        source: String,
        language: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let diagnostics = collect_diagnostics(&tree, &source);
        Self {
            tree,
            source,
            language: language.into(),
            path: path.into(),
            diagnostics,
        }
    }

    /// Root node of the tree
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The text the tree was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Language tag of the adapter that produced the tree
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Path the text was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syntax diagnostics, in source order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True if the parse needed error recovery
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Source text covered by `node` (empty if the range is not UTF-8)
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Number of lines in the source
    pub fn line_count(&self) -> usize {
        self.source.lines().count().max(1)
    }
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("language", &self.language)
            .field("path", &self.path)
            .field("bytes", &self.source.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

fn collect_diagnostics(tree: &Tree, source: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut stack = vec![tree.root_node()];

    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let (kind, message) = if node.is_missing() {
                (DiagnosticKind::Missing, format!("missing {}", node.kind()))
            } else {
                let text = node.utf8_text(source.as_bytes()).unwrap_or("");
                let excerpt: String = text.chars().take(40).collect();
                (DiagnosticKind::Error, format!("unexpected `{}`", excerpt.trim()))
            };
            diagnostics.push(Diagnostic {
                kind,
                span: Span::new(node.start_byte(), node.end_byte()),
                line: position.row + 1,
                column: position.column + 1,
                message,
            });
            continue;
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }

    diagnostics.sort_by_key(|d| d.span);
    diagnostics
}

/// Core trait that all language adapters must implement
///
/// An adapter turns text into a [`SyntaxTree`], the tree into entities, and
/// the tree plus entities into unresolved [`Reference`]s (pass 1 of edge
/// resolution). Adapters never touch the graph store.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`: units are prepared on a worker
/// pool and every worker shares the same adapter.
///
/// # Example
/// ```rust,ignore
/// use codeindex_parser_api::{LanguageParser, ParserConfig};
///
/// struct MyParser {
///     config: ParserConfig,
/// }
///
/// impl LanguageParser for MyParser {
///     fn language(&self) -> &str {
///         "mylang"
///     }
///
///     fn file_extensions(&self) -> &[&str] {
///         &[".my"]
///     }
///
///     // ... implement other required methods
/// }
/// ```
pub trait LanguageParser: Send + Sync {
    /// Returns the language identifier (lowercase, e.g., "c")
    fn language(&self) -> &str;

    /// Returns supported file extensions (e.g., [".c", ".h"])
    fn file_extensions(&self) -> &[&str];

    /// Parse text into a syntax tree
    ///
    /// Syntax errors do not fail the parse; they show up as
    /// [`SyntaxTree::diagnostics`].
    ///
    /// # Errors
    /// Returns `ParserError` if the grammar cannot be loaded or the parser
    /// produces no tree at all.
    fn parse(&self, text: &str, path: &Path) -> ParserResult<SyntaxTree>;

    /// Extract the unit's entities, File entity first, then in source order
    fn extract(&self, tree: &SyntaxTree, unit: &SourceUnit) -> Vec<Entity>;

    /// Collect every call, type mention, include and function-pointer
    /// assignment, owned by the innermost enclosing entity
    fn collect_references(
        &self,
        tree: &SyntaxTree,
        unit: &SourceUnit,
        entities: &[Entity],
    ) -> Vec<Reference>;

    /// Check if this adapter can handle the given file
    ///
    /// Default implementation checks file extension.
    fn can_parse(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_str = format!(".{}", ext.to_string_lossy());
            self.file_extensions().contains(&ext_str.as_str())
        } else {
            false
        }
    }

    /// Get adapter configuration
    fn config(&self) -> &ParserConfig;
}
