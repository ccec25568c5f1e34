//! Implementation of the LanguageParser trait for C

use codeindex_graph::{Entity, SourceUnit};
use codeindex_parser_api::{
    LanguageParser, ParserConfig, ParserError, ParserResult, Reference, SyntaxTree,
};
use log::{debug, trace};
use std::borrow::Cow;
use std::path::Path;
use tree_sitter::Parser;

use crate::kernel::KernelMacros;
use crate::preprocessor::{self, CPreprocessor};
use crate::references::ReferenceCollector;
use crate::visitor::CVisitor;

/// C language adapter
pub struct CParser {
    config: ParserConfig,
    preprocessor: CPreprocessor,
}

impl CParser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            preprocessor: CPreprocessor::new(),
        }
    }

    fn kernel_macros(&self, text: &str) -> Option<KernelMacros> {
        self.config.kernel_macros.then(|| KernelMacros::scan(text))
    }
}

impl Default for CParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for CParser {
    fn language(&self) -> &str {
        "c"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".c", ".h"]
    }

    fn parse(&self, text: &str, path: &Path) -> ParserResult<SyntaxTree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::language())
            .map_err(|e| ParserError::Grammar("c".to_string(), e.to_string()))?;

        // Blanking keeps every byte offset, so the tree fits the original text
        let mut blanked = Vec::new();
        if self.config.strip_annotations {
            blanked.extend(self.preprocessor.annotation_ranges(text));
        }
        if let Some(kernel) = self.kernel_macros(text) {
            blanked.extend_from_slice(kernel.blanked_ranges());
        }
        let input = if blanked.is_empty() {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(preprocessor::blank(text, blanked))
        };
        let tree = parser.parse(input.as_bytes(), None).ok_or_else(|| {
            ParserError::ParseFailed(path.to_path_buf(), "parser returned no tree".to_string())
        })?;

        let tree = SyntaxTree::new(tree, text.to_string(), self.language(), path);
        if tree.has_errors() {
            debug!(
                "{}: {} syntax diagnostics, continuing with partial tree",
                path.display(),
                tree.diagnostics().len()
            );
        }
        Ok(tree)
    }

    fn extract(&self, tree: &SyntaxTree, unit: &SourceUnit) -> Vec<Entity> {
        let mut visitor = CVisitor::new(tree, unit, &self.config);
        if let Some(kernel) = self.kernel_macros(tree.source()) {
            visitor = visitor.with_kernel_macros(kernel);
        }
        let entities = visitor.extract();
        trace!("{}: extracted {} entities", unit.id, entities.len());
        entities
    }

    fn collect_references(
        &self,
        tree: &SyntaxTree,
        unit: &SourceUnit,
        entities: &[Entity],
    ) -> Vec<Reference> {
        let mut collector = ReferenceCollector::new(tree, unit, entities);
        if let Some(kernel) = self.kernel_macros(tree.source()) {
            collector = collector.with_kernel_macros(kernel);
        }
        let references = collector.collect();
        trace!("{}: collected {} references", unit.id, references.len());
        references
    }

    fn config(&self) -> &ParserConfig {
        &self.config
    }
}
