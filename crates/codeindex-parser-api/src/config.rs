use serde::{Deserialize, Serialize};

/// Configuration for parser behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum file size to parse (in bytes)
    /// Files larger than this are reported as failed without being read
    pub max_file_size: usize,

    /// Attach the comment block above a definition as its doc comment
    pub include_docs: bool,

    /// Record signature metadata (parameter and field types, qualifiers)
    pub extract_types: bool,

    /// Blank kernel-style annotations (`__init`, `__user`, ...) before parsing
    pub strip_annotations: bool,

    /// Recognize Linux kernel macros: syscall definitions, module
    /// registrations and exports, module parameters and lock objects
    pub kernel_macros: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10 MB
            include_docs: true,
            extract_types: true,
            strip_annotations: true,
            kernel_macros: true,
        }
    }
}

impl ParserConfig {
    /// Create config for fast parsing (skips docs and types)
    pub fn fast() -> Self {
        Self {
            include_docs: false,
            extract_types: false,
            ..Default::default()
        }
    }

    /// Create config for comprehensive parsing
    pub fn comprehensive() -> Self {
        Self {
            include_docs: true,
            extract_types: true,
            strip_annotations: true,
            kernel_macros: true,
            ..Default::default()
        }
    }

    /// Set maximum file size
    pub fn with_max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }

    /// Enable or disable doc comments
    pub fn with_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    /// Enable or disable signature metadata
    pub fn with_types(mut self, extract_types: bool) -> Self {
        self.extract_types = extract_types;
        self
    }

    /// Enable or disable annotation blanking
    pub fn with_strip_annotations(mut self, strip: bool) -> Self {
        self.strip_annotations = strip;
        self
    }

    /// Enable or disable kernel macro recognition
    pub fn with_kernel_macros(mut self, kernel_macros: bool) -> Self {
        self.kernel_macros = kernel_macros;
        self
    }
}
