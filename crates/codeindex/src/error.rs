use codeindex_graph::GraphError;
use codeindex_parser_api::ParserError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for indexer operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that stop an indexer operation as a whole.
///
/// Per-unit problems (unreadable files, parse failures, invalid batches)
/// never surface here; they are collected in the
/// [`ReindexReport`](crate::ReindexReport) instead.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Error from the graph store
    #[error("Graph operation failed: {0}")]
    Graph(#[from] GraphError),

    /// Error from a language adapter or the loader
    #[error(transparent)]
    Parser(#[from] ParserError),

    /// Invalid indexer configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error outside any single unit (configuration file, corpus root)
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A thread panicked while holding the graph lock
    #[error("Graph lock poisoned by a panicked writer")]
    Poisoned,
}

impl IndexError {
    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        IndexError::Config(message.into())
    }

    /// Create an Io error from a path and io::Error
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = IndexError::config("parallel_workers must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: parallel_workers must be greater than 0"
        );
    }

    #[test]
    fn test_parser_error_is_transparent() {
        let err: IndexError =
            ParserError::UnsupportedLanguage(PathBuf::from("a.zig"), "zig".to_string()).into();
        assert_eq!(err.to_string(), "No parser registered for a.zig (language: zig)");
    }

    #[test]
    fn test_graph_error_converts() {
        let err: IndexError = GraphError::UnitNotFound {
            unit: "a.c".to_string(),
        }
        .into();
        assert!(matches!(err, IndexError::Graph(_)));
    }
}
