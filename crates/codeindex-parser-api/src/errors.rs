use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, parsing or extracting a unit
#[derive(Error, Debug)]
pub enum ParserError {
    /// Failed to read file
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    /// File content is not valid UTF-8
    #[error("File {0} is not valid UTF-8: {1}")]
    Encoding(PathBuf, #[source] std::string::FromUtf8Error),

    /// File larger than the configured ceiling
    #[error("File {0} is {1} bytes, exceeding maximum size ({2} bytes)")]
    FileTooLarge(PathBuf, u64, usize),

    /// No adapter registered for the file's language
    #[error("No parser registered for {0} (language: {1})")]
    UnsupportedLanguage(PathBuf, String),

    /// The grammar could not be loaded into the parser
    #[error("Failed to load {0} grammar: {1}")]
    Grammar(String, String),

    /// The parser produced no tree at all
    #[error("Parse error in {0}: {1}")]
    ParseFailed(PathBuf, String),

    /// Syntax errors and nothing extractable besides the file itself
    #[error("No entities extracted from {0} ({1} syntax errors)")]
    NoEntities(PathBuf, usize),
}

impl ParserError {
    /// True for errors that mean "not ours to index" rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, ParserError::UnsupportedLanguage(..))
    }
}

/// Result type for parser operations
pub type ParserResult<T> = Result<T, ParserError>;
