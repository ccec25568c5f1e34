//! Source unit loading: raw bytes, UTF-8 text and content fingerprint.

use codeindex_parser_api::{ParserError, ParserResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Text of a source file together with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    /// File content
    pub text: String,
    /// SHA-256 hex digest of the raw bytes
    pub content_hash: String,
    /// Size in bytes
    pub byte_len: u64,
}

impl LoadedSource {
    /// First line of the text, used for modeline sniffing.
    pub fn first_line(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read `path` as UTF-8 text.
///
/// The size ceiling is checked against file metadata before any byte is
/// read, so oversized files cost one `stat`.
///
/// # Errors
///
/// - [`ParserError::Io`] if the file cannot be read
/// - [`ParserError::FileTooLarge`] if it exceeds `max_file_size` bytes
/// - [`ParserError::Encoding`] if it is not valid UTF-8
pub fn load(path: &Path, max_file_size: usize) -> ParserResult<LoadedSource> {
    let metadata = fs::metadata(path).map_err(|e| ParserError::Io(path.to_path_buf(), e))?;
    if metadata.len() > max_file_size as u64 {
        return Err(ParserError::FileTooLarge(
            path.to_path_buf(),
            metadata.len(),
            max_file_size,
        ));
    }

    let bytes = fs::read(path).map_err(|e| ParserError::Io(path.to_path_buf(), e))?;
    // The file may have grown between stat and read
    if bytes.len() > max_file_size {
        return Err(ParserError::FileTooLarge(
            path.to_path_buf(),
            bytes.len() as u64,
            max_file_size,
        ));
    }

    let content_hash = content_hash(&bytes);
    let byte_len = bytes.len() as u64;
    let text = String::from_utf8(bytes).map_err(|e| ParserError::Encoding(path.to_path_buf(), e))?;

    Ok(LoadedSource {
        text,
        content_hash,
        byte_len,
    })
}
