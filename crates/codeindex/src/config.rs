use crate::error::{IndexError, Result};
use codeindex_parser_api::ParserConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for the incremental indexer
///
/// Loadable from TOML; every key is optional:
///
/// ```toml
/// parallel = true
/// parallel_workers = 4
/// ignore_dirs = [".git", "build"]
///
/// [parser]
/// include_docs = false
/// max_file_size = 1048576
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Prepare units on a worker pool
    pub parallel: bool,

    /// Number of worker threads (None = rayon's default)
    pub parallel_workers: Option<usize>,

    /// List files without a registered adapter in the report
    pub report_unsupported: bool,

    /// Directory names skipped by root scans (`*` matches any substring)
    pub ignore_dirs: Vec<String>,

    /// Adapter behavior, including the file size ceiling
    pub parser: ParserConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_workers: None,
            report_unsupported: false,
            ignore_dirs: vec![
                ".git".to_string(),
                ".svn".to_string(),
                ".hg".to_string(),
                ".cache".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
                "*.egg-info".to_string(),
            ],
            parser: ParserConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| IndexError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the file cannot be read and
    /// [`IndexError::Config`] if it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IndexError::config(e.to_string()))
    }

    /// Serial preparation, for deterministic debugging
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    /// Set the adapter configuration
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    /// Enable or disable the worker pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = Some(workers);
        self
    }

    /// Report files without an adapter
    pub fn with_report_unsupported(mut self, report: bool) -> Self {
        self.report_unsupported = report;
        self
    }

    /// Set the file size ceiling
    pub fn with_max_file_size(mut self, size: usize) -> Self {
        self.parser.max_file_size = size;
        self
    }

    /// Add a directory name to skip
    pub fn with_ignore_dir(mut self, name: impl Into<String>) -> Self {
        self.ignore_dirs.push(name.into());
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.parallel_workers == Some(0) {
            return Err(IndexError::config("parallel_workers must be greater than 0"));
        }
        if self.parser.max_file_size == 0 {
            return Err(IndexError::config("max_file_size must be greater than 0"));
        }
        Ok(())
    }

    /// Check if a directory should be skipped
    pub fn should_ignore_dir(&self, dir_name: &str) -> bool {
        self.ignore_dirs.iter().any(|ignored| {
            if ignored.contains('*') {
                let pattern = ignored.replace('*', "");
                dir_name.contains(&pattern)
            } else {
                dir_name == ignored
            }
        })
    }
}
