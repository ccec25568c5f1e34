//! Language adapter registry
//!
//! Maps file extensions and language tags to the registered
//! [`LanguageParser`]s. Lookup order for a unit: explicit language hint,
//! file extension, then a modeline on the first line of the text.

use codeindex_c::CParser;
use codeindex_parser_api::{LanguageParser, ParserConfig, ParserError, ParserResult};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Registered language adapters, shared by every indexing worker.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn LanguageParser>>,
    by_extension: HashMap<String, usize>,
    by_language: HashMap<String, usize>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in adapter, configured with `config`.
    pub fn with_builtin(config: &ParserConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CParser::with_config(config.clone())));
        registry
    }

    /// Register an adapter. A later registration takes over the extensions
    /// and language tag of an earlier one.
    pub fn register(&mut self, parser: Arc<dyn LanguageParser>) {
        let index = self.parsers.len();
        let language = parser.language().to_lowercase();
        for ext in parser.file_extensions() {
            self.by_extension.insert(normalize_extension(ext), index);
        }
        debug!(
            "Registered {language} adapter for {:?}",
            parser.file_extensions()
        );
        self.by_language.insert(language, index);
        self.parsers.push(parser);
    }

    /// Adapter for a language tag (case-insensitive).
    pub fn for_language(&self, language: &str) -> Option<Arc<dyn LanguageParser>> {
        self.by_language
            .get(&language.to_lowercase())
            .map(|&i| Arc::clone(&self.parsers[i]))
    }

    /// Adapter for a path, by extension.
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn LanguageParser>> {
        let ext = path.extension()?.to_str()?;
        self.by_extension
            .get(&normalize_extension(ext))
            .map(|&i| Arc::clone(&self.parsers[i]))
    }

    /// True if some adapter claims the path's extension.
    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Registered language tags, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.by_language.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    /// Pick the adapter for a unit.
    ///
    /// `first_line` is consulted only when neither the hint nor the
    /// extension decide.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::UnsupportedLanguage`] when nothing matches.
    pub fn resolve(
        &self,
        path: &Path,
        hint: Option<&str>,
        first_line: Option<&str>,
    ) -> ParserResult<Arc<dyn LanguageParser>> {
        if let Some(hint) = hint {
            return self.for_language(hint).ok_or_else(|| {
                ParserError::UnsupportedLanguage(path.to_path_buf(), hint.to_string())
            });
        }
        if let Some(parser) = self.for_path(path) {
            return Ok(parser);
        }

        let sniffed = first_line.and_then(sniff_language);
        if let Some(parser) = sniffed.as_deref().and_then(|l| self.for_language(l)) {
            return Ok(parser);
        }

        let described = sniffed
            .or_else(|| {
                path.extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
            })
            .unwrap_or_else(|| "unknown".to_string());
        Err(ParserError::UnsupportedLanguage(path.to_path_buf(), described))
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Language named by a modeline: `// language: c`, `/* language: c */`
/// or an Emacs `-*- mode: C -*-` / `-*- C -*-` line.
pub fn sniff_language(line: &str) -> Option<String> {
    if let Some(at) = line.find("language:") {
        return leading_token(&line[at + "language:".len()..]);
    }

    let start = line.find("-*-")? + 3;
    let end = start + line[start..].find("-*-")?;
    let inner = &line[start..end];
    for setting in inner.split(';') {
        match setting.split_once(':') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("mode") => {
                return leading_token(value)
            }
            None => return leading_token(setting),
            Some(_) => {}
        }
    }
    None
}

fn leading_token(text: &str) -> Option<String> {
    let token: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '-'))
        .collect();
    let token = token.trim_end_matches('-');
    (!token.is_empty()).then(|| token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_knows_c() {
        let registry = ParserRegistry::with_builtin(&ParserConfig::default());
        assert_eq!(registry.languages(), vec!["c"]);
        assert!(registry.supports(Path::new("src/main.c")));
        assert!(registry.supports(Path::new("include/list.H")));
        assert!(!registry.supports(Path::new("main.rs")));
        assert!(!registry.supports(Path::new("Makefile")));
    }

    #[test]
    fn test_hint_wins_over_extension() {
        let registry = ParserRegistry::with_builtin(&ParserConfig::default());
        let parser = registry
            .resolve(Path::new("weird.inc"), Some("C"), None)
            .unwrap();
        assert_eq!(parser.language(), "c");

        let err = registry
            .resolve(Path::new("main.c"), Some("cobol"), None)
            .err()
            .unwrap();
        assert!(matches!(err, ParserError::UnsupportedLanguage(_, ref l) if l == "cobol"));
    }

    #[test]
    fn test_modeline_fallback() {
        let registry = ParserRegistry::with_builtin(&ParserConfig::default());
        assert!(registry
            .resolve(Path::new("table.inc"), None, Some("/* -*- mode: C; tab-width: 8 -*- */"))
            .is_ok());
        assert!(registry
            .resolve(Path::new("table.def"), None, Some("// language: c"))
            .is_ok());

        let err = registry
            .resolve(Path::new("notes.txt"), None, Some("just some notes"))
            .err()
            .unwrap();
        assert!(matches!(err, ParserError::UnsupportedLanguage(_, ref l) if l == ".txt"));
    }

    #[test]
    fn test_sniff_language_forms() {
        assert_eq!(sniff_language("// language: c").as_deref(), Some("c"));
        assert_eq!(sniff_language("/* language: C */").as_deref(), Some("c"));
        assert_eq!(sniff_language("# language: c++").as_deref(), Some("c++"));
        assert_eq!(sniff_language("/* -*- C -*- */").as_deref(), Some("c"));
        assert_eq!(
            sniff_language("/* -*- linux-c -*- */").as_deref(),
            Some("linux-c")
        );
        assert_eq!(
            sniff_language("-*- indent-tabs-mode: nil; mode: c -*-").as_deref(),
            Some("c")
        );
        assert_eq!(sniff_language("int main(void) {"), None);
        assert_eq!(sniff_language("-*- unterminated"), None);
    }
}
