//! Annotation blanking for kernel-style C
//!
//! tree-sitter-c has no preprocessor, so compiler and sparse annotations
//! such as `__init`, `__user` or `__attribute__((packed))` derail the parse
//! of otherwise ordinary declarations. This layer overwrites them with
//! spaces before parsing. It never inserts or deletes bytes: every offset,
//! line and column in the blanked text is the same as in the original, so
//! spans computed on the parse tree point into the original file.
//!
//! Preprocessor directive lines are left alone (`#define __init ...` must
//! still parse as a macro definition).

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Annotations that are a bare identifier.
const PLAIN_ANNOTATIONS: &[&str] = &[
    // Section/init attributes
    "__init",
    "__exit",
    "__initdata",
    "__exitdata",
    "__initconst",
    "__devinit",
    "__devexit",
    // Compiler hints
    "__cold",
    "__hot",
    "__pure",
    "__noreturn",
    "__malloc",
    "__weak",
    "__always_inline",
    "__noinline",
    "noinline",
    "__visible",
    "__flatten",
    "__must_check",
    // Address space annotations
    "__user",
    "__kernel",
    "__iomem",
    "__percpu",
    "__rcu",
    "__force",
    "__bitwise",
    "__safe",
    // Unused/maybe annotations
    "__maybe_unused",
    "__always_unused",
    "__unused",
    // Packing and alignment
    "__packed",
    "__cacheline_aligned",
    "__cacheline_aligned_in_smp",
    "__page_aligned_data",
    "__page_aligned_bss",
    // Deprecation
    "__deprecated",
    // Memory placement
    "__read_mostly",
    "__ro_after_init",
    // Calling conventions
    "asmlinkage",
    "fastcall",
];

/// Annotations that take a parenthesized argument list.
const CALL_ANNOTATIONS: &[&str] = &[
    "__attribute__",
    "__attribute",
    "__declspec",
    "__section",
    "__aligned",
    "__alias",
    "__printf",
    "__scanf",
    "__must_hold",
    "__acquires",
    "__releases",
    "regparm",
];

static RE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = PLAIN_ANNOTATIONS
        .iter()
        .chain(CALL_ANNOTATIONS)
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).unwrap()
});

/// Length-preserving annotation blanker
pub struct CPreprocessor {
    call_like: HashSet<&'static str>,
}

impl Default for CPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CPreprocessor {
    pub fn new() -> Self {
        Self {
            call_like: CALL_ANNOTATIONS.iter().copied().collect(),
        }
    }

    /// Check if an identifier is a known annotation
    pub fn is_annotation(&self, name: &str) -> bool {
        PLAIN_ANNOTATIONS.contains(&name) || self.call_like.contains(name)
    }

    /// Blank every annotation (with its argument list, when it takes one).
    /// The result has exactly the byte length and line structure of `source`.
    pub fn preprocess(&self, source: &str) -> String {
        blank(source, self.annotation_ranges(source))
    }

    /// Byte ranges of the annotations in `source`, in order.
    pub fn annotation_ranges(&self, source: &str) -> Vec<(usize, usize)> {
        let mut ranges: Vec<(usize, usize)> = Vec::new();

        for m in RE_ANNOTATION.find_iter(source) {
            if ranges.last().is_some_and(|&(_, end)| m.start() < end) {
                continue;
            }
            if on_directive_line(source, m.start()) {
                continue;
            }
            let mut end = m.end();
            if self.call_like.contains(m.as_str()) {
                if let Some(close) = argument_list_end(source, m.end()) {
                    end = close;
                }
            }
            ranges.push((m.start(), end));
        }
        ranges
    }
}

/// Overwrite the byte ranges of `source` with spaces, keeping line breaks.
/// Ranges may come in any order and may overlap.
pub fn blank(source: &str, mut ranges: Vec<(usize, usize)>) -> String {
    if ranges.is_empty() {
        return source.to_string();
    }
    ranges.sort_unstable();

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for (start, end) in ranges {
        let start = start.max(last);
        let end = end.min(source.len());
        if start >= end {
            continue;
        }
        out.push_str(&source[last..start]);
        for ch in source[start..end].chars() {
            if ch == '\n' || ch == '\r' {
                out.push(ch);
            } else {
                out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
            }
        }
        last = end;
    }
    out.push_str(&source[last..]);
    out
}

pub(crate) fn on_directive_line(source: &str, offset: usize) -> bool {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..offset].trim_start().starts_with('#')
}

/// Byte offset just past the `)` closing an argument list that starts at
/// `from` (after optional whitespace). `None` if there is no list or it is
/// unbalanced.
pub(crate) fn argument_list_end(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_recognition() {
        let pp = CPreprocessor::new();
        assert!(pp.is_annotation("__init"));
        assert!(pp.is_annotation("__user"));
        assert!(pp.is_annotation("__attribute__"));
        assert!(!pp.is_annotation("regular_function"));
        assert!(!pp.is_annotation("inline"));
    }

    #[test]
    fn test_preprocess_strips_plain_annotations() {
        let pp = CPreprocessor::new();
        let source = "static __init int my_init(void) { return 0; }";
        let processed = pp.preprocess(source);
        assert_eq!(processed.len(), source.len());
        assert!(!processed.contains("__init"));
        assert_eq!(processed, "static        int my_init(void) { return 0; }");
    }

    #[test]
    fn test_preprocess_blanks_attribute_argument_lists() {
        let pp = CPreprocessor::new();
        let source = "struct s { int a; } __attribute__((packed, aligned(4)));";
        let processed = pp.preprocess(source);
        assert_eq!(processed.len(), source.len());
        assert!(!processed.contains("__attribute__"));
        assert!(!processed.contains("packed"));
        assert!(processed.ends_with(';'));
        assert!(processed.starts_with("struct s { int a; }"));
    }

    #[test]
    fn test_preprocess_keeps_identifiers_containing_annotations() {
        let pp = CPreprocessor::new();
        let source = "int __init_done; int my__user;";
        assert_eq!(pp.preprocess(source), source);
    }

    #[test]
    fn test_preprocess_preserves_lines_and_multibyte_text() {
        let pp = CPreprocessor::new();
        let source = "void f(void) __section(\"é\n\")\n{ }\n";
        let processed = pp.preprocess(source);
        assert_eq!(processed.len(), source.len());
        assert_eq!(processed.lines().count(), source.lines().count());
        assert!(processed.starts_with("void f(void) "));
        assert!(processed.ends_with("\n{ }\n"));
    }

    #[test]
    fn test_preprocess_leaves_directives_alone() {
        let pp = CPreprocessor::new();
        let source = "#define __init __section(\".init.text\")\n#include <linux/init.h>\n";
        assert_eq!(pp.preprocess(source), source);
    }

    #[test]
    fn test_blank_merges_overlapping_ranges() {
        let source = "abc\ndef ghi";
        let blanked = blank(source, vec![(5, 9), (2, 6), (0, 1)]);
        assert_eq!(blanked, " b \n     hi");
    }

    #[test]
    fn test_unbalanced_attribute_only_blanks_keyword() {
        let pp = CPreprocessor::new();
        let source = "int x __attribute__((broken";
        let processed = pp.preprocess(source);
        assert_eq!(processed.len(), source.len());
        assert!(processed.ends_with("((broken"));
    }
}
