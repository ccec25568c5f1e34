//! Linux kernel macro recognition
//!
//! Kernel sources define syscalls and register functions through macros a
//! grammar without a preprocessor cannot see through. This pass finds them
//! in the raw text:
//! - `SYSCALL_DEFINEn` / `COMPAT_SYSCALL_DEFINEn` syscall definitions
//! - `module_init`, `module_exit` and `EXPORT_SYMBOL*` registrations
//! - `module_param` with its `MODULE_PARM_DESC`
//! - `DEFINE_SPINLOCK`, `DEFINE_MUTEX` and the other lock definitions
//!
//! Each recognized invocation is also reported as byte ranges to blank
//! before parsing, so the tree never mistakes it for a call or for an
//! implicit-int declaration. Lock definitions keep their macro name, which
//! then parses as the type of an ordinary declaration.

use crate::preprocessor::{argument_list_end, on_directive_line, CPreprocessor};
use codeindex_graph::{EdgeKind, EntityKind, LockKind, Span};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static RE_SYSCALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(COMPAT_)?SYSCALL_DEFINE([0-6])\s*\(").unwrap());

// module_init(fn), EXPORT_SYMBOL_GPL(sym), EXPORT_SYMBOL_NS(sym, ns)
static RE_REGISTRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(module_init|module_exit|EXPORT_SYMBOL(?:_GPL)?(?:_NS(?:_GPL)?)?)\s*\(\s*(\w+)\s*(?:,[^();]*)?\)",
    )
    .unwrap()
});

// module_param(name, type, perm)
static RE_MODULE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bmodule_param\s*\(\s*(\w+)\s*,\s*(\w+)\s*,\s*([^();]*?)\s*\)").unwrap()
});

// MODULE_PARM_DESC(name, "text")
static RE_PARM_DESC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bMODULE_PARM_DESC\s*\(\s*(\w+)\s*,\s*"((?:[^"\\]|\\.)*)"\s*\)"#).unwrap()
});

// DEFINE_SPINLOCK(name) -> DEFINE_SPINLOCK name
static RE_LOCK_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(DEFINE_(?:RAW_)?SPINLOCK|DEFINE_MUTEX|DEFINE_RWLOCK|DEFINE_SEMAPHORE)\s*\(\s*(\w+)\s*(?:,[^();]*)?\)",
    )
    .unwrap()
});

const LOCK_OPERATIONS: &[(&str, EdgeKind, LockKind)] = &[
    ("spin_lock", EdgeKind::Locks, LockKind::Spinlock),
    ("spin_lock_irq", EdgeKind::Locks, LockKind::Spinlock),
    ("spin_lock_irqsave", EdgeKind::Locks, LockKind::Spinlock),
    ("spin_lock_bh", EdgeKind::Locks, LockKind::Spinlock),
    ("raw_spin_lock", EdgeKind::Locks, LockKind::Spinlock),
    ("raw_spin_lock_irq", EdgeKind::Locks, LockKind::Spinlock),
    ("raw_spin_lock_irqsave", EdgeKind::Locks, LockKind::Spinlock),
    ("spin_unlock", EdgeKind::Unlocks, LockKind::Spinlock),
    ("spin_unlock_irq", EdgeKind::Unlocks, LockKind::Spinlock),
    ("spin_unlock_irqrestore", EdgeKind::Unlocks, LockKind::Spinlock),
    ("spin_unlock_bh", EdgeKind::Unlocks, LockKind::Spinlock),
    ("raw_spin_unlock", EdgeKind::Unlocks, LockKind::Spinlock),
    ("raw_spin_unlock_irq", EdgeKind::Unlocks, LockKind::Spinlock),
    ("raw_spin_unlock_irqrestore", EdgeKind::Unlocks, LockKind::Spinlock),
    ("spin_trylock", EdgeKind::TriesLock, LockKind::Spinlock),
    ("spin_trylock_irq", EdgeKind::TriesLock, LockKind::Spinlock),
    ("spin_trylock_irqsave", EdgeKind::TriesLock, LockKind::Spinlock),
    ("spin_trylock_bh", EdgeKind::TriesLock, LockKind::Spinlock),
    ("mutex_lock", EdgeKind::Locks, LockKind::Mutex),
    ("mutex_lock_interruptible", EdgeKind::Locks, LockKind::Mutex),
    ("mutex_lock_killable", EdgeKind::Locks, LockKind::Mutex),
    ("mutex_unlock", EdgeKind::Unlocks, LockKind::Mutex),
    ("mutex_trylock", EdgeKind::TriesLock, LockKind::Mutex),
    ("down", EdgeKind::Locks, LockKind::Semaphore),
    ("down_interruptible", EdgeKind::Locks, LockKind::Semaphore),
    ("down_killable", EdgeKind::Locks, LockKind::Semaphore),
    ("down_timeout", EdgeKind::Locks, LockKind::Semaphore),
    ("up", EdgeKind::Unlocks, LockKind::Semaphore),
    ("down_trylock", EdgeKind::TriesLock, LockKind::Semaphore),
    ("read_lock", EdgeKind::Locks, LockKind::RwLock),
    ("read_lock_irq", EdgeKind::Locks, LockKind::RwLock),
    ("read_lock_irqsave", EdgeKind::Locks, LockKind::RwLock),
    ("read_lock_bh", EdgeKind::Locks, LockKind::RwLock),
    ("write_lock", EdgeKind::Locks, LockKind::RwLock),
    ("write_lock_irq", EdgeKind::Locks, LockKind::RwLock),
    ("write_lock_irqsave", EdgeKind::Locks, LockKind::RwLock),
    ("write_lock_bh", EdgeKind::Locks, LockKind::RwLock),
    ("read_unlock", EdgeKind::Unlocks, LockKind::RwLock),
    ("read_unlock_irq", EdgeKind::Unlocks, LockKind::RwLock),
    ("read_unlock_irqrestore", EdgeKind::Unlocks, LockKind::RwLock),
    ("read_unlock_bh", EdgeKind::Unlocks, LockKind::RwLock),
    ("write_unlock", EdgeKind::Unlocks, LockKind::RwLock),
    ("write_unlock_irq", EdgeKind::Unlocks, LockKind::RwLock),
    ("write_unlock_irqrestore", EdgeKind::Unlocks, LockKind::RwLock),
    ("write_unlock_bh", EdgeKind::Unlocks, LockKind::RwLock),
    ("read_trylock", EdgeKind::TriesLock, LockKind::RwLock),
    ("write_trylock", EdgeKind::TriesLock, LockKind::RwLock),
];

/// Edge kind and lock kind of a kernel locking call (`spin_lock` ->
/// `Locks` a spinlock).
pub fn lock_operation(function: &str) -> Option<(EdgeKind, LockKind)> {
    LOCK_OPERATIONS
        .iter()
        .find(|(name, _, _)| *name == function)
        .map(|&(_, edge, lock)| (edge, lock))
}

/// Lock kind of an object declared with `type_text`.
pub fn lock_kind(type_text: &str) -> Option<LockKind> {
    match type_text {
        "spinlock_t" | "raw_spinlock_t" => Some(LockKind::Spinlock),
        "struct mutex" => Some(LockKind::Mutex),
        "struct semaphore" => Some(LockKind::Semaphore),
        "rwlock_t" => Some(LockKind::RwLock),
        _ => None,
    }
}

/// Type an object-defining lock macro expands to.
pub fn defined_type(macro_name: &str) -> Option<&'static str> {
    match macro_name {
        "DEFINE_SPINLOCK" => Some("spinlock_t"),
        "DEFINE_RAW_SPINLOCK" => Some("raw_spinlock_t"),
        "DEFINE_MUTEX" => Some("struct mutex"),
        "DEFINE_RWLOCK" => Some("rwlock_t"),
        "DEFINE_SEMAPHORE" => Some("struct semaphore"),
        _ => None,
    }
}

/// A `SYSCALL_DEFINEn(name, type, arg, ...)` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallDefinition {
    /// Syscall name as written (`read`)
    pub name: String,
    /// `COMPAT_SYSCALL_DEFINEn`
    pub compat: bool,
    /// The `n` of the macro
    pub param_count: usize,
    /// `(type, name)` pairs
    pub parameters: Vec<(String, String)>,
    /// The macro invocation
    pub header: Span,
    /// The `{ ... }` body following the header
    pub body: Option<Span>,
}

impl SyscallDefinition {
    /// Name of the function the macro defines: `sys_read`, `compat_sys_ioctl`.
    pub fn function_name(&self) -> String {
        if self.compat {
            format!("compat_sys_{}", self.name)
        } else {
            format!("sys_{}", self.name)
        }
    }

    /// Header and body.
    pub fn span(&self) -> Span {
        Span::new(self.header.start, self.body.map_or(self.header.end, |b| b.end))
    }
}

/// A `module_init`, `module_exit` or `EXPORT_SYMBOL*` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// `ModuleInit`, `ModuleExit` or `Exports`
    pub kind: EdgeKind,
    /// Registered function or exported symbol
    pub target: String,
    pub span: Span,
}

impl Registration {
    /// Entity kinds the registered name may resolve to.
    pub fn target_kinds(&self) -> Vec<EntityKind> {
        match self.kind {
            EdgeKind::Exports => vec![EntityKind::Function, EntityKind::GlobalVariable],
            _ => vec![EntityKind::Function],
        }
    }
}

/// A `module_param(name, type, perm)` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleParameter {
    pub name: String,
    pub param_type: String,
    pub permissions: String,
    /// Text of the matching `MODULE_PARM_DESC`
    pub description: Option<String>,
}

/// Kernel macros found in one unit.
#[derive(Debug, Clone, Default)]
pub struct KernelMacros {
    pub syscalls: Vec<SyscallDefinition>,
    pub registrations: Vec<Registration>,
    pub parameters: Vec<ModuleParameter>,
    blanked: Vec<(usize, usize)>,
}

impl KernelMacros {
    /// Find every kernel macro of `source` outside preprocessor directives.
    pub fn scan(source: &str) -> Self {
        let mut macros = Self::default();
        macros.scan_syscalls(source);
        macros.scan_registrations(source);
        macros.scan_parameters(source);
        macros.scan_lock_definitions(source);
        macros
    }

    /// Byte ranges to blank before parsing.
    pub fn blanked_ranges(&self) -> &[(usize, usize)] {
        &self.blanked
    }

    /// The `module_param` declaring `name`.
    pub fn parameter(&self, name: &str) -> Option<&ModuleParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The syscall whose body is exactly `span`.
    pub fn syscall_with_body(&self, span: Span) -> Option<&SyscallDefinition> {
        self.syscalls.iter().find(|s| s.body == Some(span))
    }

    fn scan_syscalls(&mut self, source: &str) {
        let annotations = CPreprocessor::new();
        for caps in RE_SYSCALL.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if on_directive_line(source, whole.start()) {
                continue;
            }
            let open = whole.end() - 1;
            let Some(close) = argument_list_end(source, open) else {
                continue;
            };
            let arguments: Vec<&str> = source[open + 1..close - 1].split(',').map(str::trim).collect();
            let Some((name, rest)) = arguments.split_first() else {
                continue;
            };
            if !is_identifier(name) {
                continue;
            }
            let parameters: Vec<(String, String)> = rest
                .chunks(2)
                .filter(|pair| pair.len() == 2)
                .map(|pair| {
                    let type_text = annotations.preprocess(pair[0]);
                    let type_text = type_text.split_whitespace().collect::<Vec<_>>().join(" ");
                    (type_text, pair[1].to_string())
                })
                .collect();
            let param_count = caps[2].parse().unwrap_or(parameters.len());

            self.blanked.push((whole.start(), close));
            self.syscalls.push(SyscallDefinition {
                name: name.to_string(),
                compat: caps.get(1).is_some(),
                param_count,
                parameters,
                header: Span::new(whole.start(), close),
                body: block_after(source, close),
            });
        }
    }

    fn scan_registrations(&mut self, source: &str) {
        for caps in RE_REGISTRATION.captures_iter(source) {
            let Some(span) = self.claim(source, &caps) else {
                continue;
            };
            let kind = match &caps[1] {
                "module_init" => EdgeKind::ModuleInit,
                "module_exit" => EdgeKind::ModuleExit,
                _ => EdgeKind::Exports,
            };
            self.registrations.push(Registration {
                kind,
                target: caps[2].to_string(),
                span,
            });
        }
    }

    fn scan_parameters(&mut self, source: &str) {
        for caps in RE_MODULE_PARAM.captures_iter(source) {
            if self.claim(source, &caps).is_none() {
                continue;
            }
            self.parameters.push(ModuleParameter {
                name: caps[1].to_string(),
                param_type: caps[2].to_string(),
                permissions: caps[3].to_string(),
                description: None,
            });
        }
        for caps in RE_PARM_DESC.captures_iter(source) {
            if self.claim(source, &caps).is_none() {
                continue;
            }
            if let Some(parameter) = self.parameters.iter_mut().find(|p| p.name == caps[1]) {
                parameter.description = Some(caps[2].to_string());
            }
        }
    }

    fn scan_lock_definitions(&mut self, source: &str) {
        for caps in RE_LOCK_DEFINE.captures_iter(source) {
            let (Some(whole), Some(macro_name), Some(object)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if on_directive_line(source, whole.start()) {
                continue;
            }
            self.blanked.push((macro_name.end(), object.start()));
            self.blanked.push((object.end(), whole.end()));
        }
    }

    /// Blank a whole invocation along with the `;` ending its statement.
    /// `None` inside a directive.
    fn claim(&mut self, source: &str, caps: &Captures) -> Option<Span> {
        let whole = caps.get(0)?;
        if on_directive_line(source, whole.start()) {
            return None;
        }
        let rest = &source[whole.end()..];
        let end = match rest.trim_start_matches([' ', '\t']).strip_prefix(';') {
            Some(after) => source.len() - after.len(),
            None => whole.end(),
        };
        self.blanked.push((whole.start(), end));
        Some(Span::new(whole.start(), whole.end()))
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Span of the `{ ... }` block starting at `from` (after optional
/// whitespace), skipping braces inside comments and literals.
fn block_after(source: &str, from: usize) -> Option<Span> {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'{') {
        return None;
    }

    let start = i;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(Span::new(start, i + 1));
                }
            }
            b'"' | b'\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}
