//! Core graph types: units, entities, edges, IDs, and enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a source unit: its path relative to the corpus root,
/// always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create a unit id, normalizing path separators to `/`.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.contains('\\') {
            Self(path.replace('\\', "/"))
        } else {
            Self(path)
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment (`"src/util.h"` -> `"util.h"`).
    pub fn file_name(&self) -> &str {
        base_name(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UnitId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Deterministic entity identifier: `"{unit}#{kind}:{name}"`.
///
/// The N-th (N >= 2) same-kind, same-name definition inside one unit gets a
/// `~N` suffix. Ids never depend on line numbers or byte offsets, so
/// whitespace and comment edits leave them untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Id of the first definition of `name` with `kind` in `unit`.
    pub fn new(unit: &UnitId, kind: EntityKind, name: &str) -> Self {
        Self(format!("{unit}#{}:{name}", kind.tag()))
    }

    /// Id of the `ordinal`-th definition (1-based) of `name` with `kind` in `unit`.
    pub fn with_ordinal(unit: &UnitId, kind: EntityKind, name: &str, ordinal: usize) -> Self {
        if ordinal <= 1 {
            Self::new(unit, kind, name)
        } else {
            Self(format!("{unit}#{}:{name}~{ordinal}", kind.tag()))
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of an indexed code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// The source unit itself (source of includes and file-scope references)
    File,
    /// Function definition
    Function,
    /// Struct definition with a body
    Struct,
    /// Union definition with a body
    Union,
    /// Enum definition with a body
    Enum,
    /// Type alias
    Typedef,
    /// Object-like or function-like macro
    Macro,
    /// File-scope variable
    GlobalVariable,
}

impl EntityKind {
    /// Short tag used inside entity ids.
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::File => "file",
            EntityKind::Function => "fn",
            EntityKind::Struct => "struct",
            EntityKind::Union => "union",
            EntityKind::Enum => "enum",
            EntityKind::Typedef => "typedef",
            EntityKind::Macro => "macro",
            EntityKind::GlobalVariable => "var",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::File => write!(f, "File"),
            EntityKind::Function => write!(f, "Function"),
            EntityKind::Struct => write!(f, "Struct"),
            EntityKind::Union => write!(f, "Union"),
            EntityKind::Enum => write!(f, "Enum"),
            EntityKind::Typedef => write!(f, "Typedef"),
            EntityKind::Macro => write!(f, "Macro"),
            EntityKind::GlobalVariable => write!(f, "GlobalVariable"),
        }
    }
}

/// Type of edge (relationship) between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Function (or file scope) calls a function, directly or through a pointer
    Calls,
    /// Entity mentions a struct, union, enum or typedef
    ReferencesType,
    /// File includes another file
    Includes,
    /// A function is stored into a function-pointer slot
    AssignsFunctionPointer,
    /// File registers a function with `module_init`
    ModuleInit,
    /// File registers a function with `module_exit`
    ModuleExit,
    /// File exports a symbol with `EXPORT_SYMBOL*`
    Exports,
    /// Function acquires a lock object
    Locks,
    /// Function releases a lock object
    Unlocks,
    /// Function attempts a lock object without blocking
    TriesLock,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Calls => write!(f, "Calls"),
            EdgeKind::ReferencesType => write!(f, "ReferencesType"),
            EdgeKind::Includes => write!(f, "Includes"),
            EdgeKind::AssignsFunctionPointer => write!(f, "AssignsFunctionPointer"),
            EdgeKind::ModuleInit => write!(f, "ModuleInit"),
            EdgeKind::ModuleExit => write!(f, "ModuleExit"),
            EdgeKind::Exports => write!(f, "Exports"),
            EdgeKind::Locks => write!(f, "Locks"),
            EdgeKind::Unlocks => write!(f, "Unlocks"),
            EdgeKind::TriesLock => write!(f, "TriesLock"),
        }
    }
}

/// Direction for neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Follow outgoing edges (from this entity)
    Outgoing,
    /// Follow incoming edges (to this entity)
    Incoming,
    /// Follow edges in both directions
    Both,
}

/// Linkage of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible to other units
    #[default]
    External,
    /// `static`: visible inside its own unit only
    Internal,
}

/// Byte range `[start, end)` into the unit's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    /// Create a span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True for a zero-length span.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name (empty for unnamed prototype parameters)
    pub name: String,
    /// Declared type text
    pub type_annotation: Option<String>,
    /// `...`
    pub is_variadic: bool,
}

impl Parameter {
    /// Create a named parameter without type information.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the declared type.
    pub fn with_type(mut self, type_annotation: impl Into<String>) -> Self {
        self.type_annotation = Some(type_annotation.into());
        self
    }

    /// The `...` pseudo-parameter.
    pub fn variadic() -> Self {
        Self {
            name: "...".to_string(),
            type_annotation: None,
            is_variadic: true,
        }
    }
}

/// Best-effort syntactic signature metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    /// Return type of a function
    pub return_type: Option<String>,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Function takes `...`
    pub is_variadic: bool,
    /// Declared type of a global, underlying type of a typedef, or
    /// replacement text of a macro
    pub type_annotation: Option<String>,
    /// The declared object is a function pointer
    pub is_function_pointer: bool,
    /// Storage class and type qualifiers (`static`, `inline`, `extern`, `const`)
    pub qualifiers: Vec<String>,
}

impl Signature {
    /// Set the return type.
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// Set the parameter list; the variadic flag follows the parameters.
    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.is_variadic = parameters.iter().any(|p| p.is_variadic);
        self.parameters = parameters;
        self
    }

    /// Set the declared or underlying type text.
    pub fn with_type(mut self, type_annotation: impl Into<String>) -> Self {
        self.type_annotation = Some(type_annotation.into());
        self
    }

    /// Mark as a function pointer.
    pub fn with_function_pointer(mut self, is_function_pointer: bool) -> Self {
        self.is_function_pointer = is_function_pointer;
        self
    }

    /// Add a qualifier.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        *self == Signature::default()
    }
}

/// A struct/union field or an enum constant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Member {
    /// Field or constant name
    pub name: String,
    /// Field type text (struct/union fields)
    pub type_annotation: Option<String>,
    /// Explicit value text (enum constants)
    pub value: Option<String>,
}

impl Member {
    /// A typed field.
    pub fn field(name: impl Into<String>, type_annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: Some(type_annotation.into()),
            value: None,
        }
    }

    /// An enum constant with an optional explicit value.
    pub fn constant(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            value,
        }
    }
}

/// Kind of a kernel synchronization object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockKind {
    /// `spinlock_t`, `raw_spinlock_t`
    Spinlock,
    /// `struct mutex`
    Mutex,
    /// `struct semaphore`
    Semaphore,
    /// `rwlock_t`
    RwLock,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Spinlock => write!(f, "spinlock"),
            LockKind::Mutex => write!(f, "mutex"),
            LockKind::Semaphore => write!(f, "semaphore"),
            LockKind::RwLock => write!(f, "rwlock"),
        }
    }
}

/// Role of an entity in Linux kernel code, recognized from kernel macros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelRole {
    /// Function defined with `SYSCALL_DEFINEn` or `COMPAT_SYSCALL_DEFINEn`
    Syscall {
        /// Syscall name without the `sys_` prefix
        name: String,
        /// The `n` of the defining macro
        param_count: usize,
        /// Defined with `COMPAT_SYSCALL_DEFINEn`
        compat: bool,
    },
    /// Global synchronization object
    Lock(LockKind),
    /// Global exposed with `module_param`
    ModuleParameter {
        /// Parameter type as written (`int`, `charp`, ...)
        param_type: String,
        /// sysfs permission text (`0644`, `S_IRUGO`, ...)
        permissions: String,
        /// Text of the matching `MODULE_PARM_DESC`
        description: Option<String>,
    },
}

/// A named, indexed code construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Deterministic identifier
    pub id: EntityId,
    /// Kind of construct
    pub kind: EntityKind,
    /// Declared name (the unit path for [`EntityKind::File`])
    pub name: String,
    /// Owning unit
    pub unit: UnitId,
    /// Byte range of the definition
    pub span: Span,
    /// 1-based first line
    pub line_start: usize,
    /// 1-based last line
    pub line_end: usize,
    /// External or internal (`static`) linkage
    pub linkage: Linkage,
    /// Signature metadata
    pub signature: Signature,
    /// Fields or enum constants
    pub members: Vec<Member>,
    /// Comment block directly above the definition
    pub doc_comment: Option<String>,
    /// Kernel role, for syscalls, lock objects and module parameters
    #[serde(default)]
    pub kernel_role: Option<KernelRole>,
}

impl Entity {
    /// Create an entity with the first-definition id for `(unit, kind, name)`.
    pub fn new(unit: UnitId, kind: EntityKind, name: impl Into<String>, span: Span) -> Self {
        let name = name.into();
        Self {
            id: EntityId::new(&unit, kind, &name),
            kind,
            name,
            unit,
            span,
            line_start: 0,
            line_end: 0,
            linkage: Linkage::External,
            signature: Signature::default(),
            members: Vec::new(),
            doc_comment: None,
            kernel_role: None,
        }
    }

    /// The File entity of `unit`, spanning `len` bytes over `lines` lines.
    pub fn file(unit: UnitId, len: usize, lines: usize) -> Self {
        let name = unit.as_str().to_string();
        Self::new(unit, EntityKind::File, name, Span::new(0, len)).with_lines(1, lines.max(1))
    }

    /// Override the id (used for `~N` duplicates).
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    /// Set the 1-based line range.
    pub fn with_lines(mut self, line_start: usize, line_end: usize) -> Self {
        self.line_start = line_start;
        self.line_end = line_end;
        self
    }

    /// Set the linkage.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Set the signature.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Set the members.
    pub fn with_members(mut self, members: Vec<Member>) -> Self {
        self.members = members;
        self
    }

    /// Set the doc comment.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }

    /// Set the kernel role.
    pub fn with_kernel_role(mut self, role: KernelRole) -> Self {
        self.kernel_role = Some(role);
        self
    }

    /// Key under which the entity is found in the name index. File entities
    /// are indexed by their base name so that `#include "util.h"` finds
    /// `src/util.h`.
    pub fn lookup_name(&self) -> &str {
        match self.kind {
            EntityKind::File => base_name(&self.name),
            _ => &self.name,
        }
    }

    /// True if a reference spelled `name` denotes this entity.
    pub fn answers_to(&self, name: &str) -> bool {
        match self.kind {
            EntityKind::File => {
                let path = self.name.as_str();
                let wanted = name.trim_start_matches("./");
                path == wanted
                    || (path.len() > wanted.len()
                        && path.ends_with(wanted)
                        && path.as_bytes()[path.len() - wanted.len() - 1] == b'/')
            }
            _ => self.name == name,
        }
    }

    /// True if other units may bind to this entity.
    pub fn is_exported(&self) -> bool {
        self.linkage == Linkage::External
    }
}

/// Key that identifies an edge: identical keys collapse into one edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    /// Source entity
    pub source: EntityId,
    /// Edge kind
    pub kind: EdgeKind,
    /// Target name as written at the site
    pub target_name: String,
    /// Site span
    pub span: Span,
}

/// A directed structural relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Type of relationship
    pub kind: EdgeKind,
    /// Source entity
    pub source: EntityId,
    /// Target name as written at the site (include path for includes)
    pub target_name: String,
    /// Resolved target, `None` while dangling
    pub target: Option<EntityId>,
    /// Entity kinds the target may have
    pub target_kinds: Vec<EntityKind>,
    /// Site span
    pub span: Span,
    /// Function-pointer slot the call went through
    pub via: Option<String>,
}

impl Edge {
    /// Create an unresolved edge.
    pub fn new(
        kind: EdgeKind,
        source: EntityId,
        target_name: impl Into<String>,
        target_kinds: Vec<EntityKind>,
        span: Span,
    ) -> Self {
        Self {
            kind,
            source,
            target_name: target_name.into(),
            target: None,
            target_kinds,
            span,
            via: None,
        }
    }

    /// Set the resolved target.
    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the function-pointer slot.
    pub fn with_via(mut self, via: impl Into<String>) -> Self {
        self.via = Some(via.into());
        self
    }

    /// The collapse key of this edge.
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            kind: self.kind,
            target_name: self.target_name.clone(),
            span: self.span,
        }
    }

    /// True once the target is bound to an entity.
    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    /// Name under which a dangling edge waits in the dangling index.
    pub fn lookup_name(&self) -> &str {
        match self.kind {
            EdgeKind::Includes => base_name(&self.target_name),
            _ => &self.target_name,
        }
    }

    /// False for a call through a slot with no known candidate: its target
    /// name is the slot itself and never denotes a definition.
    pub fn is_reconcilable(&self) -> bool {
        self.via.as_deref() != Some(self.target_name.as_str())
    }

    /// True if `entity` is an acceptable target for this edge.
    pub fn accepts(&self, entity: &Entity) -> bool {
        self.target_kinds.contains(&entity.kind) && entity.answers_to(&self.target_name)
    }
}

/// Lifecycle state of a source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitState {
    /// Discovered, never indexed
    #[default]
    Unindexed,
    /// Graph content matches the recorded content hash
    Indexed,
    /// Content changed; graph content may be out of date
    Stale,
    /// File deleted; content removed from the graph
    Removed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Unindexed => write!(f, "Unindexed"),
            UnitState::Indexed => write!(f, "Indexed"),
            UnitState::Stale => write!(f, "Stale"),
            UnitState::Removed => write!(f, "Removed"),
        }
    }
}

/// One source file tracked by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Relative, `/`-separated path
    pub id: UnitId,
    /// Absolute path on disk
    pub path: PathBuf,
    /// Language tag (`"c"`, ...)
    pub language: String,
    /// SHA-256 hex digest of the raw bytes last indexed
    pub content_hash: String,
    /// When the unit was last indexed
    pub last_indexed: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub state: UnitState,
}

impl SourceUnit {
    /// A freshly discovered, never indexed unit.
    pub fn new(id: UnitId, path: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            language: language.into(),
            content_hash: String::new(),
            last_indexed: None,
            state: UnitState::Unindexed,
        }
    }

    /// Set the content hash.
    pub fn with_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = content_hash.into();
        self
    }
}

pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
