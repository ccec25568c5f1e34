//! # codeindex-graph
//!
//! In-memory structural code graph: entities (functions, types, macros,
//! globals, files) owned by source units, and the calls, type references,
//! includes and function-pointer assignments between them.
//!
//! ## Core Principles
//!
//! - **Unit-transactional**: a unit's entities and edges are written,
//!   replaced and removed as one batch
//! - **Stable ids**: entity ids derive from unit, kind and name, never from
//!   positions
//! - **Dangling-tolerant**: edges whose target is not (yet) known are kept
//!   and bound later by [`GraphStore::reconcile`]
//! - **Zero Magic**: no parsing or file access; callers bring the batches
//!
//! ## Example
//!
//! ```rust
//! use codeindex_graph::{Edge, EdgeKind, Entity, EntityKind, GraphStore, SourceUnit, Span, UnitId};
//!
//! let unit = UnitId::new("main.c");
//! let main = Entity::new(unit.clone(), EntityKind::Function, "main", Span::new(0, 40));
//! let call = Edge::new(EdgeKind::Calls, main.id.clone(), "puts", vec![EntityKind::Function], Span::new(14, 18));
//!
//! let mut store = GraphStore::new();
//! store.upsert(SourceUnit::new(unit, "main.c", "c"), vec![main], vec![call]).unwrap();
//! assert_eq!(store.dangling_edges().len(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod export;
pub mod graph;
pub mod snapshot;

// Re-export main types
pub use error::{GraphError, Result};
pub use graph::{
    Direction, Edge, EdgeKey, EdgeKind, Entity, EntityId, EntityKind, GraphStore, KernelRole,
    Linkage, LockKind, Member, Parameter, Signature, SourceUnit, Span, UnitDelta, UnitId,
    UnitState,
};
pub use snapshot::GraphSnapshot;
