//! Core graph types and operations.
//!
//! This module defines the fundamental building blocks:
//! - [`Entity`]: Indexed code constructs owned by a [`SourceUnit`]
//! - [`Edge`]: Directed relationships, resolved or dangling
//! - [`GraphStore`]: The store with its adjacency, name and dangling indexes

mod store;
mod types;
pub mod algorithms;

pub use store::{GraphStore, UnitDelta};
pub use types::{
    Direction, Edge, EdgeKey, EdgeKind, Entity, EntityId, EntityKind, KernelRole, Linkage, LockKind,
    Member, Parameter, Signature, SourceUnit, Span, UnitId, UnitState,
};
