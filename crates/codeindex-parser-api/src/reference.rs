//! Unresolved references: the output of pass 1 of edge resolution.

use codeindex_graph::{Edge, EdgeKind, EntityId, EntityKind, Span};
use serde::{Deserialize, Serialize};

/// Entity kinds a call may land on.
pub const CALLABLE_KINDS: &[EntityKind] = &[EntityKind::Function, EntityKind::Macro];

/// A syntactic mention of a name, not yet bound to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Innermost enclosing entity (or the File entity)
    pub source: EntityId,
    /// Edge kind the reference becomes
    pub kind: EdgeKind,
    /// Name as written (include path for includes)
    pub target_name: String,
    /// Entity kinds the name may resolve to
    pub candidate_kinds: Vec<EntityKind>,
    /// Site span
    pub span: Span,
    /// Function-pointer slot for indirect calls
    pub via: Option<String>,
}

impl Reference {
    /// A reference of arbitrary kind.
    pub fn new(
        source: EntityId,
        kind: EdgeKind,
        target_name: impl Into<String>,
        candidate_kinds: Vec<EntityKind>,
        span: Span,
    ) -> Self {
        Self {
            source,
            kind,
            target_name: target_name.into(),
            candidate_kinds,
            span,
            via: None,
        }
    }

    /// A direct call `name(...)`.
    pub fn call(source: EntityId, name: impl Into<String>, span: Span) -> Self {
        Self::new(source, EdgeKind::Calls, name, CALLABLE_KINDS.to_vec(), span)
    }

    /// A mention of a type.
    pub fn type_use(
        source: EntityId,
        name: impl Into<String>,
        kinds: Vec<EntityKind>,
        span: Span,
    ) -> Self {
        Self::new(source, EdgeKind::ReferencesType, name, kinds, span)
    }

    /// An `#include` of `path`.
    pub fn include(source: EntityId, path: impl Into<String>, span: Span) -> Self {
        Self::new(source, EdgeKind::Includes, path, vec![EntityKind::File], span)
    }

    /// A function stored into a function-pointer slot.
    pub fn pointer_assignment(
        source: EntityId,
        function: impl Into<String>,
        slot: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::new(
            source,
            EdgeKind::AssignsFunctionPointer,
            function,
            vec![EntityKind::Function],
            span,
        )
        .with_via(slot)
    }

    /// Set the function-pointer slot.
    pub fn with_via(mut self, via: impl Into<String>) -> Self {
        self.via = Some(via.into());
        self
    }

    /// Turn the reference into an edge, resolved or not.
    pub fn into_edge(self, target: Option<EntityId>) -> Edge {
        Edge {
            kind: self.kind,
            source: self.source,
            target_name: self.target_name,
            target,
            target_kinds: self.candidate_kinds,
            span: self.span,
            via: self.via,
        }
    }
}
