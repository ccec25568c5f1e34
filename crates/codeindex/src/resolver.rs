//! Pass 2 of edge resolution: binding references to entities.
//!
//! The local pass runs on the worker that prepared the unit and needs only
//! the unit's own entities. The external pass runs under the graph write
//! lock, right before the unit's batch is applied.

use codeindex_graph::{Edge, Entity, GraphStore, UnitId};
use codeindex_parser_api::Reference;
use log::trace;
use std::collections::HashMap;

/// Resolves references against the entities of their own unit.
pub struct LocalResolver<'a> {
    by_name: HashMap<&'a str, Vec<&'a Entity>>,
}

impl<'a> LocalResolver<'a> {
    /// Index `entities` (one unit, extraction order) by lookup name.
    pub fn new(entities: &'a [Entity]) -> Self {
        let mut by_name: HashMap<&str, Vec<&Entity>> = HashMap::new();
        for entity in entities {
            by_name.entry(entity.lookup_name()).or_default().push(entity);
        }
        Self { by_name }
    }

    /// Turn references into edges, binding those the unit itself defines.
    ///
    /// The first matching definition in source order wins, so a call to a
    /// macro defined in both branches of an `#ifdef` binds to the first
    /// one. Calls through a slot with no candidate stay unresolved.
    pub fn resolve(&self, references: Vec<Reference>) -> Vec<Edge> {
        references
            .into_iter()
            .map(|reference| {
                let edge = reference.into_edge(None);
                match self.lookup(&edge) {
                    Some(target) => edge.with_target(target.id.clone()),
                    None => edge,
                }
            })
            .collect()
    }

    fn lookup(&self, edge: &Edge) -> Option<&'a Entity> {
        if !edge.is_reconcilable() {
            return None;
        }
        self.by_name
            .get(edge.lookup_name())?
            .iter()
            .copied()
            .find(|entity| edge.accepts(entity))
    }
}

/// Bind the still-unresolved edges of `unit` to exported entities of other
/// units. Returns the number of edges bound.
pub fn resolve_external(edges: &mut [Edge], store: &GraphStore, unit: &UnitId) -> usize {
    let mut bound = 0;
    for edge in edges
        .iter_mut()
        .filter(|e| !e.is_resolved() && e.is_reconcilable())
    {
        if let Some(target) = store.resolve_external(&edge.target_name, &edge.target_kinds, unit) {
            trace!("{} -> {} ({})", edge.source, target.id, edge.kind);
            edge.target = Some(target.id.clone());
            bound += 1;
        }
    }
    bound
}
