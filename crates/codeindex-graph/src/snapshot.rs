//! Serializable point-in-time copy of a [`GraphStore`].
//!
//! Snapshots use ordered maps so that two stores with the same content
//! serialize to byte-identical JSON.

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Entity, EntityId, GraphStore, SourceUnit, UnitId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full content of a graph store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Unit records
    pub units: BTreeMap<UnitId, SourceUnit>,
    /// All entities by id
    pub entities: BTreeMap<EntityId, Entity>,
    /// Outgoing edges per source, in site-span order
    pub edges: BTreeMap<EntityId, Vec<Edge>>,
    /// Entity ids per unit, in extraction order
    #[serde(default)]
    pub entity_order: BTreeMap<UnitId, Vec<EntityId>>,
}

impl GraphStore {
    /// Copy the store's content into a snapshot.
    pub fn snapshot(&self) -> GraphSnapshot {
        let entities = self
            .entities()
            .map(|e| (e.id.clone(), e.clone()))
            .collect();
        let edges = self
            .outgoing_map()
            .filter(|(_, edges)| !edges.is_empty())
            .map(|(id, edges)| (id.clone(), edges.into_iter().cloned().collect()))
            .collect();
        let entity_order = self
            .extraction_order()
            .map(|(unit, ids)| (unit.clone(), ids.clone()))
            .collect();

        GraphSnapshot {
            units: self.unit_records().clone(),
            entities,
            edges,
            entity_order,
        }
    }

    /// Rebuild a store, with all of its indexes, from a snapshot.
    ///
    /// Each unit's entities come back in their recorded extraction order.
    /// Entities the order does not list (snapshots written without one)
    /// follow in source order. Duplicate edge keys collapse to the first
    /// edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Internal`] if an entity belongs to a unit the
    /// snapshot does not list, the extraction order names an entity the
    /// snapshot lacks or places it in the wrong unit, or an edge's source
    /// entity is missing.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let GraphSnapshot {
            units,
            mut entities,
            edges,
            entity_order,
        } = snapshot;
        debug!(
            "Restoring snapshot: {} units, {} entities",
            units.len(),
            entities.len()
        );

        let mut store = GraphStore::new();
        for (_, unit) in units {
            store.insert_unit_record(unit);
        }

        for (unit, ids) in entity_order {
            for id in ids {
                let entity = entities.remove(&id).ok_or_else(|| {
                    GraphError::internal(format!("extraction order of {unit} names missing entity {id}"))
                })?;
                if entity.unit != unit {
                    return Err(GraphError::internal(format!(
                        "extraction order of {unit} lists entity {id} of unit {}",
                        entity.unit
                    )));
                }
                store.insert_checked(entity)?;
            }
        }

        let mut unlisted: Vec<Entity> = entities.into_values().collect();
        unlisted.sort_by(|a, b| (&a.unit, a.span.start, &a.id).cmp(&(&b.unit, b.span.start, &b.id)));
        for entity in unlisted {
            store.insert_checked(entity)?;
        }

        let mut duplicates = 0;
        for (source, mut list) in edges {
            if !store.contains_entity(&source) {
                return Err(GraphError::internal(format!(
                    "snapshot has edges for missing entity {source}"
                )));
            }
            list.sort_by_key(|e| e.span);
            for edge in list {
                if edge.source != source {
                    return Err(GraphError::internal(format!(
                        "edge listed under {source} has source {}",
                        edge.source
                    )));
                }
                if !store.insert_edge(edge) {
                    duplicates += 1;
                }
            }
        }
        if duplicates > 0 {
            warn!("Snapshot listed {duplicates} duplicate edges; kept the first of each");
        }

        Ok(store)
    }

    fn insert_checked(&mut self, entity: Entity) -> Result<()> {
        if self.unit(&entity.unit).is_none() {
            return Err(GraphError::internal(format!(
                "entity {} belongs to unknown unit {}",
                entity.id, entity.unit
            )));
        }
        self.insert_entity_ordered(entity);
        Ok(())
    }

    /// Serialize the store as a pretty-printed JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| GraphError::serialization("Failed to serialize snapshot", Some(e)))
    }

    /// Restore a store from JSON produced by [`GraphStore::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Serialization`] on malformed JSON and
    /// [`GraphError::Internal`] on an inconsistent snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)
            .map_err(|e| GraphError::serialization("Failed to parse snapshot", Some(e)))?;
        Self::from_snapshot(snapshot)
    }
}
