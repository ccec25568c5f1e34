//! The graph store: entity and edge tables plus the indexes kept over them.

use super::types::{
    base_name, Direction, Edge, EdgeKey, EdgeKind, Entity, EntityId, EntityKind, SourceUnit,
    UnitId, UnitState,
};
use crate::error::{GraphError, Result};
use chrono::Utc;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// What a single unit-level mutation changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDelta {
    /// The unit that was written or removed
    pub unit: UnitId,
    /// State of the unit after the mutation
    pub state: UnitState,
    /// Entities that did not exist before
    pub entities_added: usize,
    /// Entities that no longer exist
    pub entities_removed: usize,
    /// Entities whose content changed under the same id
    pub entities_modified: usize,
    /// Edges that did not exist before
    pub edges_added: usize,
    /// Edges that no longer exist
    pub edges_removed: usize,
    /// Edges whose target or slot changed under the same key
    pub edges_modified: usize,
    /// Edges of other units that lost their target and became dangling
    pub edges_demoted: usize,
}

impl UnitDelta {
    /// An empty delta for `unit`.
    pub fn new(unit: UnitId, state: UnitState) -> Self {
        Self {
            unit,
            state,
            entities_added: 0,
            entities_removed: 0,
            entities_modified: 0,
            edges_added: 0,
            edges_removed: 0,
            edges_modified: 0,
            edges_demoted: 0,
        }
    }

    /// True if the mutation changed no entity and no edge.
    pub fn is_empty(&self) -> bool {
        self.entities_added == 0
            && self.entities_removed == 0
            && self.entities_modified == 0
            && self.edges_added == 0
            && self.edges_removed == 0
            && self.edges_modified == 0
            && self.edges_demoted == 0
    }
}

/// In-memory structural code graph.
///
/// Every entity belongs to exactly one [`SourceUnit`]; a unit's entities and
/// edges are written as one batch by [`GraphStore::upsert`] and dropped as
/// one batch by [`GraphStore::remove_unit`]. Edge sources always exist;
/// edge targets may be unresolved, in which case the edge waits in the
/// dangling index under its target's lookup name.
#[derive(Debug, Default)]
pub struct GraphStore {
    units: BTreeMap<UnitId, SourceUnit>,
    entities: HashMap<EntityId, Entity>,
    // Extraction order per unit
    unit_entities: HashMap<UnitId, Vec<EntityId>>,
    edges: HashMap<EdgeKey, Edge>,
    // Outgoing keys per source, in site-span order
    adjacency_out: HashMap<EntityId, Vec<EdgeKey>>,
    adjacency_in: HashMap<EntityId, BTreeSet<EdgeKey>>,
    name_index: HashMap<String, BTreeSet<EntityId>>,
    dangling: HashMap<String, BTreeSet<EdgeKey>>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a unit record.
    pub fn unit(&self, unit: &UnitId) -> Option<&SourceUnit> {
        self.units.get(unit)
    }

    /// All unit records, ordered by unit id.
    pub fn units(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    /// Number of tracked units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Total number of entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Total number of edges, resolved or not.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges waiting for a target.
    pub fn dangling_count(&self) -> usize {
        self.dangling.values().map(BTreeSet::len).sum()
    }

    /// Get an entity by id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EntityNotFound`] if the entity doesn't exist.
    pub fn get_entity(&self, id: &EntityId) -> Result<&Entity> {
        self.entities.get(id).ok_or_else(|| GraphError::EntityNotFound {
            entity_id: id.to_string(),
        })
    }

    /// Iterate over all entities in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Outgoing edges of `id`, in site-span order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EntityNotFound`] if the entity doesn't exist.
    pub fn edges_from(&self, id: &EntityId) -> Result<Vec<&Edge>> {
        self.get_entity(id)?;
        Ok(self
            .adjacency_out
            .get(id)
            .map(|keys| keys.iter().filter_map(|k| self.edges.get(k)).collect())
            .unwrap_or_default())
    }

    /// Resolved edges pointing at `id`, ordered by edge key.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EntityNotFound`] if the entity doesn't exist.
    pub fn edges_to(&self, id: &EntityId) -> Result<Vec<&Edge>> {
        self.get_entity(id)?;
        Ok(self
            .adjacency_in
            .get(id)
            .map(|keys| keys.iter().filter_map(|k| self.edges.get(k)).collect())
            .unwrap_or_default())
    }

    /// Entities named exactly `name`, ordered by id. File entities match
    /// both their full path and their base name.
    pub fn find_by_name(&self, name: &str) -> Vec<&Entity> {
        self.name_index
            .get(base_name(name))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entities.get(id))
                    .filter(|e| e.name == name || e.lookup_name() == name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entities of `unit`, in extraction order.
    pub fn entities_in_unit(&self, unit: &UnitId) -> Vec<&Entity> {
        self.unit_entities
            .get(unit)
            .map(|ids| ids.iter().filter_map(|id| self.entities.get(id)).collect())
            .unwrap_or_default()
    }

    /// All unresolved edges, ordered by edge key.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let mut keys: Vec<&EdgeKey> = self.dangling.values().flatten().collect();
        keys.sort();
        keys.into_iter().filter_map(|k| self.edges.get(k)).collect()
    }

    /// Entities directly connected to `id` by resolved edges of the given
    /// kinds (all kinds when `kinds` is empty), ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EntityNotFound`] if the entity doesn't exist.
    pub fn neighbors(
        &self,
        id: &EntityId,
        direction: Direction,
        kinds: &[EdgeKind],
    ) -> Result<Vec<EntityId>> {
        let wanted = |edge: &&Edge| kinds.is_empty() || kinds.contains(&edge.kind);
        let mut neighbors = BTreeSet::new();

        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for edge in self.edges_from(id)?.into_iter().filter(wanted) {
                if let Some(target) = &edge.target {
                    neighbors.insert(target.clone());
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for edge in self.edges_to(id)?.into_iter().filter(wanted) {
                neighbors.insert(edge.source.clone());
            }
        }

        Ok(neighbors.into_iter().collect())
    }

    /// Best exported definition of `name` outside `exclude`: restricted to
    /// `kinds`, lowest entity id wins.
    pub fn resolve_external(
        &self,
        name: &str,
        kinds: &[EntityKind],
        exclude: &UnitId,
    ) -> Option<&Entity> {
        // BTreeSet iteration is id order, so the first hit is the lowest id.
        self.name_index
            .get(base_name(name))?
            .iter()
            .filter_map(|id| self.entities.get(id))
            .find(|e| {
                &e.unit != exclude
                    && e.is_exported()
                    && kinds.contains(&e.kind)
                    && e.answers_to(name)
            })
    }

    /// Flag a unit whose content changed and is about to be reparsed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnitNotFound`] if the unit is unknown.
    pub fn mark_stale(&mut self, unit: &UnitId) -> Result<()> {
        let record = self
            .units
            .get_mut(unit)
            .ok_or_else(|| GraphError::UnitNotFound {
                unit: unit.to_string(),
            })?;
        trace!("Unit {unit}: {} -> Stale", record.state);
        record.state = UnitState::Stale;
        Ok(())
    }

    /// Replace everything the graph holds for `unit` with a new batch.
    ///
    /// Either the whole batch is applied or nothing is: the batch is
    /// validated first (every entity owned by the unit, unique ids, no id
    /// owned by another unit, every edge source in the batch). The
    /// difference against the previous content is then applied; unchanged
    /// entities keep their incoming edges, removed entities leave incoming
    /// edges from other units dangling, and resolved targets that no longer
    /// exist are demoted to unresolved. Edges with identical keys collapse
    /// to the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Internal`] if the batch is invalid; the store
    /// is left untouched.
    pub fn upsert(
        &mut self,
        mut unit: SourceUnit,
        entities: Vec<Entity>,
        edges: Vec<Edge>,
    ) -> Result<UnitDelta> {
        self.validate_batch(&unit.id, &entities, &edges)?;
        let unit_id = unit.id.clone();
        debug!(
            "Upserting unit {unit_id}: {} entities, {} edges",
            entities.len(),
            edges.len()
        );

        let new_ids: HashSet<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
        let edges = self.normalize_edges(&unit_id, &new_ids, edges);

        let old_ids = self.unit_entities.get(&unit_id).cloned().unwrap_or_default();
        let old_edge_keys: Vec<EdgeKey> = old_ids
            .iter()
            .filter_map(|id| self.adjacency_out.get(id))
            .flatten()
            .cloned()
            .collect();

        let mut delta = UnitDelta::new(unit_id.clone(), UnitState::Indexed);
        for entity in &entities {
            match self.entities.get(&entity.id) {
                None => delta.entities_added += 1,
                Some(old) if old != entity => delta.entities_modified += 1,
                Some(_) => {}
            }
        }
        delta.entities_removed = old_ids.iter().filter(|id| !new_ids.contains(*id)).count();
        {
            let incoming: HashMap<EdgeKey, &Edge> = edges.iter().map(|e| (e.key(), e)).collect();
            for key in &old_edge_keys {
                match incoming.get(key) {
                    None => delta.edges_removed += 1,
                    Some(new) if self.edges.get(key) != Some(*new) => delta.edges_modified += 1,
                    Some(_) => {}
                }
            }
            let previous: HashSet<&EdgeKey> = old_edge_keys.iter().collect();
            delta.edges_added = incoming.keys().filter(|k| !previous.contains(k)).count();
        }

        for key in &old_edge_keys {
            self.detach_edge(key);
        }
        for id in &old_ids {
            self.adjacency_out.remove(id);
        }
        for id in old_ids.iter().filter(|id| !new_ids.contains(*id)) {
            delta.edges_demoted += self.drop_entity(id);
        }

        let order: Vec<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
        for entity in entities {
            self.put_entity(entity);
        }
        self.unit_entities.insert(unit_id.clone(), order);
        for edge in edges {
            self.attach_edge(edge);
        }

        unit.state = UnitState::Indexed;
        if unit.last_indexed.is_none() {
            unit.last_indexed = Some(Utc::now());
        }
        self.units.insert(unit_id.clone(), unit);

        trace!("Unit {unit_id} upserted: {delta:?}");
        Ok(delta)
    }

    /// Delete a unit with its entities and outgoing edges. Edges from other
    /// units into the removed entities stay, unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnitNotFound`] if the unit is unknown.
    pub fn remove_unit(&mut self, unit: &UnitId) -> Result<UnitDelta> {
        self.units
            .remove(unit)
            .ok_or_else(|| GraphError::UnitNotFound {
                unit: unit.to_string(),
            })?;
        let ids = self.unit_entities.remove(unit).unwrap_or_default();

        let mut delta = UnitDelta::new(unit.clone(), UnitState::Removed);
        for id in &ids {
            for key in self.adjacency_out.remove(id).unwrap_or_default() {
                if self.detach_edge(&key).is_some() {
                    delta.edges_removed += 1;
                }
            }
        }
        for id in &ids {
            delta.edges_demoted += self.drop_entity(id);
            delta.entities_removed += 1;
        }

        info!(
            "Removed unit {unit}: {} entities, {} edges, {} edges left dangling",
            delta.entities_removed, delta.edges_removed, delta.edges_demoted
        );
        Ok(delta)
    }

    /// Bind dangling edges of other units to the exported entities of
    /// `unit`, using the same rule as cross-unit resolution (candidate
    /// kinds, external linkage, lowest id). Returns the number of edges
    /// bound.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnitNotFound`] if the unit is unknown.
    pub fn reconcile(&mut self, unit: &UnitId) -> Result<usize> {
        let ids = self
            .unit_entities
            .get(unit)
            .cloned()
            .ok_or_else(|| GraphError::UnitNotFound {
                unit: unit.to_string(),
            })?;

        let mut bound = 0;
        for id in ids {
            let bindings = match self.entities.get(&id) {
                Some(entity) if entity.is_exported() => self.pending_bindings(entity, unit),
                _ => continue,
            };
            for (key, target) in bindings {
                self.bind(&key, target);
                bound += 1;
            }
        }

        if bound > 0 {
            debug!("Reconciled {bound} dangling edges against unit {unit}");
        }
        Ok(bound)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn insert_unit_record(&mut self, unit: SourceUnit) {
        self.units.insert(unit.id.clone(), unit);
    }

    pub(crate) fn insert_entity_ordered(&mut self, entity: Entity) {
        self.unit_entities
            .entry(entity.unit.clone())
            .or_default()
            .push(entity.id.clone());
        self.put_entity(entity);
    }

    /// Attach a restored edge. A key the store already holds keeps its
    /// first edge; returns false for the dropped duplicate.
    pub(crate) fn insert_edge(&mut self, mut edge: Edge) -> bool {
        if self.edges.contains_key(&edge.key()) {
            trace!("Skipping duplicate edge {} -> {}", edge.source, edge.target_name);
            return false;
        }
        if let Some(target) = &edge.target {
            if !self.entities.contains_key(target) {
                edge.target = None;
            }
        }
        self.attach_edge(edge);
        true
    }

    pub(crate) fn contains_entity(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub(crate) fn outgoing_map(&self) -> impl Iterator<Item = (&EntityId, Vec<&Edge>)> {
        self.adjacency_out
            .iter()
            .map(|(id, keys)| (id, keys.iter().filter_map(|k| self.edges.get(k)).collect()))
    }

    pub(crate) fn unit_records(&self) -> &BTreeMap<UnitId, SourceUnit> {
        &self.units
    }

    pub(crate) fn extraction_order(&self) -> impl Iterator<Item = (&UnitId, &Vec<EntityId>)> {
        self.unit_entities.iter()
    }

    fn validate_batch(&self, unit: &UnitId, entities: &[Entity], edges: &[Edge]) -> Result<()> {
        let mut seen: HashSet<&EntityId> = HashSet::with_capacity(entities.len());
        for entity in entities {
            if &entity.unit != unit {
                return Err(GraphError::internal(format!(
                    "entity {} belongs to unit {}, not {unit}",
                    entity.id, entity.unit
                )));
            }
            if !seen.insert(&entity.id) {
                return Err(GraphError::internal(format!(
                    "duplicate entity id {} in batch for {unit}",
                    entity.id
                )));
            }
            if let Some(existing) = self.entities.get(&entity.id) {
                if &existing.unit != unit {
                    return Err(GraphError::internal(format!(
                        "entity id {} is already owned by unit {}",
                        entity.id, existing.unit
                    )));
                }
            }
        }
        for edge in edges {
            if !seen.contains(&edge.source) {
                return Err(GraphError::internal(format!(
                    "{} edge to '{}' has source {} outside the batch for {unit}",
                    edge.kind, edge.target_name, edge.source
                )));
            }
        }
        Ok(())
    }

    fn normalize_edges(
        &self,
        unit: &UnitId,
        new_ids: &HashSet<EntityId>,
        edges: Vec<Edge>,
    ) -> Vec<Edge> {
        let mut seen = HashSet::with_capacity(edges.len());
        let mut kept = Vec::with_capacity(edges.len());
        for mut edge in edges {
            if !seen.insert(edge.key()) {
                continue;
            }
            if let Some(target) = &edge.target {
                let exists = new_ids.contains(target)
                    || self.entities.get(target).is_some_and(|e| &e.unit != unit);
                if !exists {
                    trace!("Demoting edge to missing target {target}");
                    edge.target = None;
                }
            }
            kept.push(edge);
        }
        kept.sort_by_key(|e| e.span);
        kept
    }

    fn put_entity(&mut self, entity: Entity) {
        if let Some(old) = self.entities.get(&entity.id) {
            let old_key = old.lookup_name().to_string();
            self.unindex_name(&old_key, &entity.id);
        }
        self.name_index
            .entry(entity.lookup_name().to_string())
            .or_default()
            .insert(entity.id.clone());
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Remove an entity record; incoming edges become dangling. Returns the
    /// number of edges demoted.
    fn drop_entity(&mut self, id: &EntityId) -> usize {
        let Some(entity) = self.entities.remove(id) else {
            return 0;
        };
        self.unindex_name(entity.lookup_name(), id);

        let incoming = self.adjacency_in.remove(id).unwrap_or_default();
        let demoted = incoming.len();
        for key in incoming {
            if let Some(edge) = self.edges.get_mut(&key) {
                edge.target = None;
                self.dangling
                    .entry(edge.lookup_name().to_string())
                    .or_default()
                    .insert(key);
            }
        }
        demoted
    }

    fn unindex_name(&mut self, name: &str, id: &EntityId) {
        if let Some(ids) = self.name_index.get_mut(name) {
            ids.remove(id);
            if ids.is_empty() {
                self.name_index.remove(name);
            }
        }
    }

    /// Remove an edge from the edge table and the target-side indexes. The
    /// caller owns `adjacency_out`.
    fn detach_edge(&mut self, key: &EdgeKey) -> Option<Edge> {
        let edge = self.edges.remove(key)?;
        match &edge.target {
            Some(target) => {
                if let Some(keys) = self.adjacency_in.get_mut(target) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.adjacency_in.remove(target);
                    }
                }
            }
            None => self.undangle(edge.lookup_name(), key),
        }
        Some(edge)
    }

    fn attach_edge(&mut self, edge: Edge) {
        let key = edge.key();
        match &edge.target {
            Some(target) => {
                self.adjacency_in
                    .entry(target.clone())
                    .or_default()
                    .insert(key.clone());
            }
            None => {
                self.dangling
                    .entry(edge.lookup_name().to_string())
                    .or_default()
                    .insert(key.clone());
            }
        }
        self.adjacency_out
            .entry(edge.source.clone())
            .or_default()
            .push(key.clone());
        self.edges.insert(key, edge);
    }

    fn undangle(&mut self, name: &str, key: &EdgeKey) {
        if let Some(keys) = self.dangling.get_mut(name) {
            keys.remove(key);
            if keys.is_empty() {
                self.dangling.remove(name);
            }
        }
    }

    fn pending_bindings(&self, entity: &Entity, unit: &UnitId) -> Vec<(EdgeKey, EntityId)> {
        let Some(waiting) = self.dangling.get(entity.lookup_name()) else {
            return Vec::new();
        };
        waiting
            .iter()
            .filter_map(|key| {
                let edge = self.edges.get(key)?;
                if !edge.is_reconcilable() || !edge.accepts(entity) {
                    return None;
                }
                let source_unit = &self.entities.get(&edge.source)?.unit;
                if source_unit == unit {
                    return None;
                }
                let target =
                    self.resolve_external(&edge.target_name, &edge.target_kinds, source_unit)?;
                Some((key.clone(), target.id.clone()))
            })
            .collect()
    }

    fn bind(&mut self, key: &EdgeKey, target: EntityId) {
        let Some(edge) = self.edges.get_mut(key) else {
            return;
        };
        let lookup = edge.lookup_name().to_string();
        edge.target = Some(target.clone());
        self.undangle(&lookup, key);
        self.adjacency_in
            .entry(target)
            .or_default()
            .insert(key.clone());
    }
}
