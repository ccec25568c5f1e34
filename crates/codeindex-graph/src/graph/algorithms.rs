//! Graph traversal over resolved edges.

use crate::error::Result;
use crate::graph::{Direction, EdgeKind, EntityId, GraphStore};
use std::collections::{HashSet, VecDeque};

/// Breadth-First Search traversal from a starting entity.
///
/// Only resolved edges are followed; dangling edges have no target to step
/// onto.
///
/// # Parameters
/// - `store`: The graph to traverse
/// - `start`: Starting entity
/// - `direction`: Follow outgoing or incoming edges
/// - `kinds`: Edge kinds to follow (all when empty)
/// - `max_depth`: Optional maximum depth (None for unlimited)
///
/// # Returns
/// Reachable entity ids in visit order (excluding the start entity)
pub fn bfs(
    store: &GraphStore,
    start: &EntityId,
    direction: Direction,
    kinds: &[EdgeKind],
    max_depth: Option<usize>,
) -> Result<Vec<EntityId>> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    let mut result = Vec::new();

    visited.insert(start.clone());
    queue.push_back((start.clone(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }

        for neighbor in store.neighbors(&current, direction, kinds)? {
            if visited.insert(neighbor.clone()) {
                result.push(neighbor.clone());
                queue.push_back((neighbor, depth + 1));
            }
        }
    }

    Ok(result)
}

/// Everything `start` calls, directly or transitively.
pub fn transitive_callees(store: &GraphStore, start: &EntityId) -> Result<Vec<EntityId>> {
    bfs(store, start, Direction::Outgoing, &[EdgeKind::Calls], None)
}

/// Everything that calls `start`, directly or transitively.
pub fn transitive_callers(store: &GraphStore, start: &EntityId) -> Result<Vec<EntityId>> {
    bfs(store, start, Direction::Incoming, &[EdgeKind::Calls], None)
}
