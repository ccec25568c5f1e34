//! DOT format export for Graphviz visualization.
//!
//! Generates Graphviz DOT for rendering the call/type graph as an image.

use crate::graph::{EdgeKind, EntityKind, GraphStore};
use std::collections::{BTreeSet, HashMap};

/// Options for styling DOT export
#[derive(Debug, Clone)]
pub struct DotOptions {
    /// Entity colors by kind (hex color codes)
    pub entity_colors: HashMap<EntityKind, String>,
    /// Edge colors by kind (hex color codes)
    pub edge_colors: HashMap<EdgeKind, String>,
    /// Entity shapes by kind (box, ellipse, folder, etc.)
    pub entity_shapes: HashMap<EntityKind, String>,
    /// Graph layout direction: LR, TB, RL, BT
    pub rankdir: String,
    /// Draw unresolved edges to placeholder nodes
    pub show_unresolved: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        let mut entity_colors = HashMap::new();
        entity_colors.insert(EntityKind::File, "#E0E0E0".to_string());
        entity_colors.insert(EntityKind::Function, "#90CAF9".to_string());
        entity_colors.insert(EntityKind::Struct, "#FFE082".to_string());
        entity_colors.insert(EntityKind::Union, "#FFE082".to_string());
        entity_colors.insert(EntityKind::Enum, "#FFAB91".to_string());
        entity_colors.insert(EntityKind::Typedef, "#C5E1A5".to_string());
        entity_colors.insert(EntityKind::Macro, "#BCAAA4".to_string());
        entity_colors.insert(EntityKind::GlobalVariable, "#CE93D8".to_string());

        let mut entity_shapes = HashMap::new();
        entity_shapes.insert(EntityKind::File, "folder".to_string());
        entity_shapes.insert(EntityKind::Function, "box".to_string());
        entity_shapes.insert(EntityKind::Struct, "component".to_string());
        entity_shapes.insert(EntityKind::Union, "component".to_string());
        entity_shapes.insert(EntityKind::GlobalVariable, "ellipse".to_string());

        let mut edge_colors = HashMap::new();
        edge_colors.insert(EdgeKind::AssignsFunctionPointer, "#7E57C2".to_string());
        edge_colors.insert(EdgeKind::Includes, "#9E9E9E".to_string());
        edge_colors.insert(EdgeKind::ModuleInit, "#43A047".to_string());
        edge_colors.insert(EdgeKind::ModuleExit, "#E53935".to_string());
        edge_colors.insert(EdgeKind::Exports, "#1E88E5".to_string());
        edge_colors.insert(EdgeKind::Locks, "#FB8C00".to_string());
        edge_colors.insert(EdgeKind::Unlocks, "#FB8C00".to_string());
        edge_colors.insert(EdgeKind::TriesLock, "#FFB74D".to_string());

        DotOptions {
            entity_colors,
            edge_colors,
            entity_shapes,
            rankdir: "LR".to_string(),
            show_unresolved: false,
        }
    }
}

/// Export the graph to Graphviz DOT format
pub fn export_dot(store: &GraphStore) -> String {
    export_dot_styled(store, &DotOptions::default())
}

/// Export the graph to Graphviz DOT format with custom styling
pub fn export_dot_styled(store: &GraphStore, options: &DotOptions) -> String {
    let mut output = String::new();

    output.push_str("digraph code_graph {\n");
    output.push_str(&format!("    rankdir={};\n", options.rankdir));
    output.push_str("    node [style=filled];\n\n");

    let mut entities: Vec<_> = store.entities().collect();
    entities.sort_by(|a, b| a.id.cmp(&b.id));

    for entity in &entities {
        let color = options
            .entity_colors
            .get(&entity.kind)
            .map(|s| s.as_str())
            .unwrap_or("#FFFFFF");
        let shape = options
            .entity_shapes
            .get(&entity.kind)
            .map(|s| s.as_str())
            .unwrap_or("box");

        output.push_str(&format!(
            "    \"{}\" [label=\"{}\", shape={shape}, fillcolor=\"{color}\"];\n",
            escape_dot_label(entity.id.as_str()),
            escape_dot_label(&entity.name)
        ));
    }

    output.push('\n');

    let mut placeholders = BTreeSet::new();
    for entity in &entities {
        let Ok(edges) = store.edges_from(&entity.id) else {
            continue;
        };
        for edge in edges {
            let target = match &edge.target {
                Some(target) => escape_dot_label(target.as_str()),
                None if options.show_unresolved => {
                    let placeholder = format!("?{}", escape_dot_label(&edge.target_name));
                    placeholders.insert(placeholder.clone());
                    placeholder
                }
                None => continue,
            };

            let mut attrs = format!("label=\"{}\"", edge.kind);
            if let Some(color) = options.edge_colors.get(&edge.kind) {
                attrs.push_str(&format!(", color=\"{color}\""));
            }
            if !edge.is_resolved() {
                attrs.push_str(", style=dashed");
            }

            output.push_str(&format!(
                "    \"{}\" -> \"{target}\" [{attrs}];\n",
                escape_dot_label(edge.source.as_str())
            ));
        }
    }

    if !placeholders.is_empty() {
        output.push('\n');
        for placeholder in placeholders {
            output.push_str(&format!(
                "    \"{placeholder}\" [shape=plaintext, style=\"\"];\n"
            ));
        }
    }

    output.push_str("}\n");
    output
}

/// Escape special characters for DOT labels
fn escape_dot_label(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
