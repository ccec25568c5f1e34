//! Export module for visualizing the graph in external tools.
//!
//! - **DOT**: Graphviz visualization
//! - **JSON**: see [`GraphStore::to_json`](crate::GraphStore::to_json)

pub mod dot;

pub use dot::{export_dot, export_dot_styled, DotOptions};
