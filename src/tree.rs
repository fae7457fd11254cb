//! Tree Utilities
//!
//! Helper functions for tree rendering.

use crate::models::{Node, NodeView};

/// Flatten a snapshot into display order using recursive DFS.
/// Returns (Node, depth) pairs; only open nodes contribute their children.
pub fn flatten_open(views: &[NodeView]) -> Vec<(Node, usize)> {
    fn collect(views: &[NodeView], depth: usize, result: &mut Vec<(Node, usize)>) {
        for view in views {
            result.push((view.node.clone(), depth));
            if view.node.is_open {
                if let Some(children) = &view.children {
                    collect(children, depth + 1, result);
                }
            }
        }
    }

    let mut result = Vec::new();
    collect(views, 0, &mut result);
    result
}

/// Indented plain-text outline, two spaces per level
pub fn render_outline(views: &[NodeView]) -> String {
    flatten_open(views)
        .into_iter()
        .map(|(node, depth)| {
            let marker = if node.is_open { "-" } else { "+" };
            format!("{}{} {}", "  ".repeat(depth), marker, node.label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
