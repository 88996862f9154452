//! ASCII rendering of todo trees.

use crate::models::{count_completed, count_nodes, TodoNode};

const OPEN: char = '☐';
const DONE: char = '☑';

fn completion_symbol(node: &TodoNode) -> char {
    if node.completed {
        DONE
    } else {
        OPEN
    }
}

/// Render a todo tree as ASCII art with completion boxes.
///
/// Example output:
/// ```text
/// ☐ Groceries
/// ├── ☑ Milk
/// └── ☐ Bread
///     └── ☐ Rye
/// ☑ Call plumber
/// ```
///
/// With `show_ids`, each line ends with the node id in brackets so it can be
/// passed back to the command line.
pub fn render_tree(nodes: &[TodoNode], show_ids: bool) -> String {
    let mut output = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i == nodes.len() - 1;
        render_node(&mut output, node, "", is_last, true, show_ids);
    }
    output
}

/// Progress line for a list, e.g. `2 / 5 completed (40%)`.
/// Returns `None` for an empty list.
pub fn render_summary(nodes: &[TodoNode]) -> Option<String> {
    let total = count_nodes(nodes);
    if total == 0 {
        return None;
    }
    let completed = count_completed(nodes);
    let percent = (completed * 100 + total / 2) / total;
    Some(format!("{} / {} completed ({}%)", completed, total, percent))
}

fn render_node(
    output: &mut String,
    node: &TodoNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    show_ids: bool,
) {
    if !is_root {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
    }
    output.push(completion_symbol(node));
    output.push(' ');
    output.push_str(&node.text);
    if show_ids {
        output.push_str("  [");
        output.push_str(node.id.as_str());
        output.push(']');
    }
    output.push('\n');

    // Roots start their children's prefix fresh
    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false, show_ids);
    }
}
