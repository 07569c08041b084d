//! Render a snapshot as indented text, one line per node.

use super::snapshot::{NodeIndex, Snapshot, SnapshotNode};

const INDENT: &str = "  ";
const VALUE_DISPLAY_MAX: usize = 60;

/// A rendered line and the node it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    pub node: NodeIndex,
    pub depth: usize,
    /// The line without indentation or the leading `- ` marker.
    pub content: String,
}

impl FormattedLine {
    pub fn render(&self) -> String {
        format!("{}- {}", INDENT.repeat(self.depth), self.content)
    }
}

pub fn format_lines(snapshot: &Snapshot) -> Vec<FormattedLine> {
    snapshot
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| FormattedLine {
            node: index,
            depth: node.depth,
            content: node_content(node),
        })
        .collect()
}

/// Deterministic text form of a snapshot.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut output = String::new();
    for line in format_lines(snapshot) {
        output.push_str(&line.render());
        output.push('\n');
    }
    output
}

fn node_content(node: &SnapshotNode) -> String {
    let mut line = node.role.clone();

    if !node.name.is_empty() {
        line.push_str(&format!(" \"{}\"", escape_quotes(&node.name)));
    }

    line.push_str(&format!(" [uid={}]", node.uid));

    for (key, value) in &node.attributes {
        match key.as_str() {
            "value" | "href" => {
                let shown = if value.chars().count() > VALUE_DISPLAY_MAX {
                    let kept: String = value.chars().take(VALUE_DISPLAY_MAX - 3).collect();
                    format!("{}...", kept)
                } else {
                    value.clone()
                };
                line.push_str(&format!(" {}=\"{}\"", key, escape_quotes(&shown)));
            }
            _ if value == "true" => line.push_str(&format!(" [{}]", key)),
            _ => line.push_str(&format!(" [{}={}]", key, value)),
        }
    }

    line
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
