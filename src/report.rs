//! Rendering of a [`MetricTree`] as an indented, dot-aligned report.
//!
//! ```text
//! layer1:
//!   attn.scale.............................  1.00000
//!   attn.grad..........................  2.00000e-07
//! loss.scale..............................  0.500000
//! ```
//!
//! Chains of single-child groups are folded into one dotted label. Layout is
//! computed as [`ReportLine`] records first and only turned into strings by
//! [`ReportLine::render`], so it can be checked without a logger.

use crate::registry::KEY_DELIMITER;
use crate::tree::MetricTree;

/// Spaces added per nesting level
pub const INDENT_STEP: usize = 2;

/// One line of the report before layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub label: String,
    pub depth: usize,
    /// `None` for a group header
    pub value: Option<String>,
}

impl ReportLine {
    /// Indents the label and, for values, dot-fills so the line spans `width` columns
    pub fn render(&self, width: usize) -> String {
        let label = format!("{:indent$}{}", "", self.label, indent = self.depth * INDENT_STEP);
        match &self.value {
            None => format!("{}:", label),
            Some(value) => {
                let used = label.chars().count() + value.chars().count() + 2;
                let fill = width.saturating_sub(used);
                format!("{}{}  {}", label, ".".repeat(fill), value)
            }
        }
    }
}

/// Walks `tree` in stored order, folding single-child chains
pub fn collect_lines(tree: &MetricTree) -> Vec<ReportLine> {
    let mut lines = Vec::new();
    collect_into(tree, 0, &mut lines);
    lines
}

fn collect_into(tree: &MetricTree, depth: usize, lines: &mut Vec<ReportLine>) {
    let Some(children) = tree.children() else {
        return;
    };
    for (segment, child) in children {
        let mut label = segment.clone();
        let mut node = child;
        while let MetricTree::Interior(only) = node {
            if only.len() != 1 {
                break;
            }
            label.push(KEY_DELIMITER);
            label.push_str(&only[0].0);
            node = &only[0].1;
        }
        match node {
            MetricTree::Leaf(value) => lines.push(ReportLine {
                label,
                depth,
                value: Some(value.clone()),
            }),
            MetricTree::Interior(_) => {
                lines.push(ReportLine {
                    label,
                    depth,
                    value: None,
                });
                collect_into(node, depth + 1, lines);
            }
        }
    }
}

pub fn render_lines(tree: &MetricTree, width: usize) -> Vec<String> {
    collect_lines(tree).iter().map(|line| line.render(width)).collect()
}

/// Destination for finished report lines
pub trait LogSink {
    fn log_line(&mut self, line: &str);
}

/// Emits each line as a `tracing` event at `INFO`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log_line(&mut self, line: &str) {
        tracing::info!(target: "tiny_scales::metrics", "{}", line);
    }
}

/// Keeps lines in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for MemorySink {
    fn log_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_tree;

    fn tree(items: &[(&str, &str)]) -> MetricTree {
        build_tree(items.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    fn line(label: &str, depth: usize, value: Option<&str>) -> ReportLine {
        ReportLine {
            label: label.to_string(),
            depth,
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_single_chain_is_one_line() {
        let lines = collect_lines(&tree(&[("a.b.c", "1.00000")]));
        assert_eq!(lines, vec![line("a.b.c", 0, Some("1.00000"))]);
    }

    #[test]
    fn test_branch_gets_header() {
        let lines = collect_lines(&tree(&[("a.b.c", "1.00000"), ("a.b.d", "2.00000")]));
        assert_eq!(
            lines,
            vec![
                line("a.b", 0, None),
                line("c", 1, Some("1.00000")),
                line("d", 1, Some("2.00000")),
            ]
        );

        let rendered = render_lines(&tree(&[("a.b.c", "1.00000"), ("a.b.d", "2.00000")]), 20);
        assert_eq!(rendered, vec!["a.b:", "  c........  1.00000", "  d........  2.00000"]);
    }

    #[test]
    fn test_compression_inside_branches() {
        let lines = collect_lines(&tree(&[
            ("layer1.attn.q.scale", "1"),
            ("layer1.mlp.scale", "2"),
            ("layer1.mlp.grad", "3"),
            ("loss", "4"),
        ]));
        assert_eq!(
            lines,
            vec![
                line("layer1", 0, None),
                line("attn.q.scale", 1, Some("1")),
                line("mlp", 1, None),
                line("scale", 2, Some("2")),
                line("grad", 2, Some("3")),
                line("loss", 0, Some("4")),
            ]
        );
    }

    #[test]
    fn test_render_fills_width() {
        let rendered = line("scale", 1, Some("2.00000")).render(30);
        assert_eq!(rendered.len(), 30);
        assert!(rendered.starts_with("  scale...."));
        assert!(rendered.ends_with("....  2.00000"));
    }

    #[test]
    fn test_render_overlong_label_has_no_fill() {
        let label = "a".repeat(60);
        let rendered = line(&label, 0, Some("1")).render(50);
        assert_eq!(rendered, format!("{}  1", label));
    }

    #[test]
    fn test_empty_tree_renders_nothing() {
        assert!(render_lines(&MetricTree::new(), 50).is_empty());
    }

    #[test]
    fn test_memory_sink_collects() {
        let mut sink = MemorySink::new();
        sink.log_line("first");
        sink.log_line("second");
        assert_eq!(sink.lines, vec!["first", "second"]);
    }
}
