//! Nesting of flat dotted metric keys into a tree.
//!
//! `"layer1.attn.scale"` becomes `layer1 -> attn -> scale`. Children keep the
//! order in which their segment was first seen, which fixes the line order
//! of the rendered report.

use crate::error::MetricsError;
use crate::registry::{validate_key, KEY_DELIMITER};

#[derive(Debug, Clone, PartialEq)]
pub enum MetricTree {
    /// A formatted value
    Leaf(String),
    /// Segment -> child, in first-insertion order
    Interior(Vec<(String, MetricTree)>),
}

impl Default for MetricTree {
    fn default() -> Self {
        MetricTree::Interior(Vec::new())
    }
}

impl MetricTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> Option<&[(String, MetricTree)]> {
        match self {
            MetricTree::Interior(children) => Some(children),
            MetricTree::Leaf(_) => None,
        }
    }

    pub fn child(&self, segment: &str) -> Option<&MetricTree> {
        self.children()?
            .iter()
            .find(|(s, _)| s == segment)
            .map(|(_, node)| node)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MetricTree::Interior(children) if children.is_empty())
    }

    /// Places `value` at the path spelled by `key`, creating groups on the way.
    ///
    /// A repeated key overwrites its leaf. A key that would turn a leaf into a
    /// group, or a group into a leaf, is a [`MetricsError::StructuralConflict`].
    pub fn insert(&mut self, key: &str, value: String) -> Result<(), MetricsError> {
        validate_key(key)?;
        let segments: Vec<&str> = key.split(KEY_DELIMITER).collect();
        // Conflicting key is the first `len` segments
        let conflict = |len: usize| MetricsError::StructuralConflict {
            key: segments[..len.max(1)].join(KEY_DELIMITER.to_string().as_str()),
        };
        let (last, prefix) = segments
            .split_last()
            .ok_or_else(|| MetricsError::InvalidKey(key.to_string()))?;

        let mut node = self;
        for (depth, segment) in prefix.iter().enumerate() {
            let children = match node {
                MetricTree::Interior(children) => children,
                MetricTree::Leaf(_) => return Err(conflict(depth)),
            };
            let pos = match children.iter().position(|(s, _)| s == segment) {
                Some(pos) => pos,
                None => {
                    children.push((segment.to_string(), MetricTree::new()));
                    children.len() - 1
                }
            };
            node = &mut children[pos].1;
        }

        let children = match node {
            MetricTree::Interior(children) => children,
            MetricTree::Leaf(_) => return Err(conflict(prefix.len())),
        };
        match children.iter_mut().find(|(s, _)| s == last) {
            Some((_, existing @ MetricTree::Leaf(_))) => *existing = MetricTree::Leaf(value),
            Some((_, MetricTree::Interior(_))) => return Err(conflict(segments.len())),
            None => children.push((last.to_string(), MetricTree::Leaf(value))),
        }
        Ok(())
    }

    /// Dotted key and value of every leaf, in tree order
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into(None, &mut out);
        out
    }

    fn flatten_into(&self, prefix: Option<&str>, out: &mut Vec<(String, String)>) {
        match self {
            MetricTree::Leaf(value) => {
                out.push((prefix.unwrap_or_default().to_string(), value.clone()));
            }
            MetricTree::Interior(children) => {
                for (segment, child) in children {
                    let key = match prefix {
                        Some(p) => format!("{}{}{}", p, KEY_DELIMITER, segment),
                        None => segment.clone(),
                    };
                    child.flatten_into(Some(&key), out);
                }
            }
        }
    }
}

/// Builds a tree from `(key, formatted value)` pairs
pub fn build_tree<I, K>(entries: I) -> Result<MetricTree, MetricsError>
where
    I: IntoIterator<Item = (K, String)>,
    K: AsRef<str>,
{
    let mut tree = MetricTree::new();
    for (key, value) in entries {
        tree.insert(key.as_ref(), value)?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(v: &str) -> MetricTree {
        MetricTree::Leaf(v.to_string())
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_build_nested() {
        let tree = build_tree(pairs(&[("a.b.c", "1"), ("a.b.d", "2"), ("e", "3")])).unwrap();
        let expected = MetricTree::Interior(vec![
            (
                "a".to_string(),
                MetricTree::Interior(vec![(
                    "b".to_string(),
                    MetricTree::Interior(vec![("c".to_string(), leaf("1")), ("d".to_string(), leaf("2"))]),
                )]),
            ),
            ("e".to_string(), leaf("3")),
        ]);
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_children_keep_first_insertion_order() {
        let tree = build_tree(pairs(&[("z.b", "1"), ("a.c", "2"), ("z.a", "3")])).unwrap();
        let top: Vec<&str> = tree.children().unwrap().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(top, vec!["z", "a"]);
        let z: Vec<&str> = tree.child("z").unwrap().children().unwrap().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(z, vec!["b", "a"]);
    }

    #[test]
    fn test_repeated_key_overwrites() {
        let tree = build_tree(pairs(&[("a.b", "1"), ("a.b", "2")])).unwrap();
        assert_eq!(tree.flatten(), pairs(&[("a.b", "2")]));
    }

    #[test]
    fn test_leaf_then_group_conflicts() {
        let err = build_tree(pairs(&[("a.b", "1"), ("a.b.c", "2")])).unwrap_err();
        assert!(matches!(err, MetricsError::StructuralConflict { ref key } if key == "a.b"));
    }

    #[test]
    fn test_group_then_leaf_conflicts() {
        let err = build_tree(pairs(&[("a.b.c", "1"), ("a.b", "2")])).unwrap_err();
        assert!(matches!(err, MetricsError::StructuralConflict { ref key } if key == "a.b"));

        let err = build_tree(pairs(&[("x.y", "1"), ("x", "2")])).unwrap_err();
        assert!(matches!(err, MetricsError::StructuralConflict { ref key } if key == "x"));
    }

    #[test]
    fn test_top_level_leaf_then_group_conflicts() {
        let err = build_tree(pairs(&[("x", "1"), ("x.y", "2")])).unwrap_err();
        assert!(matches!(err, MetricsError::StructuralConflict { ref key } if key == "x"));
    }

    #[test]
    fn test_flatten_round_trip() {
        let input = pairs(&[
            ("layer1.attn.scale", "1.00000"),
            ("layer1.attn.grad", "2.00000e-07"),
            ("layer1.mlp.scale", "0.500000"),
            ("layer2.mlp.scale", "3.00000"),
            ("loss", "nan"),
        ]);
        let tree = build_tree(input.clone()).unwrap();
        assert_eq!(tree.flatten(), input);
    }

    #[test]
    fn test_invalid_key() {
        let err = build_tree(pairs(&[("a..b", "1")])).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidKey(_)));
    }

    #[test]
    fn test_empty() {
        let tree = build_tree(Vec::<(String, String)>::new()).unwrap();
        assert!(tree.is_empty());
        assert!(tree.flatten().is_empty());
    }
}
