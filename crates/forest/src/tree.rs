//! Regression tree structures
//!
//! Nodes live in a flat vector with the root at index 0. Internal nodes
//! send a row left when `feature <= threshold`.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0` and `left`/`right` index into the
/// node vector. Leaves carry `feature_idx == -1` and `left == right == -1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Split threshold
    pub threshold: f64,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Mean target of the training rows that reached this node
    pub value: f64,

    /// Number of (bootstrapped) training rows that reached this node
    pub samples: usize,
}

impl Node {
    /// Create a new internal (split) node; children are patched in later
    pub fn internal(feature_idx: usize, threshold: f64, value: f64, samples: usize) -> Self {
        Self {
            feature_idx: feature_idx as i32,
            threshold,
            left: -1,
            right: -1,
            value,
            samples,
        }
    }

    /// Create a new leaf node
    pub fn leaf(value: f64, samples: usize) -> Self {
        Self {
            feature_idx: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            value,
            samples,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx < 0
    }
}

/// A single regression tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate this tree on a feature row
    ///
    /// The row length is checked by the forest; a malformed tree yields 0.0.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if node.is_leaf() {
                return node.value;
            }

            let Some(&feature_value) = features.get(node.feature_idx as usize) else {
                return 0.0;
            };

            let next = if feature_value <= node.threshold {
                node.left
            } else {
                node.right
            };

            if next < 0 {
                return node.value;
            }
            idx = next as usize;
        }
    }

    /// Depth of the deepest leaf (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    let left = walk(nodes, node.left as usize);
                    let right = walk(nodes, node.right as usize);
                    1 + left.max(right)
                }
                _ => 0,
            }
        }

        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Validate tree structure after deserialization
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }

            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }

            if node.feature_idx as usize >= n_features {
                return Err(format!(
                    "Node {i} splits on feature {} but the model has {n_features}",
                    node.feature_idx
                ));
            }

            if !node.threshold.is_finite() {
                return Err(format!("Node {i} has a non-finite threshold"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        let mut root = Node::internal(0, 50.0, 150.0, 2);
        root.left = 1;
        root.right = 2;
        Tree::new(vec![root, Node::leaf(100.0, 1), Node::leaf(200.0, 1)])
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(3, 12.5, 1.0, 10);
        assert_eq!(internal.feature_idx, 3);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(-2.5, 4);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.value, -2.5);
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30.0]), 100.0);
        assert_eq!(tree.evaluate(&[50.0]), 100.0); // Equal goes left
        assert_eq!(tree.evaluate(&[60.0]), 200.0);
    }

    #[test]
    fn test_tree_shape() {
        let tree = stump();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(Tree::new(vec![Node::leaf(1.0, 1)]).depth(), 0);
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump().validate(1).is_ok());
        assert!(stump().validate(0).is_err());

        let mut broken = stump();
        broken.nodes[0].left = 7;
        assert!(broken.validate(1).is_err());

        assert!(Tree::default().validate(1).is_err());
    }
}
