//! CART regression tree builder
//!
//! Exact-greedy splits on squared error. Every node scans a random subset
//! of features, sorts the node's rows by each one and sweeps prefix sums,
//! so a split costs O(n log n) per candidate feature.

use rand::rngs::StdRng;
use rand::seq::index;

use crate::tree::{Node, Tree};

/// Growth limits for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn per node (already resolved to a count)
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// sum_l^2 / n_l + sum_r^2 / n_r; larger means lower squared error
    score: f64,
}

/// Running sums over a set of rows
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Total squared deviation from the mean
    fn sse(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum_sq - self.sum * self.sum / self.count as f64).max(0.0)
    }
}

/// Output of growing one tree
#[derive(Debug, Clone)]
pub struct GrownTree {
    pub tree: Tree,
    /// Squared-error reduction credited to each feature
    pub importances: Vec<f64>,
}

/// Build a regression tree over a (possibly bootstrapped) row sample
pub struct CartBuilder<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    feature_count: usize,
    config: TreeConfig,
}

impl<'a> CartBuilder<'a> {
    pub fn new(features: &'a [Vec<f64>], targets: &'a [f64], config: TreeConfig) -> Self {
        let feature_count = features.first().map_or(0, Vec::len);

        Self {
            features,
            targets,
            feature_count,
            config,
        }
    }

    /// Grow a tree from the given row indices (duplicates allowed)
    pub fn build(&self, rows: Vec<usize>, rng: &mut StdRng) -> GrownTree {
        let mut nodes = Vec::new();
        let mut importances = vec![0.0; self.feature_count];

        self.build_node(rows, 0, &mut nodes, &mut importances, rng);

        GrownTree {
            tree: Tree::new(nodes),
            importances,
        }
    }

    fn build_node(
        &self,
        rows: Vec<usize>,
        depth: usize,
        nodes: &mut Vec<Node>,
        importances: &mut [f64],
        rng: &mut StdRng,
    ) -> i32 {
        let current_idx = nodes.len();

        let mut moments = Moments::default();
        for &row in &rows {
            moments.push(self.targets[row]);
        }
        let value = moments.mean();
        let parent_sse = moments.sse();

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || rows.len() < self.config.min_samples_split
            || rows.len() < 2 * self.config.min_samples_leaf
            || parent_sse <= f64::EPSILON
        {
            nodes.push(Node::leaf(value, rows.len()));
            return current_idx as i32;
        }

        let Some(split) = self.find_best_split(&rows, &moments, rng) else {
            nodes.push(Node::leaf(value, rows.len()));
            return current_idx as i32;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&row| self.features[row][split.feature_idx] <= split.threshold);

        if left_rows.len() < self.config.min_samples_leaf
            || right_rows.len() < self.config.min_samples_leaf
        {
            nodes.push(Node::leaf(value, rows.len()));
            return current_idx as i32;
        }

        // parent_sse - (sse_left + sse_right)
        let gain = split.score - moments.sum * moments.sum / moments.count as f64;
        importances[split.feature_idx] += gain.clamp(0.0, parent_sse);

        nodes.push(Node::internal(split.feature_idx, split.threshold, value, rows.len()));
        drop(rows);

        let left = self.build_node(left_rows, depth + 1, nodes, importances, rng);
        let right = self.build_node(right_rows, depth + 1, nodes, importances, rng);

        nodes[current_idx].left = left;
        nodes[current_idx].right = right;

        current_idx as i32
    }

    /// Scan a random feature subset for the split with the lowest squared error
    fn find_best_split(
        &self,
        rows: &[usize],
        parent: &Moments,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let draw = self.config.max_features.min(self.feature_count);
        let mut candidates = index::sample(rng, self.feature_count, draw).into_vec();
        // Ascending order makes score ties resolve to the lowest feature index
        candidates.sort_unstable();

        let min_leaf = self.config.min_samples_leaf;
        let n = rows.len();
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature_idx in candidates {
            column.clear();
            column.extend(
                rows.iter()
                    .map(|&row| (self.features[row][feature_idx], self.targets[row])),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            if column[0].0 == column[n - 1].0 {
                continue;
            }

            let mut left = Moments::default();
            for i in 1..n {
                left.push(column[i - 1].1);

                let (lo, hi) = (column[i - 1].0, column[i].0);
                if lo == hi || i < min_leaf || n - i < min_leaf {
                    continue;
                }

                let right_sum = parent.sum - left.sum;
                let right_count = (n - i) as f64;
                let score = left.sum * left.sum / i as f64 + right_sum * right_sum / right_count;

                if best.map_or(true, |b| score > b.score) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = vec![
            vec![1.0, 7.0],
            vec![2.0, 3.0],
            vec![3.0, 9.0],
            vec![4.0, 1.0],
            vec![5.0, 4.0],
            vec![6.0, 8.0],
        ];
        let targets = vec![10.0, 10.0, 10.0, 50.0, 50.0, 50.0];
        (features, targets)
    }

    #[test]
    fn test_step_function_split() {
        let (features, targets) = step_data();
        let builder = CartBuilder::new(&features, &targets, TreeConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        let grown = builder.build((0..6).collect(), &mut rng);

        let root = &grown.tree.nodes[0];
        assert_eq!(root.feature_idx, 0);
        assert_eq!(root.threshold, 3.5);
        assert_eq!(grown.tree.evaluate(&[2.0, 0.0]), 10.0);
        assert_eq!(grown.tree.evaluate(&[5.5, 0.0]), 50.0);
        assert!(grown.importances[0] > 0.0);
        assert_eq!(grown.importances[1], 0.0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = vec![vec![1.0]];
        let targets = vec![42.0];
        let builder = CartBuilder::new(&features, &targets, TreeConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let grown = builder.build(vec![0], &mut rng);

        assert_eq!(grown.tree.nodes.len(), 1);
        assert_eq!(grown.tree.evaluate(&[100.0]), 42.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let features: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let config = TreeConfig {
            max_depth: Some(2),
            ..TreeConfig::default()
        };
        let builder = CartBuilder::new(&features, &targets, config);
        let mut rng = StdRng::seed_from_u64(3);
        let grown = builder.build((0..32).collect(), &mut rng);

        assert!(grown.tree.depth() <= 2);
        assert!(grown.tree.leaf_count() <= 4);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let (features, targets) = step_data();
        let config = TreeConfig {
            min_samples_leaf: 3,
            ..TreeConfig::default()
        };
        let builder = CartBuilder::new(&features, &targets, config);
        let mut rng = StdRng::seed_from_u64(11);
        let grown = builder.build((0..6).collect(), &mut rng);

        for node in grown.tree.nodes.iter().filter(|n| n.is_leaf()) {
            assert!(node.samples >= 3);
        }
    }

    #[test]
    fn test_constant_features_make_a_leaf() {
        let features = vec![vec![1.0]; 4];
        let targets = vec![1.0, 2.0, 3.0, 4.0];
        let builder = CartBuilder::new(&features, &targets, TreeConfig::default());
        let mut rng = StdRng::seed_from_u64(5);
        let grown = builder.build((0..4).collect(), &mut rng);

        assert_eq!(grown.tree.nodes.len(), 1);
        assert_eq!(grown.tree.nodes[0].value, 2.5);
    }
}
