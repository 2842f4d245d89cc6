//! Decision trees used by the forest and boosting models
//!
//! [`ClassificationTree`] is a Gini CART tree with per-node feature
//! sampling. [`RegressionTree`] fits gradient/hessian pairs for boosting,
//! either on exact thresholds or on pre-computed [`FeatureBins`].

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Tree growth limits
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Maximum depth (root is depth 0)
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each child
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<f64>),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn leaf_value(&self, row: &[f64]) -> &[f64] {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// Move indices matching `goes_left` to the front, returning how many did
fn partition(indices: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..indices.len() {
        if goes_left(indices[i]) {
            indices.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

/// Threshold strictly below `next` so that `lower` goes left and `next` right
fn midpoint(lower: f64, next: f64) -> f64 {
    let mid = lower + (next - lower) / 2.0;
    if mid < next {
        mid
    } else {
        lower
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

// ==================== Classification ====================

/// Gini decision tree over class labels. Leaves hold class probabilities.
#[derive(Debug, Clone)]
pub struct ClassificationTree {
    config: TreeConfig,
    n_classes: usize,
    root: Option<Node>,
}

impl ClassificationTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            n_classes: 0,
            root: None,
        }
    }

    /// Grow the tree on the rows named by `sample` (duplicates allowed)
    pub fn fit(
        &mut self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
        sample: &[usize],
        rng: &mut ChaCha8Rng,
    ) {
        self.n_classes = n_classes;
        let mut indices = sample.to_vec();
        self.root = Some(self.grow(features, labels, &mut indices, 0, rng));
    }

    fn grow(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        indices: &mut [usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        let counts = self.class_counts(labels, indices);
        let n = indices.len();

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split.max(2)
            || gini(&counts, n) <= 0.0
        {
            return self.leaf(&counts, n);
        }

        let Some(split) = self.best_split(features, labels, indices, &counts, rng) else {
            return self.leaf(&counts, n);
        };

        let mid = partition(indices, |i| features[i][split.feature] <= split.threshold);
        let (left, right) = indices.split_at_mut(mid);
        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(features, labels, left, depth + 1, rng)),
            right: Box::new(self.grow(features, labels, right, depth + 1, rng)),
        }
    }

    fn class_counts(&self, labels: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[labels[i]] += 1;
        }
        counts
    }

    fn leaf(&self, counts: &[usize], n: usize) -> Node {
        let n = n.max(1) as f64;
        Node::Leaf(counts.iter().map(|&c| c as f64 / n).collect())
    }

    fn best_split(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        indices: &[usize],
        parent_counts: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<Split> {
        let n = indices.len();
        let n_features = features[indices[0]].len();
        let mut candidates: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.config.max_features {
            candidates.shuffle(rng);
            candidates.truncate(k.clamp(1, n_features.max(1)));
        }

        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut order = indices.to_vec();
        let mut best: Option<Split> = None;

        for &feature in &candidates {
            order.sort_by(|&a, &b| features[a][feature].total_cmp(&features[b][feature]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.to_vec();
            for pos in 0..n - 1 {
                let label = labels[order[pos]];
                left[label] += 1;
                right[label] -= 1;

                let value = features[order[pos]][feature];
                let next = features[order[pos + 1]][feature];
                let (n_left, n_right) = (pos + 1, n - pos - 1);
                if value == next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let score = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                if best.map_or(true, |b| score < b.score) {
                    best = Some(Split {
                        feature,
                        threshold: midpoint(value, next),
                        score,
                    });
                }
            }
        }

        best
    }

    /// Class probabilities for one row, None before fitting
    pub fn predict_proba_row(&self, row: &[f64]) -> Option<&[f64]> {
        self.root.as_ref().map(|root| root.leaf_value(row))
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, Node::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, Node::n_leaves)
    }
}

// ==================== Gradient regression ====================

/// Quantile bin edges per feature, plus the binned training matrix
#[derive(Debug, Clone)]
pub struct FeatureBins {
    /// Ascending cut points per feature; bin `b` holds values `<= cuts[b]`
    cuts: Vec<Vec<f64>>,
    /// Bin index per sample and feature
    binned: Vec<Vec<u16>>,
}

impl FeatureBins {
    /// Bin every feature into at most `max_bins` buckets
    pub fn new(features: &[Vec<f64>], max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, u16::MAX as usize);
        let n_features = features.first().map_or(0, Vec::len);

        let cuts: Vec<Vec<f64>> = (0..n_features)
            .map(|f| {
                let mut values: Vec<f64> = features.iter().map(|row| row[f]).collect();
                values.sort_by(f64::total_cmp);
                let mut distinct = values.clone();
                distinct.dedup();

                if distinct.len() <= max_bins {
                    distinct.windows(2).map(|w| midpoint(w[0], w[1])).collect()
                } else {
                    let mut edges: Vec<f64> = (1..max_bins)
                        .map(|q| values[q * values.len() / max_bins])
                        .collect();
                    edges.dedup();
                    // The largest value must stay in the last bin
                    if edges.last() == values.last() {
                        edges.pop();
                    }
                    edges
                }
            })
            .collect();

        let binned = features
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&cuts)
                    .map(|(x, c)| Self::bin_of(c, *x))
                    .collect()
            })
            .collect();

        Self { cuts, binned }
    }

    fn bin_of(cuts: &[f64], x: f64) -> u16 {
        cuts.partition_point(|c| *c < x) as u16
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }
}

/// Growth limits and regularisation for a gradient tree
#[derive(Debug, Clone)]
pub struct GradientTreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf weights
    pub l2_regularization: f64,
}

/// Regression tree fitted to per-sample gradients and hessians.
///
/// Split gain is `GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)` and leaves predict
/// `-G/(H+λ)`. With unit hessians and `λ = 0` this is an ordinary
/// least-squares tree on the negative gradient.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

struct GradientFit<'a> {
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    bins: Option<&'a FeatureBins>,
    config: &'a GradientTreeConfig,
}

impl RegressionTree {
    pub fn fit(
        features: &[Vec<f64>],
        gradients: &[f64],
        hessians: &[f64],
        config: &GradientTreeConfig,
        bins: Option<&FeatureBins>,
    ) -> Self {
        let ctx = GradientFit {
            features,
            gradients,
            hessians,
            bins,
            config,
        };
        let mut indices: Vec<usize> = (0..features.len()).collect();
        Self {
            root: ctx.grow(&mut indices, 0),
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.root.leaf_value(row)[0]
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl GradientFit<'_> {
    fn sums(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }

    fn objective(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.l2_regularization).max(1e-12)
    }

    fn leaf(&self, g: f64, h: f64) -> Node {
        Node::Leaf(vec![-g / (h + self.config.l2_regularization).max(1e-12)])
    }

    fn grow(&self, indices: &mut [usize], depth: usize) -> Node {
        let (g, h) = self.sums(indices);
        if depth >= self.config.max_depth || indices.len() < self.config.min_samples_split.max(2) {
            return self.leaf(g, h);
        }

        let split = match self.bins {
            Some(bins) => self.best_binned_split(bins, indices, g, h),
            None => self.best_exact_split(indices, g, h),
        };
        let Some(split) = split else {
            return self.leaf(g, h);
        };

        let features = self.features;
        let mid = partition(indices, |i| features[i][split.feature] <= split.threshold);
        let (left, right) = indices.split_at_mut(mid);
        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(left, depth + 1)),
            right: Box::new(self.grow(right, depth + 1)),
        }
    }

    fn gain(&self, gl: f64, hl: f64, g: f64, h: f64) -> f64 {
        self.objective(gl, hl) + self.objective(g - gl, h - hl) - self.objective(g, h)
    }

    fn best_exact_split(&self, indices: &[usize], g: f64, h: f64) -> Option<Split> {
        let n = indices.len();
        let n_features = self.features[indices[0]].len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut order = indices.to_vec();
        let mut best: Option<Split> = None;

        for feature in 0..n_features {
            order.sort_by(|&a, &b| {
                self.features[a][feature].total_cmp(&self.features[b][feature])
            });

            let (mut gl, mut hl) = (0.0, 0.0);
            for pos in 0..n - 1 {
                gl += self.gradients[order[pos]];
                hl += self.hessians[order[pos]];

                let value = self.features[order[pos]][feature];
                let next = self.features[order[pos + 1]][feature];
                if value == next || pos + 1 < min_leaf || n - pos - 1 < min_leaf {
                    continue;
                }

                let score = self.gain(gl, hl, g, h);
                if score > 1e-12 && best.map_or(true, |b| score > b.score) {
                    best = Some(Split {
                        feature,
                        threshold: midpoint(value, next),
                        score,
                    });
                }
            }
        }

        best
    }

    fn best_binned_split(
        &self,
        bins: &FeatureBins,
        indices: &[usize],
        g: f64,
        h: f64,
    ) -> Option<Split> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<Split> = None;

        for (feature, cuts) in bins.cuts.iter().enumerate() {
            let n_bins = bins.n_bins(feature);
            let mut grad = vec![0.0; n_bins];
            let mut hess = vec![0.0; n_bins];
            let mut count = vec![0usize; n_bins];
            for &i in indices {
                let b = bins.binned[i][feature] as usize;
                grad[b] += self.gradients[i];
                hess[b] += self.hessians[i];
                count[b] += 1;
            }

            let (mut gl, mut hl, mut n_left) = (0.0, 0.0, 0usize);
            for (b, threshold) in cuts.iter().enumerate() {
                gl += grad[b];
                hl += hess[b];
                n_left += count[b];
                if count[b] == 0 || n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }

                let score = self.gain(gl, hl, g, h);
                if score > 1e-12 && best.map_or(true, |s| score > s.score) {
                    best = Some(Split {
                        feature,
                        threshold: *threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}
