//! Learned ranking model: feature standardization plus gradient-boosted
//! regression trees.
//!
//! Boosting follows the classic fit loop: initialize with the label mean,
//! then repeatedly fit a shallow tree to the residuals and fold it in with a
//! shrinkage factor. Row and column subsampling are driven by a seeded rng
//! so refitting the same data reproduces the same model.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Per-dimension zero-mean / unit-variance standardization, fitted on the
/// training set only.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fits means and standard deviations over the rows. Zero-variance
    /// dimensions scale by 1 so constant features pass through centered.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dim = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;

        let mut means = vec![0.0; dim];
        for row in rows {
            for (m, &v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; dim];
        for row in rows {
            for (s, (&v, &m)) in stds.iter_mut().zip(row.iter().zip(&means)) {
                *s += (v - m) * (v - m);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Self { means, stds }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }
}

enum Node {
    Leaf(f64),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// A depth-bounded regression tree fitted to residuals with squared-error
/// splits.
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        sample_indices: &[usize],
        feature_indices: &[usize],
        max_depth: usize,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, targets, sample_indices, feature_indices, max_depth);
        tree
    }

    fn grow(
        &mut self,
        rows: &[Vec<f64>],
        targets: &[f64],
        samples: &[usize],
        features: &[usize],
        depth: usize,
    ) -> usize {
        let mean = samples.iter().map(|&i| targets[i]).sum::<f64>() / samples.len().max(1) as f64;

        if depth == 0 || samples.len() < 2 {
            self.nodes.push(Node::Leaf(mean));
            return self.nodes.len() - 1;
        }

        let Some((feature, threshold)) = best_split(rows, targets, samples, features) else {
            self.nodes.push(Node::Leaf(mean));
            return self.nodes.len() - 1;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .copied()
            .partition(|&i| rows[i][feature] <= threshold);

        let node_index = self.nodes.len();
        // Placeholder: children are grown after the split node is reserved.
        self.nodes.push(Node::Leaf(mean));
        let left = self.grow(rows, targets, &left_samples, features, depth - 1);
        let right = self.grow(rows, targets, &right_samples, features, depth - 1);
        self.nodes[node_index] = Node::Split { feature, threshold, left, right };
        node_index
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split { feature, threshold, left, right } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Finds the (feature, threshold) minimizing total squared error, scanning
/// sorted feature values with prefix sums. Returns `None` when no split
/// separates the samples.
fn best_split(
    rows: &[Vec<f64>],
    targets: &[f64],
    samples: &[usize],
    features: &[usize],
) -> Option<(usize, f64)> {
    let n = samples.len() as f64;
    let total: f64 = samples.iter().map(|&i| targets[i]).sum();
    let base_sse_term = total * total / n;

    let mut best: Option<(usize, f64, f64)> = None;
    for &feature in features {
        let mut ordered: Vec<(f64, f64)> = samples
            .iter()
            .map(|&i| (rows[i][feature], targets[i]))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for (pos, window) in ordered.windows(2).enumerate() {
            left_sum += window[0].1;
            if window[0].0 == window[1].0 {
                continue;
            }
            let left_n = (pos + 1) as f64;
            let right_n = n - left_n;
            let right_sum = total - left_sum;
            // Maximizing this term minimizes the post-split squared error.
            let gain =
                left_sum * left_sum / left_n + right_sum * right_sum / right_n - base_sse_term;
            let threshold = (window[0].0 + window[1].0) / 2.0;
            if best.map_or(gain > 1e-12, |(_, _, g)| gain > g) {
                best = Some((feature, threshold, gain));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// Gradient-boosted regression ensemble with fixed hyperparameters matching
/// the production configuration: 100 trees of depth 6, learning rate 0.1,
/// 0.8 row and column subsampling.
pub struct GradientBoostedRegressor {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    subsample: f64,
    colsample: f64,
    init_prediction: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            subsample: 0.8,
            colsample: 0.8,
            init_prediction: 0.0,
            trees: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Fits the ensemble. `rows` must be non-empty and rectangular; the rng
    /// drives row/column subsampling, so a fixed seed makes the fit
    /// reproducible.
    pub fn fit(&mut self, rows: &[Vec<f64>], targets: &[f64], rng: &mut StdRng) {
        debug_assert_eq!(rows.len(), targets.len());
        let n_samples = rows.len();
        if n_samples == 0 {
            return;
        }
        let n_features = rows[0].len();

        self.init_prediction = targets.iter().sum::<f64>() / n_samples as f64;
        let mut predictions = vec![self.init_prediction; n_samples];
        self.trees = Vec::with_capacity(self.n_estimators);

        let row_count = ((n_samples as f64 * self.subsample).ceil() as usize).clamp(1, n_samples);
        let col_count =
            ((n_features as f64 * self.colsample).ceil() as usize).clamp(1, n_features);
        let mut all_rows: Vec<usize> = (0..n_samples).collect();
        let mut all_cols: Vec<usize> = (0..n_features).collect();

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&predictions)
                .map(|(&y, &p)| y - p)
                .collect();

            // Subsample without replacement.
            all_rows.shuffle(rng);
            let sample_indices = &all_rows[..row_count];
            all_cols.shuffle(rng);
            let mut feature_indices = all_cols[..col_count].to_vec();
            feature_indices.sort_unstable();

            let tree = RegressionTree::fit(
                rows,
                &residuals,
                sample_indices,
                &feature_indices,
                self.max_depth,
            );

            for (prediction, row) in predictions.iter_mut().zip(rows) {
                *prediction += self.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut prediction = self.init_prediction;
        for tree in &self.trees {
            prediction += self.learning_rate * tree.predict(row);
        }
        prediction
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

impl Default for GradientBoostedRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// A fitted scaler/ensemble pair — the unit the engine snapshot swaps in.
pub struct RankingModel {
    pub scaler: StandardScaler,
    pub booster: GradientBoostedRegressor,
}

impl RankingModel {
    pub fn score(&self, features: &[f64]) -> f64 {
        self.booster.predict(&self.scaler.transform(features))
    }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    use rand::SeedableRng;
    StdRng::seed_from_u64(seed)
}

/// Training seed, fixed so two retrains over identical data produce
/// identical ensembles.
pub const TRAINING_SEED: u64 = 42;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_centers_and_scales() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&rows);

        let transformed = scaler.transform(&[3.0, 10.0]);
        assert!(transformed[0].abs() < 1e-9);
        // Zero-variance dimension passes through centered, not divided by 0.
        assert!(transformed[1].abs() < 1e-9);

        let low = scaler.transform(&[1.0, 10.0]);
        let high = scaler.transform(&[5.0, 10.0]);
        assert!((low[0] + high[0]).abs() < 1e-9);
        assert!(high[0] > 0.0);
    }

    #[test]
    fn test_booster_learns_a_threshold_rule() {
        // Label 1.0 iff the first feature exceeds 0.5.
        let rows: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![i as f64 / 100.0, (i % 7) as f64])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| if r[0] > 0.5 { 1.0 } else { 0.0 }).collect();

        let mut booster = GradientBoostedRegressor::new().with_n_estimators(30);
        booster.fit(&rows, &targets, &mut seeded_rng(7));
        assert!(booster.is_fitted());

        assert!(booster.predict(&[0.9, 3.0]) > 0.7);
        assert!(booster.predict(&[0.1, 3.0]) < 0.3);
    }

    #[test]
    fn test_fit_with_identical_seed_is_reproducible() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 10) as f64, i as f64]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] / 10.0).collect();

        let mut first = GradientBoostedRegressor::new().with_n_estimators(10);
        first.fit(&rows, &targets, &mut seeded_rng(TRAINING_SEED));
        let mut second = GradientBoostedRegressor::new().with_n_estimators(10);
        second.fit(&rows, &targets, &mut seeded_rng(TRAINING_SEED));

        for row in &rows {
            assert_eq!(first.predict(row), second.predict(row));
        }
    }

    #[test]
    fn test_constant_targets_predict_the_constant() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets = vec![0.7; 10];

        let mut booster = GradientBoostedRegressor::new().with_n_estimators(5);
        booster.fit(&rows, &targets, &mut seeded_rng(1));
        assert!((booster.predict(&[3.0]) - 0.7).abs() < 1e-6);
    }
}
