//! Random forest regression surrogate.
//!
//! Each tree is a CART regressor grown on a bootstrap resample of the
//! observations, splitting on the threshold that most reduces the squared
//! error. The predictive mean is the average over trees and the predictive
//! variance is the spread of the tree predictions.

use serde::{Deserialize, Serialize};

use super::{Prediction, SurrogateModel};
use crate::error::{Error, Result};
use crate::types::{Observation, Point};

/// Options of the random forest model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForestConfig {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Minimum number of samples in a leaf.
    pub min_samples_leaf: usize,
    /// Seed of the bootstrap resampling.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 32,
            max_depth: 8,
            min_samples_leaf: 1,
            seed: 0,
        }
    }
}

impl ForestConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::Config("random_forest.n_estimators must be positive".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::Config(
                "random_forest.min_samples_leaf must be positive".into(),
            ));
        }
        Ok(())
    }
}

enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(v) => return *v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }
}

/// Random forest surrogate model.
///
/// # Examples
///
/// ```
/// use boaas::model::{ForestConfig, RandomForest, SurrogateModel};
/// use boaas::Observation;
///
/// let mut forest = RandomForest::new(ForestConfig::default());
/// let history: Vec<Observation> = (0..10)
///     .map(|i| Observation::new(vec![f64::from(i)], f64::from(i), i as u64))
///     .collect();
/// forest.fit(&history).unwrap();
/// let p = forest.predict(&[vec![8.0]])[0];
/// assert!(p.mean > 4.0);
/// ```
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<Node>,
}

impl RandomForest {
    /// Creates an unfitted forest.
    #[must_use]
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    /// Number of fitted trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn grow(&self, x: &[Point], y: &[f64], indices: &mut [usize], depth: usize) -> Node {
        let mean = mean_of(y, indices);
        let leaf = self.config.min_samples_leaf;
        if depth >= self.config.max_depth
            || indices.len() < 2 * leaf
            || indices.iter().all(|&i| (y[i] - mean).abs() < 1e-12)
        {
            return Node::Leaf(mean);
        }

        let Some((feature, threshold)) = best_split(x, y, indices, leaf) else {
            return Node::Leaf(mean);
        };

        // Partition in place: left half holds x[feature] <= threshold.
        let mut mid = 0;
        for k in 0..indices.len() {
            if x[indices[k]][feature] <= threshold {
                indices.swap(k, mid);
                mid += 1;
            }
        }
        let (left, right) = indices.split_at_mut(mid);
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.grow(x, y, left, depth + 1)),
            right: Box::new(self.grow(x, y, right, depth + 1)),
        }
    }
}

impl SurrogateModel for RandomForest {
    fn fit(&mut self, observations: &[Observation]) -> Result<()> {
        self.trees.clear();
        let n = observations.len();
        if n == 0 {
            return Ok(());
        }
        let x: Vec<Point> = observations.iter().map(|o| o.point.clone()).collect();
        let y: Vec<f64> = observations.iter().map(|o| o.value).collect();

        // Fresh generator per fit keeps refits identical.
        let mut rng = fastrand::Rng::with_seed(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            let mut sample: Vec<usize> = (0..n).map(|_| rng.usize(0..n)).collect();
            trees.push(self.grow(&x, &y, &mut sample, 0));
        }
        self.trees = trees;
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, points: &[Point]) -> Vec<Prediction> {
        if self.trees.is_empty() {
            return vec![
                Prediction {
                    mean: 0.0,
                    variance: 0.0
                };
                points.len()
            ];
        }
        let n_trees = self.trees.len() as f64;
        points
            .iter()
            .map(|p| {
                let preds: Vec<f64> = self.trees.iter().map(|t| t.predict(p)).collect();
                let mean = preds.iter().sum::<f64>() / n_trees;
                let variance = preds.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_trees;
                Prediction { mean, variance }
            })
            .collect()
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(y: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

/// Find the `(feature, threshold)` split with the lowest total squared error.
#[allow(clippy::cast_precision_loss)]
fn best_split(x: &[Point], y: &[f64], indices: &[usize], min_leaf: usize) -> Option<(usize, f64)> {
    let n = indices.len();
    let d = x[indices[0]].len();
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<(f64, usize, f64)> = None;
    let mut order: Vec<usize> = indices.to_vec();
    for feature in 0..d {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 1..n {
            let prev = order[k - 1];
            left_sum += y[prev];
            left_sq += y[prev] * y[prev];
            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let lo = x[prev][feature];
            let hi = x[order[k]][feature];
            if hi <= lo {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / k as f64)
                + (right_sq - right_sum * right_sum / (n - k) as f64);
            if sse < parent_sse - 1e-12 && best.is_none_or(|(b, _, _)| sse < b) {
                best = Some((sse, feature, 0.5 * (lo + hi)));
            }
        }
    }
    best.map(|(_, feature, threshold)| (feature, threshold))
}
