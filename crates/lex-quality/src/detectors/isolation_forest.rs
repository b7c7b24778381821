//! Isolation forest outlier model.
//!
//! Random partitioning trees over a subsample of the feature matrix; points
//! that separate from the bulk after few splits get a high anomaly score.
//! Every tree draws from its own generator, seeded from a master generator,
//! so a fixed seed always reproduces the same forest.

use crate::error::{QualityError, Result};
use crate::pipeline::CancellationToken;
use crate::utils::quantile_linear;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Dense row-major matrix of feature values, with no missing entries.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_rows: usize,
    n_cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build a matrix from equally sized rows.
    ///
    /// Returns `None` if the rows have different lengths.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != n_cols) {
            return None;
        }
        let n_rows = rows.len();
        let values = rows.into_iter().flatten().collect();
        Some(Self {
            n_rows,
            n_cols,
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.values[idx * self.n_cols..(idx + 1) * self.n_cols]
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.n_cols + col]
    }
}

/// Narrow seam around the stochastic outlier model.
///
/// Implementations return one label per matrix row, `true` meaning
/// anomalous. They must be deterministic for a given `(features,
/// contamination, seed)`.
pub trait AnomalyModel: Send + Sync {
    fn fit_predict(
        &self,
        features: &FeatureMatrix,
        contamination: f64,
        seed: u64,
    ) -> Result<Vec<bool>>;
}

/// Isolation forest with a fixed tree count and subsample cap.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    estimator_count: usize,
    max_samples: usize,
    cancellation: Option<CancellationToken>,
}

impl IsolationForest {
    pub fn new(estimator_count: usize, max_samples: usize) -> Self {
        Self {
            estimator_count,
            max_samples,
            cancellation: None,
        }
    }

    /// Stop fitting between trees once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Grow the forest on `features`.
    pub fn fit(&self, features: &FeatureMatrix, seed: u64) -> Result<FittedForest> {
        if self.estimator_count == 0 || self.max_samples == 0 {
            return Err(QualityError::Internal(
                "isolation forest needs at least one tree and one sample".to_string(),
            ));
        }

        let sample_size = self.max_samples.min(features.n_rows());
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut master = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(self.estimator_count);
        for i in 0..self.estimator_count {
            if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(QualityError::Cancelled);
            }

            let mut rng = StdRng::seed_from_u64(master.next_u64());
            let sample =
                rand::seq::index::sample(&mut rng, features.n_rows(), sample_size).into_vec();
            trees.push(IsolationTree::grow(features, sample, height_limit, &mut rng));

            if i % 25 == 0 {
                debug!("Built isolation tree {}/{}", i + 1, self.estimator_count);
            }
        }

        Ok(FittedForest { trees, sample_size })
    }
}

impl AnomalyModel for IsolationForest {
    fn fit_predict(
        &self,
        features: &FeatureMatrix,
        contamination: f64,
        seed: u64,
    ) -> Result<Vec<bool>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let forest = self.fit(features, seed)?;
        let scores: Vec<f64> = (0..features.n_rows())
            .map(|i| forest.score(features.row(i)))
            .collect();

        let mut sorted = scores.clone();
        sorted.sort_by(f64::total_cmp);
        let threshold = quantile_linear(&sorted, 1.0 - contamination)
            .ok_or_else(|| QualityError::Internal("no anomaly scores to threshold".to_string()))?;

        debug!("Isolation forest threshold: {:.4}", threshold);
        Ok(scores.into_iter().map(|s| s > threshold).collect())
    }
}

/// A grown forest, able to score feature vectors.
#[derive(Debug, Clone)]
pub struct FittedForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl FittedForest {
    /// Anomaly score in (0, 1]; higher means easier to isolate.
    pub fn score(&self, point: &[f64]) -> f64 {
        let normalizer = average_path_length(self.sample_size);
        if normalizer == 0.0 || self.trees.is_empty() {
            return 0.5;
        }
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_depth / normalizer)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One isolation tree, stored as a node arena with the root at index 0.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(
        features: &FeatureMatrix,
        sample: Vec<usize>,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(features, sample, 0, height_limit, rng);
        tree
    }

    fn build(
        &mut self,
        features: &FeatureMatrix,
        rows: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= height_limit || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it.
        let candidates: Vec<(usize, f64, f64)> = (0..features.n_cols())
            .filter_map(|col| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = features.get(r, col);
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((col, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = split_threshold(lo, hi, rng.gen_range(0.0..1.0));

        // threshold lies in [lo, hi), so both sides are non-empty
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| features.get(r, feature) <= threshold);

        let left = self.build(features, left_rows, depth + 1, height_limit, rng);
        let right = self.build(features, right_rows, depth + 1, height_limit, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Point at fraction `u` of `[lo, hi)`.
///
/// Interpolates instead of sampling `lo..hi` directly, since `hi - lo` can
/// overflow to infinity for finite extremes. Rounding is clamped back into
/// `[lo, hi)`.
fn split_threshold(lo: f64, hi: f64, u: f64) -> f64 {
    let t = lo * (1.0 - u) + hi * u;
    if t >= hi { lo } else { t.max(lo) }
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` points; normalizes isolation depths.
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_outlier() -> FeatureMatrix {
        let mut rows: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.1;
                vec![100.0 + jitter, 50.0 - jitter]
            })
            .collect();
        rows.push(vec![5_000.0, -800.0]);
        FeatureMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_feature_matrix_rejects_ragged_rows() {
        assert!(FeatureMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_none());
        let m = FeatureMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.n_cols(), 2);
        assert_eq!(m.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244).abs() < 0.01, "c(256) = {c256}");
    }

    #[test]
    fn test_outlier_scores_higher_than_inliers() {
        let features = clustered_with_outlier();
        let forest = IsolationForest::new(100, 256).fit(&features, 42).unwrap();
        let outlier = forest.score(features.row(60));
        let inlier = forest.score(features.row(3));
        assert!(outlier > inlier, "outlier {outlier} <= inlier {inlier}");
        assert!(outlier > 0.5);
        assert_eq!(forest.tree_count(), 100);
    }

    #[test]
    fn test_fit_predict_flags_the_isolated_point() {
        let features = clustered_with_outlier();
        let labels = IsolationForest::new(100, 256)
            .fit_predict(&features, 0.01, 42)
            .unwrap();
        assert_eq!(labels.len(), 61);
        assert!(labels[60]);
    }

    #[test]
    fn test_fit_predict_is_deterministic() {
        let features = clustered_with_outlier();
        let model = IsolationForest::new(50, 32);
        let first = model.fit_predict(&features, 0.1, 7).unwrap();
        let second = model.fit_predict(&features, 0.1, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_constant_features_flag_nothing() {
        let features = FeatureMatrix::from_rows(vec![vec![1.0, 1.0]; 20]).unwrap();
        let labels = IsolationForest::new(10, 256)
            .fit_predict(&features, 0.2, 1)
            .unwrap();
        assert!(labels.iter().all(|&l| !l));
    }

    #[test]
    fn test_single_row_is_never_anomalous() {
        let features = FeatureMatrix::from_rows(vec![vec![3.0, 4.0]]).unwrap();
        let labels = IsolationForest::new(10, 256)
            .fit_predict(&features, 0.5, 1)
            .unwrap();
        assert_eq!(labels, vec![false]);
    }

    #[test]
    fn test_split_threshold_stays_in_range() {
        assert_eq!(split_threshold(0.0, 10.0, 0.0), 0.0);
        assert_eq!(split_threshold(0.0, 10.0, 0.5), 5.0);
        let t = split_threshold(-f64::MAX, f64::MAX, 0.75);
        assert!(t.is_finite());
        assert!(t > 0.0 && t < f64::MAX);
        // rounding up to `hi` falls back to `lo`
        assert_eq!(split_threshold(1.0, 2.0, 1.0), 1.0);
    }

    #[test]
    fn test_extreme_finite_features_do_not_overflow() {
        let features =
            FeatureMatrix::from_rows(vec![vec![-1e308], vec![1e308], vec![0.0], vec![1.0]])
                .unwrap();
        let labels = IsolationForest::new(50, 256)
            .fit_predict(&features, 0.25, 42)
            .unwrap();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_cancelled_fit() {
        let token = CancellationToken::new();
        token.cancel();
        let err = IsolationForest::new(10, 256)
            .with_cancellation(token)
            .fit(&clustered_with_outlier(), 42)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
