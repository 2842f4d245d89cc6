//! Gradient boosted trees with a softmax objective
//!
//! Each round fits one regression tree per class to the gradient of the
//! multi-class log loss. Three variants share the loop:
//! - `FirstOrder`: unit hessians, no leaf penalty
//! - `Newton`: second-order leaves with L2 regularisation
//! - `Histogram`: Newton leaves, splits searched over quantile bins
//!
//! `Newton` and `Histogram` are compiled in by the `newton-boosting` and
//! `histogram-boosting` cargo features.

use rayon::prelude::*;

use super::tree::{FeatureBins, GradientTreeConfig, RegressionTree};
use super::{check_prediction_input, check_training_input, class_distribution, Classifier};
use crate::{PredictorError, Result};

/// Smallest class prior used for the initial scores
const MIN_PRIOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostingVariant {
    FirstOrder,
    #[cfg(feature = "newton-boosting")]
    Newton,
    #[cfg(feature = "histogram-boosting")]
    Histogram,
}

impl BoostingVariant {
    /// Newton leaves: true hessians and an L2 leaf penalty
    fn second_order(self) -> bool {
        self != BoostingVariant::FirstOrder
    }

    /// Splits searched over quantile bins
    fn binned(self) -> bool {
        #[cfg(feature = "histogram-boosting")]
        let binned = self == BoostingVariant::Histogram;
        #[cfg(not(feature = "histogram-boosting"))]
        let binned = false;
        binned
    }
}

/// Boosting configuration
#[derive(Debug, Clone)]
pub struct BoostingConfig {
    /// Boosting rounds
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// L2 penalty on leaf weights (ignored by `FirstOrder`)
    pub l2_regularization: f64,
    /// Bin count per feature (`Histogram` only)
    pub max_bins: usize,
    pub variant: BoostingVariant,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            min_samples_split: 2,
            learning_rate: 0.1,
            l2_regularization: 0.0,
            max_bins: 255,
            variant: BoostingVariant::FirstOrder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    config: BoostingConfig,
    init: Vec<f64>,
    /// One tree per class for each round
    rounds: Vec<Vec<RegressionTree>>,
    n_features: usize,
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.iter().map(|e| e / sum).collect()
}

impl GradientBoosting {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            init: Vec::new(),
            rounds: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    fn tree_config(&self) -> GradientTreeConfig {
        let l2_regularization = if self.config.variant.second_order() {
            self.config.l2_regularization.max(0.0)
        } else {
            0.0
        };
        GradientTreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: 1,
            l2_regularization,
        }
    }

    /// Gradient and hessian of the softmax loss for class `k`
    fn derivatives(&self, proba: &[Vec<f64>], labels: &[usize], k: usize) -> (Vec<f64>, Vec<f64>) {
        proba
            .iter()
            .zip(labels)
            .map(|(p, &label)| {
                let target = if label == k { 1.0 } else { 0.0 };
                let hessian = if self.config.variant.second_order() {
                    (p[k] * (1.0 - p[k])).max(1e-16)
                } else {
                    1.0
                };
                (p[k] - target, hessian)
            })
            .unzip()
    }

    fn raw_scores(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = self.init.clone();
        for round in &self.rounds {
            for (score, tree) in scores.iter_mut().zip(round) {
                *score += self.config.learning_rate * tree.predict_row(row);
            }
        }
        scores
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
        let n_features = check_training_input(features, labels, n_classes)?;
        if self.config.learning_rate.is_nan() || self.config.learning_rate <= 0.0 {
            return Err(PredictorError::Training(format!(
                "learning rate must be positive, got {}",
                self.config.learning_rate
            )));
        }

        let init: Vec<f64> = class_distribution(labels, n_classes)
            .iter()
            .map(|p| p.max(MIN_PRIOR).ln())
            .collect();
        let bins = self
            .config
            .variant
            .binned()
            .then(|| FeatureBins::new(features, self.config.max_bins));
        let tree_config = self.tree_config();

        let mut scores = vec![init.clone(); features.len()];
        let mut rounds = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let proba: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let trees: Vec<RegressionTree> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let (gradients, hessians) = self.derivatives(&proba, labels, k);
                    RegressionTree::fit(features, &gradients, &hessians, &tree_config, bins.as_ref())
                })
                .collect();

            for (row, score) in features.iter().zip(scores.iter_mut()) {
                for (s, tree) in score.iter_mut().zip(&trees) {
                    *s += self.config.learning_rate * tree.predict_row(row);
                }
            }
            rounds.push(trees);
        }

        self.init = init;
        self.rounds = rounds;
        self.n_features = n_features;
        log::debug!(
            "{:?} boosting fitted: {} rounds x {} classes",
            self.config.variant,
            self.rounds.len(),
            n_classes
        );
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.init.is_empty() {
            return Err(PredictorError::Training("boosting model is not fitted".to_string()));
        }
        check_prediction_input(features, self.n_features)?;
        Ok(features.iter().map(|row| softmax(&self.raw_scores(row))).collect())
    }

    fn unfitted(&self) -> Box<dyn Classifier> {
        Box::new(GradientBoosting::new(self.config.clone()))
    }
}
