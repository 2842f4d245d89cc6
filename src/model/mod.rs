//! Outcome classifiers
//!
//! Every estimator implements [`Classifier`]:
//! - Random forest: bagged Gini trees
//! - Gradient boosting: softmax boosting over regression trees, with
//!   first-order, Newton and histogram variants
//! - Logistic regression: multinomial, trained with burn autodiff
//! - Soft voting: averaged probabilities of fitted members

pub mod boosting;
pub mod ensemble;
pub mod forest;
pub mod logistic;
pub mod tree;

pub use boosting::{BoostingVariant, GradientBoosting};
pub use ensemble::SoftVotingEnsemble;
pub use forest::RandomForest;
pub use logistic::LogisticRegression;

use std::fmt;

use crate::{PredictorError, Result};

/// A multi-class classifier over dense feature rows
pub trait Classifier: fmt::Debug + Send {
    /// Fit on `features` (one row per sample) and labels in `0..n_classes`
    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()>;

    /// Class probabilities per row, each of length `n_classes`
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;

    /// Most likely class per row
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|p| argmax(p))
            .collect())
    }

    /// Whether [`Classifier::predict_proba`] yields real probabilities.
    /// Soft voting only accepts members that do.
    fn supports_probabilities(&self) -> bool {
        true
    }

    /// A fresh, unfitted copy with the same hyperparameters
    fn unfitted(&self) -> Box<dyn Classifier>;
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Shared input checks for `fit`
pub(crate) fn check_training_input(
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
) -> Result<usize> {
    if features.is_empty() {
        return Err(PredictorError::Training("empty training set".to_string()));
    }
    if features.len() != labels.len() {
        return Err(PredictorError::Training(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if n_classes < 2 {
        return Err(PredictorError::Training(format!(
            "need at least 2 classes, got {}",
            n_classes
        )));
    }
    if let Some(bad) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(PredictorError::Training(format!(
            "label {} out of range for {} classes",
            bad, n_classes
        )));
    }

    let n_features = features[0].len();
    if features.iter().any(|row| row.len() != n_features) {
        return Err(PredictorError::Training("ragged feature rows".to_string()));
    }
    Ok(n_features)
}

/// Shared input checks for prediction
pub(crate) fn check_prediction_input(features: &[Vec<f64>], n_features: usize) -> Result<()> {
    match features.iter().find(|row| row.len() != n_features) {
        Some(row) => Err(PredictorError::Training(format!(
            "expected {} features, got {}",
            n_features,
            row.len()
        ))),
        None => Ok(()),
    }
}

/// Class frequencies of `labels`, normalised to sum to one
pub(crate) fn class_distribution(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for &label in labels {
        counts[label] += 1.0;
    }
    let total = labels.len().max(1) as f64;
    counts.iter().map(|c| c / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), 1);
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_check_training_input() {
        let x = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(check_training_input(&x, &[0, 1], 2).unwrap(), 2);
        assert!(check_training_input(&x, &[0], 2).is_err());
        assert!(check_training_input(&x, &[0, 2], 2).is_err());
        assert!(check_training_input(&[], &[], 2).is_err());
    }

    #[test]
    fn test_class_distribution() {
        let dist = class_distribution(&[0, 2, 2, 2], 3);
        assert_eq!(dist, vec![0.25, 0.0, 0.75]);
    }
}
