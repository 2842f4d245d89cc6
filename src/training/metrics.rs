//! Classification metrics for model evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of (true label, predicted label) pairs
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    /// `counts[true][predicted]`
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &[usize], y_pred: &[usize]) -> Self {
        let n_labels = y_true
            .iter()
            .chain(y_pred)
            .max()
            .map_or(0, |&max| max + 1);
        let mut counts = vec![vec![0; n_labels]; n_labels];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            counts[t][p] += 1;
        }
        ConfusionMatrix { counts }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts
            .get(actual)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn n_labels(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn true_positives(&self, label: usize) -> usize {
        self.get(label, label)
    }

    fn predicted(&self, label: usize) -> usize {
        self.counts.iter().map(|row| row[label]).sum()
    }

    fn support(&self, label: usize) -> usize {
        self.counts[label].iter().sum()
    }

    /// Labels seen as either truth or prediction, ascending
    fn present_labels(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_labels()).filter(|&l| self.support(l) > 0 || self.predicted(l) > 0)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Accuracy plus support-weighted precision, recall and F1.
///
/// Undefined per-label ratios (no predictions, no support) count as zero
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of evaluated samples
    pub support: usize,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &[usize], y_pred: &[usize]) -> Self {
        let matrix = ConfusionMatrix::new(y_true, y_pred);
        Self::from_confusion(&matrix)
    }

    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let total = matrix.total();
        if total == 0 {
            return Self::default();
        }

        let correct: usize = (0..matrix.n_labels()).map(|l| matrix.true_positives(l)).sum();
        let mut metrics = ClassificationMetrics {
            accuracy: ratio(correct, total),
            support: total,
            ..Self::default()
        };

        for label in matrix.present_labels() {
            let tp = matrix.true_positives(label);
            let support = matrix.support(label);
            let precision = ratio(tp, matrix.predicted(label));
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            let weight = ratio(support, total);
            metrics.precision += weight * precision;
            metrics.recall += weight * recall;
            metrics.f1_score += weight * f1;
        }

        metrics
    }
}

impl fmt::Display for ClassificationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acc: {:.1}% | P: {:.1}% | R: {:.1}% | F1: {:.1}%",
            self.accuracy * 100.0,
            self.precision * 100.0,
            self.recall * 100.0,
            self.f1_score * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_perfect_predictions() {
        let m = ClassificationMetrics::compute(&[0, 1, 2, 2], &[0, 1, 2, 2]);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.support, 4);
    }

    #[test]
    fn test_weighted_averages() {
        // label 0: tp=1 pred=2 support=2 -> p=0.5 r=0.5
        // label 1: tp=1 pred=1 support=1 -> p=1 r=1
        // label 2: tp=0 pred=1 support=1 -> p=0 r=0
        let y_true = [0, 0, 1, 2];
        let y_pred = [0, 2, 1, 0];
        let m = ClassificationMetrics::compute(&y_true, &y_pred);

        assert!(close(m.accuracy, 0.5));
        assert!(close(m.precision, 0.5 * 0.5 + 0.25 * 1.0));
        assert!(close(m.recall, 0.5));
        assert!(close(m.f1_score, 0.5 * 0.5 + 0.25 * 1.0));
    }

    #[test]
    fn test_zero_division_counts_as_zero() {
        // Nothing is ever predicted as 1
        let m = ClassificationMetrics::compute(&[1, 1, 0, 0], &[0, 0, 0, 0]);
        assert!(close(m.accuracy, 0.5));
        // label 0: p=0.5 r=1, label 1: p=0 r=0
        assert!(close(m.precision, 0.25));
        assert!(close(m.recall, 0.5));
        assert!(close(m.f1_score, 0.5 * (2.0 * 0.5 / 1.5)));
    }

    #[test]
    fn test_empty_input() {
        let m = ClassificationMetrics::compute(&[], &[]);
        assert_eq!(m, ClassificationMetrics::default());
    }

    #[test]
    fn test_confusion_matrix() {
        let matrix = ConfusionMatrix::new(&[0, 2, 2], &[0, 1, 2]);
        assert_eq!(matrix.n_labels(), 3);
        assert_eq!(matrix.get(2, 1), 1);
        assert_eq!(matrix.get(2, 2), 1);
        assert_eq!(matrix.get(1, 1), 0);
        assert_eq!(matrix.get(5, 0), 0);
        assert_eq!(matrix.total(), 3);
    }
}
