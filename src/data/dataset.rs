//! Date-based train/test split of feature rows
//!
//! Rows dated before the cutoff train the models, rows on or after it test
//! them. Rows are never shuffled across the boundary.

use chrono::NaiveDate;

use crate::features::FeatureRow;
use crate::{LabelMode, PredictorError, Result};

/// Feature matrix and labels for one side of the split
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    /// One row per sample, columns as in [`FeatureRow::COLUMNS`]
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub dates: Vec<NaiveDate>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn push(&mut self, row: &FeatureRow, mode: LabelMode) {
        // Missing predictors are filled with zero here, not at build time
        let features = row
            .predictors()
            .iter()
            .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
            .collect();
        self.features.push(features);
        self.labels.push(mode.label(row.outcome));
        self.dates.push(row.date);
    }

    /// Distinct labels, ascending
    pub fn distinct_labels(&self) -> Vec<usize> {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// Train and test samples for one run
#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Samples,
    pub test: Samples,
    pub mode: LabelMode,
    pub cutoff: NaiveDate,
}

impl Dataset {
    /// Number of classes models must handle
    pub fn n_classes(&self) -> usize {
        self.mode.n_classes()
    }

    /// Accuracy of uniform random guessing: 0.5 for binary labels, otherwise
    /// one over the number of distinct labels in the test set.
    pub fn baseline_accuracy(&self) -> Result<f64> {
        match self.mode {
            LabelMode::Binary => Ok(0.5),
            LabelMode::ThreeWay => {
                let k = self.test.distinct_labels().len();
                if k == 0 {
                    return Err(PredictorError::InsufficientData(
                        "test set is empty, no baseline".to_string(),
                    ));
                }
                Ok(1.0 / k as f64)
            }
        }
    }

    /// Check both partitions can be used for training and evaluation
    pub fn ensure_trainable(&self) -> Result<()> {
        if self.train.is_empty() {
            return Err(PredictorError::InsufficientData(format!(
                "no training rows dated before {}",
                self.cutoff
            )));
        }
        if self.test.is_empty() {
            return Err(PredictorError::InsufficientData(format!(
                "no test rows dated on or after {}",
                self.cutoff
            )));
        }
        Ok(())
    }
}

/// Splits feature rows at a fixed calendar date
#[derive(Debug, Clone, Copy)]
pub struct DatasetSplitter {
    cutoff: NaiveDate,
}

impl DatasetSplitter {
    pub fn new(cutoff: NaiveDate) -> Self {
        DatasetSplitter { cutoff }
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn split(&self, rows: &[FeatureRow], mode: LabelMode) -> Result<Dataset> {
        if rows.is_empty() {
            return Err(PredictorError::NoData(
                "feature table is empty (every team needs more matches than the window)"
                    .to_string(),
            ));
        }

        let mut train = Samples::default();
        let mut test = Samples::default();
        for row in rows {
            if row.date < self.cutoff {
                train.push(row, mode);
            } else {
                test.push(row, mode);
            }
        }

        log::info!(
            "Split {} rows at {}: train={}, test={}",
            rows.len(),
            self.cutoff,
            train.len(),
            test.len()
        );

        Ok(Dataset {
            train,
            test,
            mode,
            cutoff: self.cutoff,
        })
    }
}
