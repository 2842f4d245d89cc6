//! Model comparison and training runs
//!
//! records -> feature rows -> date split -> fit and score every candidate ->
//! rank -> top-3 soft-voting ensemble.

use serde::Serialize;

use crate::data::{Dataset, DatasetSplitter};
use crate::features::FeatureBuilder;
use crate::model::{Classifier, SoftVotingEnsemble};
use crate::training::metrics::ClassificationMetrics;
use crate::training::registry::ModelRegistry;
use crate::{Config, LabelMode, MatchRecord, PredictorError, Result};

/// Name under which the ensemble is reported
pub const ENSEMBLE_NAME: &str = "Ensemble (Top 3)";

/// Number of ranked models combined by the ensemble
pub const ENSEMBLE_SIZE: usize = 3;

/// Failure messages are cut to this many characters
const MESSAGE_LIMIT: usize = 40;

/// A fitted and scored model
#[derive(Debug)]
pub struct ModelResult {
    pub name: String,
    pub model: Box<dyn Classifier>,
    pub metrics: ClassificationMetrics,
    /// Accuracy minus the baseline
    pub improvement: f64,
}

impl ModelResult {
    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.name.clone(),
            accuracy: self.metrics.accuracy,
            precision: self.metrics.precision,
            recall: self.metrics.recall,
            f1_score: self.metrics.f1_score,
            improvement: self.improvement,
        }
    }
}

/// Serializable view of a [`ModelResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub improvement: f64,
}

/// A candidate dropped from the comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFailure {
    pub name: String,
    /// Error text, truncated
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnsembleOutcome {
    /// The ensemble was scored and appended to the results
    Built { members: Vec<String> },
    Skipped { reason: String },
}

/// Everything `compare` produces
#[derive(Debug)]
pub struct ComparisonReport {
    pub mode: LabelMode,
    pub total_matches: usize,
    pub training_samples: usize,
    pub test_samples: usize,
    pub baseline: f64,
    /// Scored models in evaluation order, ensemble last when built
    pub results: Vec<ModelResult>,
    pub failures: Vec<ModelFailure>,
    pub ensemble: EnsembleOutcome,
}

impl ComparisonReport {
    pub fn ranked(&self) -> Vec<&ModelResult> {
        rank(&self.results)
    }

    pub fn best(&self) -> Option<&ModelResult> {
        self.ranked().into_iter().next()
    }

    pub fn summary(&self) -> ComparisonSummary {
        ComparisonSummary {
            mode: self.mode,
            total_matches: self.total_matches,
            training_samples: self.training_samples,
            test_samples: self.test_samples,
            baseline: self.baseline,
            results: self.results.iter().map(ModelResult::summary).collect(),
            ranking: self.ranked().iter().map(|r| r.name.clone()).collect(),
            failures: self.failures.clone(),
            ensemble: self.ensemble.clone(),
        }
    }
}

/// Serializable view of a [`ComparisonReport`]
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub mode: LabelMode,
    pub total_matches: usize,
    pub training_samples: usize,
    pub test_samples: usize,
    pub baseline: f64,
    pub results: Vec<ModelSummary>,
    /// Result names, best first
    pub ranking: Vec<String>,
    pub failures: Vec<ModelFailure>,
    pub ensemble: EnsembleOutcome,
}

/// Metrics of a single trained model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub model: String,
    pub accuracy: f64,
    pub baseline_accuracy: f64,
    pub improvement_over_baseline: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub training_samples: usize,
    pub test_samples: usize,
}

fn truncate(message: &str) -> String {
    message.chars().take(MESSAGE_LIMIT).collect()
}

/// Truncated cause of a model error, without the error-kind prefix
fn failure_message(error: &PredictorError) -> String {
    match error {
        PredictorError::Training(message) => truncate(message),
        PredictorError::ModelFit { message, .. } => message.clone(),
        other => truncate(&other.to_string()),
    }
}

/// Stable ranking by descending accuracy; ties keep their input order
pub fn rank(results: &[ModelResult]) -> Vec<&ModelResult> {
    let mut ranked: Vec<&ModelResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.accuracy().total_cmp(&a.accuracy()));
    ranked
}

/// Fit on the training split and score on the test split
pub fn evaluate_model(
    name: &str,
    mut model: Box<dyn Classifier>,
    dataset: &Dataset,
    baseline: f64,
) -> Result<ModelResult> {
    let fit_error = |e: PredictorError| PredictorError::ModelFit {
        model: name.to_string(),
        message: failure_message(&e),
    };

    model
        .fit(&dataset.train.features, &dataset.train.labels, dataset.n_classes())
        .map_err(fit_error)?;
    let predictions = model.predict(&dataset.test.features).map_err(fit_error)?;
    let metrics = ClassificationMetrics::compute(&dataset.test.labels, &predictions);

    Ok(ModelResult {
        name: name.to_string(),
        model,
        improvement: metrics.accuracy - baseline,
        metrics,
    })
}

/// Score every available candidate in order. Failing candidates are logged
/// and returned separately; unavailable ones are skipped.
pub fn evaluate_models<'a, I>(
    candidates: I,
    dataset: &Dataset,
    baseline: f64,
) -> (Vec<ModelResult>, Vec<ModelFailure>)
where
    I: IntoIterator<Item = (&'a str, Result<Box<dyn Classifier>>)>,
{
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for (name, candidate) in candidates {
        let outcome = candidate.and_then(|model| evaluate_model(name, model, dataset, baseline));
        match outcome {
            Ok(result) => {
                log::info!(
                    "{:20} | Accuracy: {:.1}% | {:+.1}% over baseline",
                    name,
                    result.accuracy() * 100.0,
                    result.improvement * 100.0
                );
                results.push(result);
            }
            Err(PredictorError::ModelUnavailable(kind)) => {
                log::debug!("Skipping {}: {} not available", name, kind);
            }
            Err(e) => {
                let message = failure_message(&e);
                log::warn!("{:20} | ERROR: {}", name, message);
                failures.push(ModelFailure {
                    name: name.to_string(),
                    message,
                });
            }
        }
    }

    (results, failures)
}

/// Soft-voting ensemble of the top ranked models, refitted from fresh
/// copies on the training split
pub fn build_ensemble(
    results: &[ModelResult],
    dataset: &Dataset,
    baseline: f64,
) -> Result<ModelResult> {
    if results.len() < ENSEMBLE_SIZE {
        return Err(PredictorError::EnsembleConstruction(format!(
            "need {} successful models, got {}",
            ENSEMBLE_SIZE,
            results.len()
        )));
    }

    let members: Vec<(String, Box<dyn Classifier>)> = rank(results)
        .into_iter()
        .take(ENSEMBLE_SIZE)
        .map(|r| (r.name.clone(), r.model.unfitted()))
        .collect();
    let ensemble = SoftVotingEnsemble::new(members)?;

    evaluate_model(ENSEMBLE_NAME, Box::new(ensemble), dataset, baseline).map_err(|e| {
        PredictorError::EnsembleConstruction(match e {
            PredictorError::ModelFit { message, .. } => message,
            other => other.to_string(),
        })
    })
}

/// Feature building, splitting and model runs driven by one [`Config`]
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build features and split them; both partitions must be non-empty
    pub fn prepare(&self, records: &[MatchRecord], mode: LabelMode) -> Result<Dataset> {
        if records.is_empty() {
            return Err(PredictorError::EmptyInput);
        }

        let rows = FeatureBuilder::from_config(&self.config.features).build(records);
        let dataset = DatasetSplitter::new(self.config.split.cutoff).split(&rows, mode)?;
        dataset.ensure_trainable()?;
        Ok(dataset)
    }

    /// Compare the configured models
    pub fn compare_models(
        &self,
        records: &[MatchRecord],
        mode: LabelMode,
    ) -> Result<ComparisonReport> {
        let registry = ModelRegistry::from_specs(&self.config.models);
        self.compare_with(records, mode, &registry)
    }

    /// Compare the models of `registry`
    pub fn compare_with(
        &self,
        records: &[MatchRecord],
        mode: LabelMode,
        registry: &ModelRegistry,
    ) -> Result<ComparisonReport> {
        log::info!("Mode: {}", mode);
        log::info!("Total matches: {}", records.len());

        let dataset = self.prepare(records, mode)?;
        let baseline = dataset.baseline_accuracy()?;
        log::info!("Baseline accuracy (random): {:.1}%", baseline * 100.0);
        log::info!("Testing {} models", registry.len());

        let (mut results, failures) = evaluate_models(registry.iter(), &dataset, baseline);

        let ensemble = match build_ensemble(&results, &dataset, baseline) {
            Ok(result) => {
                log::info!(
                    "{:20} | Accuracy: {:.1}% | {:+.1}% over baseline",
                    result.name,
                    result.accuracy() * 100.0,
                    result.improvement * 100.0
                );
                let members = rank(&results)
                    .iter()
                    .take(ENSEMBLE_SIZE)
                    .map(|r| r.name.clone())
                    .collect();
                results.push(result);
                EnsembleOutcome::Built { members }
            }
            Err(e) => {
                log::warn!("Ensemble failed: {}", e);
                EnsembleOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };

        Ok(ComparisonReport {
            mode,
            total_matches: records.len(),
            training_samples: dataset.train.len(),
            test_samples: dataset.test.len(),
            baseline,
            results,
            failures,
            ensemble,
        })
    }

    /// Train the configured model and report its test metrics
    pub fn train_model(&self, records: &[MatchRecord], mode: LabelMode) -> Result<TrainingReport> {
        let registry = ModelRegistry::from_specs(&self.config.models);
        self.train_with(records, mode, &registry, &self.config.training.model)
    }

    /// Train `model_name` from `registry`
    pub fn train_with(
        &self,
        records: &[MatchRecord],
        mode: LabelMode,
        registry: &ModelRegistry,
        model_name: &str,
    ) -> Result<TrainingReport> {
        if records.is_empty() {
            return Err(PredictorError::EmptyInput);
        }
        log::info!("Found {} matches", records.len());

        let model = registry.build(model_name)?;
        let dataset = self.prepare(records, mode)?;
        let baseline = dataset.baseline_accuracy()?;
        let result = evaluate_model(model_name, model, &dataset, baseline)?;
        log::info!("{} trained: {}", result.name, result.metrics);

        Ok(TrainingReport {
            model: result.name,
            accuracy: result.metrics.accuracy,
            baseline_accuracy: baseline,
            improvement_over_baseline: result.improvement,
            precision: result.metrics.precision,
            recall: result.metrics.recall,
            f1_score: result.metrics.f1_score,
            training_samples: dataset.train.len(),
            test_samples: dataset.test.len(),
        })
    }
}
