//! Model training and evaluation
//!
//! Model catalogue, classification metrics and the comparison pipeline.

pub mod metrics;
pub mod pipeline;
pub mod registry;

pub use metrics::{ClassificationMetrics, ConfusionMatrix};
pub use pipeline::{
    build_ensemble, evaluate_model, evaluate_models, rank, ComparisonReport, EnsembleOutcome,
    ModelFailure, ModelResult, Pipeline, TrainingReport, ENSEMBLE_NAME,
};
pub use registry::{Hyperparams, ModelKind, ModelRegistry, ModelSpec};
