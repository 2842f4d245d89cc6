//! Model catalogue
//!
//! Candidate models are declared as [`ModelSpec`]s in the config file. The
//! [`ModelRegistry`] turns them into factories, leaving out kinds that are
//! not compiled into this build.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::boosting::BoostingConfig;
use crate::model::forest::ForestConfig;
use crate::model::logistic::LogisticConfig;
use crate::model::{BoostingVariant, Classifier, GradientBoosting, LogisticRegression, RandomForest};
use crate::{PredictorError, Result};

/// Estimator families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    LogisticRegression,
    /// Second-order boosting with L2 leaves (cargo feature `newton-boosting`)
    NewtonBoosting,
    /// Histogram boosting (cargo feature `histogram-boosting`)
    HistGradientBoosting,
}

impl ModelKind {
    /// Whether this build can construct the model
    pub fn is_available(&self) -> bool {
        match self {
            ModelKind::RandomForest
            | ModelKind::GradientBoosting
            | ModelKind::LogisticRegression => true,
            ModelKind::NewtonBoosting => cfg!(feature = "newton-boosting"),
            ModelKind::HistGradientBoosting => cfg!(feature = "histogram-boosting"),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Declarative hyperparameters. Each model kind reads the fields it uses
/// and ignores the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    /// Trees in a forest, or boosting rounds
    pub n_estimators: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples needed to split a tree node
    pub min_samples_split: usize,
    /// Boosting shrinkage, or the SGD step size for logistic regression
    pub learning_rate: f64,
    /// L2 penalty on boosting leaf weights or logistic regression weights
    pub l2_regularization: f64,
    /// Quantile bins per feature for histogram boosting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bins: Option<usize>,
    /// Maximum training epochs for logistic regression
    pub max_iter: usize,
    /// Seed for stochastic estimators
    pub seed: u64,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            min_samples_split: 2,
            learning_rate: 0.1,
            l2_regularization: 0.0,
            max_bins: None,
            max_iter: 100,
            seed: 42,
        }
    }
}

/// A named candidate model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub kind: ModelKind,
    #[serde(default)]
    pub params: Hyperparams,
}

impl ModelSpec {
    pub fn new(name: &str, kind: ModelKind, params: Hyperparams) -> Self {
        Self {
            name: name.to_string(),
            kind,
            params,
        }
    }

    /// The default comparison line-up
    pub fn defaults() -> Vec<ModelSpec> {
        vec![
            ModelSpec::new(
                "RandomForest",
                ModelKind::RandomForest,
                Hyperparams {
                    n_estimators: 200,
                    max_depth: 15,
                    min_samples_split: 5,
                    ..Hyperparams::default()
                },
            ),
            ModelSpec::new(
                "GradientBoosting",
                ModelKind::GradientBoosting,
                Hyperparams::default(),
            ),
            ModelSpec::new(
                "LogisticRegression",
                ModelKind::LogisticRegression,
                Hyperparams {
                    l2_regularization: 1.0,
                    max_iter: 1000,
                    ..Hyperparams::default()
                },
            ),
            ModelSpec::new(
                "NewtonBoosting",
                ModelKind::NewtonBoosting,
                Hyperparams {
                    n_estimators: 200,
                    max_depth: 6,
                    l2_regularization: 1.0,
                    ..Hyperparams::default()
                },
            ),
            ModelSpec::new(
                "HistGradientBoosting",
                ModelKind::HistGradientBoosting,
                Hyperparams {
                    n_estimators: 200,
                    max_depth: 6,
                    max_bins: Some(255),
                    ..Hyperparams::default()
                },
            ),
        ]
    }

    /// Build an unfitted model
    pub fn build(&self) -> Result<Box<dyn Classifier>> {
        if !self.kind.is_available() {
            return Err(PredictorError::ModelUnavailable(self.kind.to_string()));
        }

        let p = &self.params;
        let boosting = |variant| BoostingConfig {
            n_estimators: p.n_estimators,
            max_depth: p.max_depth,
            min_samples_split: p.min_samples_split,
            learning_rate: p.learning_rate,
            l2_regularization: p.l2_regularization,
            max_bins: p.max_bins.unwrap_or(255),
            variant,
        };

        let model: Box<dyn Classifier> = match self.kind {
            ModelKind::RandomForest => Box::new(RandomForest::new(ForestConfig {
                n_trees: p.n_estimators,
                max_depth: p.max_depth,
                min_samples_split: p.min_samples_split,
                max_features: None,
                seed: p.seed,
            })),
            ModelKind::GradientBoosting => {
                Box::new(GradientBoosting::new(boosting(BoostingVariant::FirstOrder)))
            }
            #[cfg(feature = "newton-boosting")]
            ModelKind::NewtonBoosting => {
                Box::new(GradientBoosting::new(boosting(BoostingVariant::Newton)))
            }
            #[cfg(feature = "histogram-boosting")]
            ModelKind::HistGradientBoosting => {
                Box::new(GradientBoosting::new(boosting(BoostingVariant::Histogram)))
            }
            ModelKind::LogisticRegression => Box::new(LogisticRegression::new(LogisticConfig {
                max_iter: p.max_iter,
                learning_rate: p.learning_rate,
                l2_regularization: p.l2_regularization,
            })),
            #[allow(unreachable_patterns)]
            _ => return Err(PredictorError::ModelUnavailable(self.kind.to_string())),
        };
        Ok(model)
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Classifier>> + Send + Sync>;

/// Ordered name to factory mapping of the models this build can run
#[derive(Default)]
pub struct ModelRegistry {
    entries: Vec<(String, Factory)>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every available spec, in order
    pub fn from_specs(specs: &[ModelSpec]) -> Self {
        let mut registry = Self::new();
        for spec in specs {
            if !spec.kind.is_available() {
                log::debug!("Skipping {}: {} is not available", spec.name, spec.kind);
                continue;
            }
            let name = spec.name.clone();
            let spec = spec.clone();
            registry.register(&name, move || spec.build());
        }
        registry
    }

    /// Add a factory. A later registration under the same name replaces the
    /// earlier one but keeps its position.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn Classifier>> + Send + Sync + 'static,
    {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = Box::new(factory),
            None => self.entries.push((name.to_string(), Box::new(factory))),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh model by name (case-insensitive)
    pub fn build(&self, name: &str) -> Result<Box<dyn Classifier>> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, factory)| factory())
            .unwrap_or_else(|| Err(PredictorError::UnknownModel(name.to_string())))
    }

    /// Iterate names with their factory output, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Result<Box<dyn Classifier>>)> + '_ {
        self.entries
            .iter()
            .map(|(name, factory)| (name.as_str(), factory()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ConstantClassifier;

    #[test]
    fn test_defaults_cover_reference_lineup() {
        let specs = ModelSpec::defaults();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "RandomForest",
                "GradientBoosting",
                "LogisticRegression",
                "NewtonBoosting",
                "HistGradientBoosting"
            ]
        );
        assert_eq!(specs[0].params.n_estimators, 200);
        assert_eq!(specs[0].params.max_depth, 15);
        assert_eq!(specs[0].params.min_samples_split, 5);
        assert_eq!(specs[2].params.max_iter, 1000);
        assert_eq!(specs[4].params.max_bins, Some(255));
    }

    #[test]
    fn test_registry_keeps_spec_order() {
        let registry = ModelRegistry::from_specs(&ModelSpec::defaults());
        let names = registry.names();
        assert_eq!(&names[..3], &["RandomForest", "GradientBoosting", "LogisticRegression"]);
        assert_eq!(
            names.len(),
            ModelSpec::defaults()
                .iter()
                .filter(|s| s.kind.is_available())
                .count()
        );
    }

    #[test]
    fn test_core_kinds_always_available() {
        assert!(ModelKind::RandomForest.is_available());
        assert!(ModelKind::GradientBoosting.is_available());
        assert!(ModelKind::LogisticRegression.is_available());
        assert_eq!(
            ModelKind::NewtonBoosting.is_available(),
            cfg!(feature = "newton-boosting")
        );
    }

    #[test]
    fn test_build_follows_compiled_engines() {
        for spec in ModelSpec::defaults() {
            match spec.build() {
                Ok(_) => assert!(spec.kind.is_available(), "{} built", spec.kind),
                Err(PredictorError::ModelUnavailable(kind)) => {
                    assert!(!spec.kind.is_available());
                    assert_eq!(kind, spec.kind.to_string());
                }
                Err(e) => panic!("unexpected error for {}: {}", spec.kind, e),
            }
        }
    }

    #[test]
    fn test_build_by_name() {
        let registry = ModelRegistry::from_specs(&ModelSpec::defaults());
        assert!(registry.build("randomforest").is_ok());
        assert!(matches!(
            registry.build("XGBoost"),
            Err(PredictorError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = ModelRegistry::new();
        registry.register("a", || Ok(Box::new(ConstantClassifier::new(vec![1.0, 0.0]))));
        registry.register("b", || Ok(Box::new(ConstantClassifier::new(vec![0.0, 1.0]))));
        registry.register("a", || Ok(Box::new(ConstantClassifier::new(vec![0.5, 0.5]))));

        assert_eq!(registry.names(), vec!["a", "b"]);
        let model = registry.build("a").unwrap();
        assert_eq!(model.predict_proba(&[vec![0.0]]).unwrap(), vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn test_params_default_when_omitted() {
        let spec: ModelSpec = toml::from_str(
            r#"
            name = "Quick"
            kind = "GradientBoosting"

            [params]
            n_estimators = 10
            "#,
        )
        .unwrap();
        assert_eq!(spec.params.n_estimators, 10);
        assert_eq!(spec.params.learning_rate, 0.1);
        assert_eq!(spec.params.seed, 42);
    }
}
