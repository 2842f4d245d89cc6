//! Random forest classifier

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::tree::{ClassificationTree, TreeConfig};
use super::{check_prediction_input, check_training_input, Classifier};
use crate::{PredictorError, Result};

/// Random forest configuration
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features per split (sqrt of total if None)
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            min_samples_split: 5,
            max_features: None,
            seed: 42,
        }
    }
}

/// Bagged Gini trees; probabilities are the mean of the trees' leaf
/// distributions.
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<ClassificationTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn bootstrap(n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
        let n_features = check_training_input(features, labels, n_classes)?;
        if self.config.n_trees == 0 {
            return Err(PredictorError::Training(
                "random forest needs at least one tree".to_string(),
            ));
        }

        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize);
        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: 1,
            max_features: Some(max_features),
        };

        let seed = self.config.seed;
        self.trees = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample = Self::bootstrap(features.len(), &mut rng);
                let mut tree = ClassificationTree::new(tree_config.clone());
                tree.fit(features, labels, n_classes, &sample, &mut rng);
                tree
            })
            .collect();

        self.n_classes = n_classes;
        self.n_features = n_features;
        log::debug!(
            "Random forest fitted: {} trees, {} features per split",
            self.trees.len(),
            max_features
        );
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.trees.is_empty() {
            return Err(PredictorError::Training("random forest is not fitted".to_string()));
        }
        check_prediction_input(features, self.n_features)?;

        let n_trees = self.trees.len() as f64;
        Ok(features
            .par_iter()
            .map(|row| {
                let mut proba = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    if let Some(leaf) = tree.predict_proba_row(row) {
                        for (p, v) in proba.iter_mut().zip(leaf) {
                            *p += v / n_trees;
                        }
                    }
                }
                proba
            })
            .collect())
    }

    fn unfitted(&self) -> Box<dyn Classifier> {
        Box::new(RandomForest::new(self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..90 {
            let class = i % 3;
            let jitter = (i / 3) as f64 * 0.01;
            features.push(vec![class as f64 * 5.0 + jitter, jitter, 1.0]);
            labels.push(class);
        }
        (features, labels)
    }

    fn small_forest(seed: u64) -> RandomForest {
        RandomForest::new(ForestConfig {
            n_trees: 15,
            max_depth: 6,
            min_samples_split: 2,
            max_features: None,
            seed,
        })
    }

    #[test]
    fn test_forest_separates_blobs() {
        let (features, labels) = blobs();
        let mut forest = small_forest(42);
        forest.fit(&features, &labels, 3).unwrap();

        assert_eq!(forest.n_trees(), 15);
        let predictions = forest.predict(&features).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(correct as f64 / labels.len() as f64 > 0.95);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (features, labels) = blobs();
        let mut forest = small_forest(7);
        forest.fit(&features, &labels, 3).unwrap();

        for proba in forest.predict_proba(&features).unwrap() {
            assert_eq!(proba.len(), 3);
            assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (features, labels) = blobs();
        let mut a = small_forest(3);
        let mut b = small_forest(3);
        a.fit(&features, &labels, 3).unwrap();
        b.fit(&features, &labels, 3).unwrap();

        let probe = vec![vec![2.5, 0.1, 1.0], vec![7.4, 0.2, 1.0]];
        assert_eq!(a.predict_proba(&probe).unwrap(), b.predict_proba(&probe).unwrap());
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let forest = small_forest(1);
        assert!(forest.predict_proba(&[vec![0.0, 0.0, 0.0]]).is_err());
    }

    #[test]
    fn test_unfitted_copy_is_fresh() {
        let (features, labels) = blobs();
        let mut forest = small_forest(1);
        forest.fit(&features, &labels, 3).unwrap();

        let copy = forest.unfitted();
        assert!(copy.predict_proba(&features).is_err());
    }
}
