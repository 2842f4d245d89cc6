//! Soft-voting ensemble
//!
//! Members are fitted independently on the same data and the ensemble
//! predicts the class with the highest mean probability.

use super::Classifier;
use crate::{PredictorError, Result};

#[derive(Debug)]
pub struct SoftVotingEnsemble {
    members: Vec<(String, Box<dyn Classifier>)>,
    n_classes: usize,
}

impl SoftVotingEnsemble {
    /// Build from named members. Every member must produce probabilities.
    pub fn new(members: Vec<(String, Box<dyn Classifier>)>) -> Result<Self> {
        if members.is_empty() {
            return Err(PredictorError::EnsembleConstruction(
                "no members to combine".to_string(),
            ));
        }
        if let Some((name, _)) = members.iter().find(|(_, m)| !m.supports_probabilities()) {
            return Err(PredictorError::EnsembleConstruction(format!(
                "{} does not produce class probabilities",
                name
            )));
        }
        Ok(Self {
            members,
            n_classes: 0,
        })
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Classifier for SoftVotingEnsemble {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
        for (name, member) in &mut self.members {
            log::debug!("Fitting ensemble member {}", name);
            member.fit(features, labels, n_classes)?;
        }
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.n_classes == 0 {
            return Err(PredictorError::Training("ensemble is not fitted".to_string()));
        }

        let weight = 1.0 / self.members.len() as f64;
        let mut mean = vec![vec![0.0; self.n_classes]; features.len()];
        for (_, member) in &self.members {
            let proba = member.predict_proba(features)?;
            for (acc, p) in mean.iter_mut().zip(&proba) {
                for (a, v) in acc.iter_mut().zip(p) {
                    *a += v * weight;
                }
            }
        }
        Ok(mean)
    }

    fn unfitted(&self) -> Box<dyn Classifier> {
        Box::new(Self {
            members: self
                .members
                .iter()
                .map(|(name, m)| (name.clone(), m.unfitted()))
                .collect(),
            n_classes: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConstantClassifier, FailingClassifier};

    fn member(name: &str, proba: Vec<f64>) -> (String, Box<dyn Classifier>) {
        (name.to_string(), Box::new(ConstantClassifier::new(proba)))
    }

    #[test]
    fn test_averages_member_probabilities() {
        let mut ensemble = SoftVotingEnsemble::new(vec![
            member("a", vec![0.6, 0.1, 0.3]),
            member("b", vec![0.0, 0.5, 0.5]),
            member("c", vec![0.3, 0.3, 0.4]),
        ])
        .unwrap();
        ensemble.fit(&[vec![0.0]], &[0], 3).unwrap();

        let proba = ensemble.predict_proba(&[vec![1.0]]).unwrap();
        assert!((proba[0][0] - 0.3).abs() < 1e-12);
        assert!((proba[0][1] - 0.3).abs() < 1e-12);
        assert!((proba[0][2] - 0.4).abs() < 1e-12);
        // No single member's argmax decides the vote
        assert_eq!(ensemble.predict(&[vec![1.0]]).unwrap(), vec![2]);
    }

    #[test]
    fn test_rejects_members_without_probabilities() {
        let mut hard = ConstantClassifier::new(vec![1.0, 0.0]);
        hard.probabilities = false;
        let result = SoftVotingEnsemble::new(vec![
            member("a", vec![0.5, 0.5]),
            ("hard".to_string(), Box::new(hard)),
        ]);
        match result {
            Err(PredictorError::EnsembleConstruction(msg)) => assert!(msg.contains("hard")),
            other => panic!("expected construction error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_ensemble_is_rejected() {
        assert!(SoftVotingEnsemble::new(Vec::new()).is_err());
    }

    #[test]
    fn test_member_failure_propagates() {
        let mut ensemble = SoftVotingEnsemble::new(vec![
            member("a", vec![0.5, 0.5]),
            ("broken".to_string(), Box::new(FailingClassifier)),
        ])
        .unwrap();
        assert!(ensemble.fit(&[vec![0.0]], &[0], 2).is_err());
    }

    #[test]
    fn test_unfitted_keeps_members() {
        let ensemble =
            SoftVotingEnsemble::new(vec![member("a", vec![1.0, 0.0]), member("b", vec![0.0, 1.0])])
                .unwrap();
        let copy = ensemble.unfitted();
        assert!(copy.predict_proba(&[vec![0.0]]).is_err());
        assert_eq!(ensemble.member_names(), vec!["a", "b"]);
        assert_eq!(ensemble.len(), 2);
    }
}
