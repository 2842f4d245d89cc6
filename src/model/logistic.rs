//! Multinomial logistic regression trained with burn
//!
//! A single zero-initialised `Linear` layer is fitted full-batch with SGD on
//! the softmax cross-entropy of z-scored features. After training the
//! weights are copied out so prediction needs no tensor backend.

use burn::backend::{Autodiff, NdArray};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};

use super::{check_prediction_input, check_training_input, Classifier};
use crate::{PredictorError, Result};

type TrainBackend = Autodiff<NdArray>;

/// Stop once the loss moves less than this between epochs
const TOLERANCE: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct LogisticConfig {
    /// Maximum full-batch epochs
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Inverse of sklearn's `C`: the penalty is `λ/(2n)·‖W‖²`
    pub l2_regularization: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.1,
            l2_regularization: 1.0,
        }
    }
}

/// Per-feature z-score statistics from the training matrix
#[derive(Debug, Clone)]
pub struct FeatureScaling {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl FeatureScaling {
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let dim = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;

        let mut sum = vec![0.0; dim];
        let mut sum_sq = vec![0.0; dim];
        for row in rows {
            for j in 0..dim {
                sum[j] += row[j];
                sum_sq[j] += row[j] * row[j];
            }
        }

        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();
        let std = sum_sq
            .iter()
            .zip(&mean)
            .map(|(sq, m)| (sq / n - m * m).max(0.0).sqrt().max(0.001))
            .collect();

        FeatureScaling { mean, std }
    }

    pub fn apply(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

/// Fitted parameters, row-major `[n_features][n_classes]`
#[derive(Debug, Clone)]
struct Weights {
    weight: Vec<f32>,
    bias: Vec<f32>,
    n_classes: usize,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticConfig,
    scaling: Option<FeatureScaling>,
    weights: Option<Weights>,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            scaling: None,
            weights: None,
        }
    }

    fn to_tensor<B: Backend>(rows: &[Vec<f64>], dim: usize, device: &B::Device) -> Tensor<B, 2> {
        let flat: Vec<f32> = rows.iter().flatten().map(|&x| x as f32).collect();
        Tensor::from_data(TensorData::new(flat, [rows.len(), dim]), device)
    }

    fn one_hot<B: Backend>(labels: &[usize], n_classes: usize, device: &B::Device) -> Tensor<B, 2> {
        let mut flat = vec![0.0f32; labels.len() * n_classes];
        for (i, &label) in labels.iter().enumerate() {
            flat[i * n_classes + label] = 1.0;
        }
        Tensor::from_data(TensorData::new(flat, [labels.len(), n_classes]), device)
    }

    fn train(
        &self,
        scaled: &[Vec<f64>],
        labels: &[usize],
        n_features: usize,
        n_classes: usize,
    ) -> Result<Weights> {
        let device = <TrainBackend as Backend>::Device::default();
        let x = Self::to_tensor::<TrainBackend>(scaled, n_features, &device);
        let y = Self::one_hot::<TrainBackend>(labels, n_classes, &device);
        let penalty = (self.config.l2_regularization / (2.0 * scaled.len() as f64)) as f32;

        let mut model: Linear<TrainBackend> = LinearConfig::new(n_features, n_classes)
            .with_initializer(Initializer::Zeros)
            .init(&device);
        let mut optimizer = SgdConfig::new().init::<TrainBackend, Linear<TrainBackend>>();

        let mut previous = f32::INFINITY;
        for epoch in 0..self.config.max_iter {
            let log_probs = log_softmax(model.forward(x.clone()), 1);
            let data_loss = (log_probs * y.clone()).sum_dim(1).mean().neg();
            let l2 = model.weight.val().powf_scalar(2.0).sum().mul_scalar(penalty);
            let loss = data_loss + l2;
            let loss_val: f32 = loss.clone().into_scalar().elem();

            if !loss_val.is_finite() {
                return Err(PredictorError::Training(format!(
                    "loss diverged at epoch {}",
                    epoch + 1
                )));
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(self.config.learning_rate, model, grads);

            if epoch % 100 == 0 {
                log::debug!("Epoch {}: loss={:.5}", epoch + 1, loss_val);
            }
            if (previous - loss_val).abs() < TOLERANCE {
                log::debug!("Converged after {} epochs (loss={:.5})", epoch + 1, loss_val);
                break;
            }
            previous = loss_val;
        }

        let to_vec = |data: TensorData| {
            data.to_vec::<f32>()
                .map_err(|e| PredictorError::Training(format!("weight export failed: {:?}", e)))
        };
        let weight = to_vec(model.weight.val().into_data())?;
        let bias = match &model.bias {
            Some(bias) => to_vec(bias.val().into_data())?,
            None => vec![0.0; n_classes],
        };

        Ok(Weights {
            weight,
            bias,
            n_classes,
        })
    }
}

impl Weights {
    fn proba(&self, row: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = (0..self.n_classes)
            .map(|k| {
                row.iter()
                    .enumerate()
                    .map(|(j, x)| x * self.weight[j * self.n_classes + k] as f64)
                    .sum::<f64>()
                    + self.bias[k] as f64
            })
            .collect();

        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exp.iter().sum();
        exp.iter().map(|e| e / sum).collect()
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
        let n_features = check_training_input(features, labels, n_classes)?;

        let scaling = FeatureScaling::from_rows(features);
        let scaled: Vec<Vec<f64>> = features.iter().map(|row| scaling.apply(row)).collect();
        let weights = self.train(&scaled, labels, n_features, n_classes)?;

        self.scaling = Some(scaling);
        self.weights = Some(weights);
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let (Some(scaling), Some(weights)) = (&self.scaling, &self.weights) else {
            return Err(PredictorError::Training(
                "logistic regression is not fitted".to_string(),
            ));
        };
        check_prediction_input(features, scaling.mean.len())?;

        Ok(features
            .iter()
            .map(|row| weights.proba(&scaling.apply(row)))
            .collect())
    }

    fn unfitted(&self) -> Box<dyn Classifier> {
        Box::new(LogisticRegression::new(self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_scaling() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaling = FeatureScaling::from_rows(&rows);
        assert_eq!(scaling.mean, vec![2.0, 5.0]);
        assert!((scaling.std[0] - 1.0).abs() < 1e-12);
        // Constant columns keep a floor so scaling stays finite
        assert_eq!(scaling.std[1], 0.001);
        assert_eq!(scaling.apply(&[3.0, 5.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn test_learns_linear_boundary() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, 1.0]).collect();
        let labels: Vec<usize> = (0..40).map(|i| usize::from(i >= 20)).collect();

        let mut model = LogisticRegression::new(LogisticConfig {
            max_iter: 300,
            ..LogisticConfig::default()
        });
        model.fit(&features, &labels, 2).unwrap();

        assert_eq!(model.predict(&[vec![2.0, 1.0], vec![37.0, 1.0]]).unwrap(), vec![0, 1]);
        let proba = model.predict_proba(&[vec![37.0, 1.0]]).unwrap();
        assert!(proba[0][1] > 0.8);
        assert!((proba[0].iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_three_classes() {
        let features: Vec<Vec<f64>> = (0..60).map(|i| vec![(i / 20) as f64 * 3.0]).collect();
        let labels: Vec<usize> = (0..60).map(|i| i / 20).collect();

        let mut model = LogisticRegression::new(LogisticConfig::default());
        model.fit(&features, &labels, 3).unwrap();

        let predictions = model.predict(&[vec![0.0], vec![3.0], vec![6.0]]).unwrap();
        assert_eq!(predictions, vec![0, 1, 2]);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = LogisticRegression::new(LogisticConfig::default());
        assert!(model.predict_proba(&[vec![1.0]]).is_err());
    }
}
