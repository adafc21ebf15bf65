use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureRow;
use crate::predictor::is_positive;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("{features} feature rows but {labels} labels")]
    LabelCount { features: usize, labels: usize },
    #[error("cannot train on an empty dataset")]
    EmptyDataset,
    #[error("training labels contain a single class")]
    SingleClass,
    #[error("model fit failed: {0}")]
    Fit(String),
    #[error("feature values are out of range: the model score is not a number")]
    NonFinite,
}

/// Fitted binary classifier. Class 1 is heart failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Model {
    Logistic(LogisticModel),
    Stump(DecisionStump),
    Forest(RandomForest),
}

impl Model {
    pub fn kind(&self) -> &'static str {
        match self {
            Model::Logistic(_) => "LogisticRegression",
            Model::Stump(_) => "DecisionTree",
            Model::Forest(_) => "RandomForestClassifier",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Model::Logistic(m) => m.weights.len(),
            Model::Stump(m) => m.n_features,
            Model::Forest(m) => m.n_features,
        }
    }

    /// Probability of class 1.
    pub fn predict_proba(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        if row.dim() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                actual: row.dim(),
            });
        }
        let probability = match self {
            Model::Logistic(m) => m.probability(row),
            Model::Stump(m) => m.probability(row),
            Model::Forest(m) => m.probability(row),
        };
        if !probability.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(probability)
    }

    /// Hard class label, 1 when `predict_proba` clears the decision threshold.
    pub fn predict(&self, row: &FeatureRow) -> Result<u8, ModelError> {
        Ok(u8::from(is_positive(self.predict_proba(row)?)))
    }

    /// Accuracy over a dense feature matrix.
    pub fn score(&self, x: &Array2<f64>, y: &[u8]) -> Result<f64, ModelError> {
        check_shape(x, y)?;
        let mut correct = 0usize;
        for (row, &label) in x.rows().into_iter().zip(y) {
            if self.predict(&FeatureRow::from_dense(row))? == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / y.len() as f64)
    }
}

fn check_shape(x: &Array2<f64>, y: &[u8]) -> Result<(), ModelError> {
    if x.nrows() != y.len() {
        return Err(ModelError::LabelCount {
            features: x.nrows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    Ok(())
}

fn check_training_set(x: &Array2<f64>, y: &[u8]) -> Result<usize, ModelError> {
    check_shape(x, y)?;
    let positives = y.iter().filter(|&&label| label == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(ModelError::SingleClass);
    }
    Ok(positives)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Logistic regression reduced to its fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    intercept: f64,
    weights: Vec<f64>,
}

impl LogisticModel {
    pub fn new(intercept: f64, weights: Vec<f64>) -> Self {
        Self { intercept, weights }
    }

    pub fn train(x: &Array2<f64>, y: &[u8]) -> Result<Self, ModelError> {
        check_training_set(x, y)?;
        let targets: Array1<i32> = y.iter().map(|&label| i32::from(label)).collect();
        let ds = Dataset::new(x.clone(), targets);
        let fitted = LogisticRegression::default()
            .fit(&ds)
            .map_err(|e| ModelError::Fit(e.to_string()))?;

        let mut model = Self {
            intercept: fitted.intercept(),
            weights: fitted.params().to_vec(),
        };

        // The fitted probability refers to whichever class linfa treats as
        // positive; flip the parameters if that is class 0.
        let probabilities = fitted.predict_probabilities(x);
        let predicted: Array1<i32> = fitted.predict(x);
        let positive_is_zero = probabilities
            .iter()
            .zip(predicted.iter())
            .find_map(|(&p, &label)| {
                if p > 0.5 {
                    Some(label == 0)
                } else if p < 0.5 {
                    Some(label == 1)
                } else {
                    None
                }
            })
            .unwrap_or(false);
        if positive_is_zero {
            model.intercept = -model.intercept;
            model.weights.iter_mut().for_each(|w| *w = -*w);
        }
        Ok(model)
    }

    fn probability(&self, row: &FeatureRow) -> f64 {
        let z: f64 = self.intercept
            + row
                .iter()
                .map(|(index, x)| self.weights[index] * x)
                .sum::<f64>();
        sigmoid(z)
    }
}

/// Depth-one decision tree: rows with `x[feature] <= threshold` fall in the
/// left leaf. Each leaf carries the share of class 1 training rows it held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionStump {
    n_features: usize,
    feature: usize,
    threshold: f64,
    left: f64,
    right: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl DecisionStump {
    pub fn new(n_features: usize, feature: usize, threshold: f64, left: f64, right: f64) -> Self {
        Self {
            n_features,
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Picks the split with the lowest weighted Gini impurity. Thresholds sit
    /// halfway between consecutive distinct values.
    pub fn train(x: &Array2<f64>, y: &[u8]) -> Result<Self, ModelError> {
        let total_pos = check_training_set(x, y)?;
        let n = y.len();

        // (impurity, feature, threshold, left positives, left count)
        let mut best: Option<(f64, usize, f64, usize, usize)> = None;
        for (feature, column) in x.axis_iter(Axis(1)).enumerate() {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_pos = 0usize;
            for k in 0..n - 1 {
                let (current, next) = (column[order[k]], column[order[k + 1]]);
                left_pos += usize::from(y[order[k]]);
                if current == next {
                    continue;
                }
                let left_n = k + 1;
                let right_n = n - left_n;
                let impurity = (left_n as f64 * gini(left_pos, left_n)
                    + right_n as f64 * gini(total_pos - left_pos, right_n))
                    / n as f64;
                if best.map_or(true, |(lowest, ..)| impurity < lowest) {
                    best = Some((impurity, feature, (current + next) / 2.0, left_pos, left_n));
                }
            }
        }

        let stump = match best {
            Some((_, feature, threshold, left_pos, left_n)) => Self::new(
                x.ncols(),
                feature,
                threshold,
                left_pos as f64 / left_n as f64,
                (total_pos - left_pos) as f64 / (n - left_n) as f64,
            ),
            // every column is constant
            None => {
                let share = total_pos as f64 / n as f64;
                Self::new(x.ncols(), 0, f64::INFINITY, share, share)
            }
        };
        Ok(stump)
    }

    fn probability(&self, row: &FeatureRow) -> f64 {
        if row.get(self.feature) <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// Unpruned decision trees, each fitted on a bootstrap sample of the
/// training rows. The probability of class 1 is the share of trees voting 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree<f64, usize>>,
}

impl RandomForest {
    pub fn train(x: &Array2<f64>, y: &[u8], n_trees: usize, seed: u64) -> Result<Self, ModelError> {
        check_training_set(x, y)?;
        let n = y.len();
        let targets: Array1<usize> = y.iter().map(|&label| usize::from(label)).collect();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(n_trees.max(1));
        for _ in 0..n_trees.max(1) {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let ds = Dataset::new(x.select(Axis(0), &sample), targets.select(Axis(0), &sample));
            let tree = DecisionTree::<f64, usize>::params()
                .fit(&ds)
                .map_err(|e| ModelError::Fit(e.to_string()))?;
            trees.push(tree);
        }
        Ok(Self {
            n_features: x.ncols(),
            trees,
        })
    }

    fn probability(&self, row: &FeatureRow) -> f64 {
        let dense = row.to_dense().insert_axis(Axis(0));
        let votes = self
            .trees
            .iter()
            .filter(|tree| {
                let predicted: Array1<usize> = tree.predict(&dense);
                predicted[0] == 1
            })
            .count();
        votes as f64 / self.trees.len() as f64
    }
}
