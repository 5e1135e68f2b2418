//! Inference capability per model family
//!
//! The predictor for a model is selected once, when its artifact is decoded,
//! and stored alongside the cached handle.

use super::artifact::{LinearWeights, LogisticWeights, ModelFamily};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Named feature values supplied by the caller
pub type FeatureMap = Map<String, Value>;

#[derive(Error, Debug, PartialEq)]
pub enum PredictError {
    #[error("Missing feature '{0}'")]
    MissingFeature(String),

    #[error("Feature '{0}' must be a number or boolean")]
    NonNumericFeature(String),
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub prediction: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

/// A loaded model's inference entry point
pub trait Predictor: Send + Sync + std::fmt::Debug {
    fn family(&self) -> ModelFamily;

    /// Feature names the model reads, in order
    fn features(&self) -> &[String];

    fn predict(&self, input: &FeatureMap) -> Result<PredictionOutput, PredictError>;
}

fn feature_vector(features: &[String], input: &FeatureMap) -> Result<Vec<f64>, PredictError> {
    features
        .iter()
        .map(|name| match input.get(name) {
            None => Err(PredictError::MissingFeature(name.clone())),
            Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| PredictError::NonNumericFeature(name.clone())),
            Some(_) => Err(PredictError::NonNumericFeature(name.clone())),
        })
        .collect()
}

fn linear_score(weights: &LinearWeights, input: &FeatureMap) -> Result<f64, PredictError> {
    let x = feature_vector(&weights.features, input)?;
    Ok(weights
        .coefficients
        .iter()
        .zip(x)
        .fold(weights.intercept, |acc, (w, v)| acc + w * v))
}

#[derive(Debug)]
pub struct LinearPredictor {
    weights: LinearWeights,
}

impl LinearPredictor {
    pub fn new(weights: LinearWeights) -> Self {
        Self { weights }
    }
}

impl Predictor for LinearPredictor {
    fn family(&self) -> ModelFamily {
        ModelFamily::LinearRegression
    }

    fn features(&self) -> &[String] {
        &self.weights.features
    }

    fn predict(&self, input: &FeatureMap) -> Result<PredictionOutput, PredictError> {
        let y = linear_score(&self.weights, input)?;
        Ok(PredictionOutput {
            prediction: Value::from(y),
            confidence: None,
            probabilities: None,
        })
    }
}

#[derive(Debug)]
pub struct LogisticPredictor {
    model: LogisticWeights,
}

impl LogisticPredictor {
    pub fn new(model: LogisticWeights) -> Self {
        Self { model }
    }
}

impl Predictor for LogisticPredictor {
    fn family(&self) -> ModelFamily {
        ModelFamily::LogisticRegression
    }

    fn features(&self) -> &[String] {
        &self.model.weights.features
    }

    fn predict(&self, input: &FeatureMap) -> Result<PredictionOutput, PredictError> {
        let z = linear_score(&self.model.weights, input)?;
        let p = 1.0 / (1.0 + (-z).exp());
        let positive = p >= self.model.threshold;
        let label = &self.model.classes[usize::from(positive)];

        Ok(PredictionOutput {
            prediction: Value::String(label.clone()),
            confidence: Some(if positive { p } else { 1.0 - p }),
            probabilities: Some(vec![1.0 - p, p]),
        })
    }
}

/// Always returns the same value regardless of input
#[derive(Debug)]
pub struct ConstantPredictor {
    value: Value,
}

impl ConstantPredictor {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Predictor for ConstantPredictor {
    fn family(&self) -> ModelFamily {
        ModelFamily::Constant
    }

    fn features(&self) -> &[String] {
        &[]
    }

    fn predict(&self, _input: &FeatureMap) -> Result<PredictionOutput, PredictError> {
        Ok(PredictionOutput {
            prediction: self.value.clone(),
            confidence: Some(1.0),
            probabilities: None,
        })
    }
}
