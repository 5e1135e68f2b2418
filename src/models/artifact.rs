//! Serialized model artifacts
//!
//! An artifact is a document tagged by `family`. The same structure is
//! accepted in JSON and TOML, for example:
//!
//! ```text
//! {
//!   "family": "linear_regression",
//!   "features": ["rooms", "area"],
//!   "coefficients": [12.5, 0.8],
//!   "intercept": 40.0
//! }
//! ```

use super::predictor::{ConstantPredictor, LinearPredictor, LogisticPredictor, Predictor};
use serde::{Deserialize, Serialize};

/// Supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LinearRegression,
    LogisticRegression,
    Constant,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::LinearRegression,
        ModelFamily::LogisticRegression,
        ModelFamily::Constant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::LogisticRegression => "logistic_regression",
            Self::Constant => "constant",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| format!("unknown model family '{}'", s))
    }
}

/// Weights of a linear model over named features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

/// Binary logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticWeights {
    #[serde(flatten)]
    pub weights: LinearWeights,
    /// Labels for the negative and positive class
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_classes() -> Vec<String> {
    vec!["0".to_string(), "1".to_string()]
}

fn default_threshold() -> f64 {
    0.5
}

/// A decoded model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelArtifact {
    LinearRegression(LinearWeights),
    LogisticRegression(LogisticWeights),
    Constant { value: serde_json::Value },
}

impl ModelArtifact {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::LinearRegression(_) => ModelFamily::LinearRegression,
            Self::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Self::Constant { .. } => ModelFamily::Constant,
        }
    }

    /// Check structural consistency that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::LinearRegression(weights) => weights.validate(),
            Self::LogisticRegression(model) => {
                model.weights.validate()?;
                if model.classes.len() != 2 {
                    return Err(format!(
                        "logistic regression needs exactly 2 classes, got {}",
                        model.classes.len()
                    ));
                }
                if !(model.threshold > 0.0 && model.threshold < 1.0) {
                    return Err(format!(
                        "threshold must be in (0, 1), got {}",
                        model.threshold
                    ));
                }
                Ok(())
            }
            Self::Constant { .. } => Ok(()),
        }
    }

    /// Select the inference implementation for this artifact's family
    pub fn into_predictor(self) -> Box<dyn Predictor> {
        match self {
            Self::LinearRegression(weights) => Box::new(LinearPredictor::new(weights)),
            Self::LogisticRegression(model) => Box::new(LogisticPredictor::new(model)),
            Self::Constant { value } => Box::new(ConstantPredictor::new(value)),
        }
    }
}

impl LinearWeights {
    fn validate(&self) -> Result<(), String> {
        if self.features.len() != self.coefficients.len() {
            return Err(format!(
                "{} features but {} coefficients",
                self.features.len(),
                self.coefficients.len()
            ));
        }
        if let Some(c) = self.coefficients.iter().find(|c| !c.is_finite()) {
            return Err(format!("non-finite coefficient {}", c));
        }
        if !self.intercept.is_finite() {
            return Err(format!("non-finite intercept {}", self.intercept));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_roundtrip_str() {
        for family in ModelFamily::ALL {
            assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
        }
        assert!("sklearn".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_parse_linear_json() {
        let json = r#"{
            "family": "linear_regression",
            "features": ["a", "b"],
            "coefficients": [1.0, 2.0],
            "intercept": 0.5
        }"#;
        let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.family(), ModelFamily::LinearRegression);
        assert!(artifact.validate().is_ok());
    }

    #[test]
    fn test_logistic_defaults() {
        let json = r#"{
            "family": "logistic_regression",
            "features": ["x"],
            "coefficients": [3.0]
        }"#;
        let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
        match artifact {
            ModelArtifact::LogisticRegression(ref model) => {
                assert_eq!(model.classes, vec!["0", "1"]);
                assert_eq!(model.threshold, 0.5);
                assert_eq!(model.weights.intercept, 0.0);
            }
            _ => panic!("expected logistic regression"),
        }
    }

    #[test]
    fn test_validate_length_mismatch() {
        let artifact = ModelArtifact::LinearRegression(LinearWeights {
            features: vec!["a".to_string()],
            coefficients: vec![1.0, 2.0],
            intercept: 0.0,
        });
        let err = artifact.validate().unwrap_err();
        assert!(err.contains("1 features but 2 coefficients"));
    }

    #[test]
    fn test_validate_bad_threshold() {
        let artifact = ModelArtifact::LogisticRegression(LogisticWeights {
            weights: LinearWeights {
                features: vec![],
                coefficients: vec![],
                intercept: 0.0,
            },
            classes: default_classes(),
            threshold: 1.5,
        });
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_validate_non_finite_intercept() {
        for value in ["inf", "-inf", "nan"] {
            let doc = format!(
                "family = \"linear_regression\"\nfeatures = [\"x\"]\ncoefficients = [1.0]\nintercept = {}\n",
                value
            );
            let artifact: ModelArtifact = toml::from_str(&doc).unwrap();
            let err = artifact.validate().unwrap_err();
            assert!(err.contains("non-finite intercept"), "{}", err);
        }
    }

    #[test]
    fn test_unknown_family_rejected() {
        let json = r#"{"family": "random_forest", "trees": []}"#;
        assert!(serde_json::from_str::<ModelArtifact>(json).is_err());
    }
}
