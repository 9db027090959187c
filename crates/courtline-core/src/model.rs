// Margin model adapter.
//
// Training happens elsewhere; the engine only needs `predict`. The bundled
// implementation reads a standardized linear (ridge) model exported as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::features::{FeatureVector, FEATURE_COLUMNS, FEATURE_COUNT};

/// Anything that maps a pre-game feature vector to a predicted margin
/// (home score minus away score).
pub trait MarginPredictor {
    fn predict(&self, features: &FeatureVector) -> f64;
}

impl<P: MarginPredictor + ?Sized> MarginPredictor for Box<P> {
    fn predict(&self, features: &FeatureVector) -> f64 {
        (**self).predict(features)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("model feature contract mismatch: {message}")]
    FeatureMismatch { message: String },

    #[error("invalid model parameter `{field}`: {message}")]
    InvalidParameter { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Linear artifact
// ---------------------------------------------------------------------------

/// Optional training metadata carried alongside the weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Validation RMSE; the natural choice for the probability sigma.
    #[serde(default)]
    pub rmse: Option<f64>,
    #[serde(default)]
    pub trained_at: Option<String>,
}

/// Standardize-then-regress model:
/// `intercept + sum(coef[i] * (x[i] - mean[i]) / scale[i])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearMarginModel {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub metadata: ModelMetadata,
}

impl LinearMarginModel {
    /// Load and validate an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = Self::from_json(&text).map_err(|e| match e {
            ModelError::Parse { source, .. } => ModelError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded margin model from {}", path.display());
        Ok(model)
    }

    /// Parse and validate an artifact from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let model: LinearMarginModel =
            serde_json::from_str(text).map_err(|e| ModelError::Parse {
                path: PathBuf::from("<inline>"),
                source: e,
            })?;
        model.validate()?;
        Ok(model)
    }

    /// Check the artifact against the engine's feature contract.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.len() != FEATURE_COUNT
            || self
                .feature_names
                .iter()
                .zip(FEATURE_COLUMNS)
                .any(|(have, want)| have != want)
        {
            return Err(ModelError::FeatureMismatch {
                message: format!(
                    "expected columns {:?}, artifact has {:?}",
                    FEATURE_COLUMNS, self.feature_names
                ),
            });
        }

        let vectors: [(&str, &[f64]); 3] = [
            ("means", &self.means),
            ("scales", &self.scales),
            ("coefficients", &self.coefficients),
        ];
        for (name, values) in vectors {
            if values.len() != FEATURE_COUNT {
                return Err(ModelError::FeatureMismatch {
                    message: format!(
                        "`{name}` has {} entries, expected {FEATURE_COUNT}",
                        values.len()
                    ),
                });
            }
            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(ModelError::InvalidParameter {
                    field: name.to_string(),
                    message: format!("non-finite value {bad}"),
                });
            }
        }

        if let Some(i) = self.scales.iter().position(|s| *s == 0.0) {
            return Err(ModelError::InvalidParameter {
                field: format!("scales[{i}]"),
                message: "scale must be non-zero".into(),
            });
        }

        if !self.intercept.is_finite() {
            return Err(ModelError::InvalidParameter {
                field: "intercept".into(),
                message: format!("non-finite value {}", self.intercept),
            });
        }

        Ok(())
    }
}

impl MarginPredictor for LinearMarginModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        features
            .to_array()
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.coefficients)
            .fold(self.intercept, |acc, (((x, mean), scale), coef)| {
                acc + coef * (x - mean) / scale
            })
    }
}
