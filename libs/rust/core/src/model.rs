//! Prediction model wrapper: preprocessor + predictor bound into one
//! fit/predict/evaluate/serialize unit with a stable identifier.
//!
//! Concrete stages are serde-tagged enums so a whole fitted model persists
//! as a single versioned JSON artifact. The statistical machinery itself is
//! deliberately simple; anything heavier plugs in behind the same
//! [`Regressor`] seam.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServingError};
use crate::frame::{FeatureFrame, Matrix};

/// Marker written into every artifact so foreign blobs are rejected with a
/// type mismatch instead of a confusing field error.
pub const ARTIFACT_FORMAT: &str = "prediction-model";
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preprocessor {
    /// Replaces one date column with day/month/year/day-of-week numeric
    /// features and passes the remaining numeric columns through.
    DateFeatures(DateFeatures),
    /// Numeric columns only; records and enforces the column schema.
    Passthrough(Passthrough),
}

impl Preprocessor {
    pub fn date_features(date_column: impl Into<String>) -> Self {
        Self::DateFeatures(DateFeatures { date_column: date_column.into(), columns: None })
    }

    pub fn passthrough() -> Self {
        Self::Passthrough(Passthrough { columns: None })
    }

    pub fn fit(&mut self, frame: &FeatureFrame) -> Result<()> {
        if frame.is_empty() {
            return Err(ServingError::NotFittable(
                "cannot fit a preprocessor on an empty frame".to_string(),
            ));
        }
        match self {
            Self::DateFeatures(p) => {
                if frame.column_index(&p.date_column).is_none() {
                    return Err(ServingError::NotFittable(format!(
                        "date column '{}' is not present in the training frame",
                        p.date_column
                    )));
                }
                p.columns = Some(frame.columns().to_vec());
            }
            Self::Passthrough(p) => p.columns = Some(frame.columns().to_vec()),
        }
        Ok(())
    }

    pub fn transform(&self, frame: &FeatureFrame) -> Result<Matrix> {
        match self {
            Self::DateFeatures(p) => p.transform(frame),
            Self::Passthrough(p) => p.transform(frame),
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Self::DateFeatures(p) => p.columns.is_some(),
            Self::Passthrough(p) => p.columns.is_some(),
        }
    }

    fn training_columns(&self) -> Option<&[String]> {
        match self {
            Self::DateFeatures(p) => p.columns.as_deref(),
            Self::Passthrough(p) => p.columns.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFeatures {
    pub date_column: String,
    /// Column schema captured at fit time.
    columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passthrough {
    columns: Option<Vec<String>>,
}

/// The incoming column set must match the training schema exactly; extra or
/// missing columns are a hard error because predictors match features
/// positionally.
fn check_schema(training: Option<&[String]>, frame: &FeatureFrame) -> Result<Vec<String>> {
    let training = training.ok_or(ServingError::NotFitted)?;
    let mut expected: Vec<&String> = training.iter().collect();
    let mut got: Vec<&String> = frame.columns().iter().collect();
    expected.sort();
    got.sort();
    if expected != got {
        return Err(ServingError::SchemaMismatch(format!(
            "expected columns {training:?}, got {:?}",
            frame.columns()
        )));
    }
    Ok(training.to_vec())
}

impl DateFeatures {
    fn transform(&self, frame: &FeatureFrame) -> Result<Matrix> {
        let training = check_schema(self.columns.as_deref(), frame)?;
        let mut out = Vec::with_capacity(frame.num_rows());
        for row in frame.rows() {
            let mut values = Vec::with_capacity(training.len() + 3);
            for col in &training {
                // frame column order may differ from the training order
                let idx = frame
                    .column_index(col)
                    .ok_or_else(|| ServingError::SchemaMismatch(format!("missing column '{col}'")))?;
                let value = &row[idx];
                if col == &self.date_column {
                    let d = value.as_date()?;
                    values.push(d.day() as f64);
                    values.push(d.month() as f64);
                    values.push(d.year() as f64);
                    values.push(d.weekday().num_days_from_monday() as f64);
                } else {
                    values.push(value.as_f64()?);
                }
            }
            out.push(values);
        }
        Ok(out)
    }
}

impl Passthrough {
    fn transform(&self, frame: &FeatureFrame) -> Result<Matrix> {
        let training = check_schema(self.columns.as_deref(), frame)?;
        let mut out = Vec::with_capacity(frame.num_rows());
        for row in frame.rows() {
            let mut values = Vec::with_capacity(training.len());
            for col in &training {
                let idx = frame
                    .column_index(col)
                    .ok_or_else(|| ServingError::SchemaMismatch(format!("missing column '{col}'")))?;
                values.push(row[idx].as_f64()?);
            }
            out.push(values);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Predictors
// ---------------------------------------------------------------------------

/// Capability contract every concrete predictor implements.
pub trait Regressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()>;
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>>;
    fn is_fitted(&self) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predictor {
    Mean(MeanRegressor),
    Linear(LinearRegressor),
}

impl Regressor for Predictor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        match self {
            Self::Mean(p) => p.fit(x, y),
            Self::Linear(p) => p.fit(x, y),
        }
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        match self {
            Self::Mean(p) => p.predict(x),
            Self::Linear(p) => p.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Self::Mean(p) => p.is_fitted(),
            Self::Linear(p) => p.is_fitted(),
        }
    }
}

/// Constant model: predicts the training-label mean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanRegressor {
    mean: Option<f64>,
}

impl Regressor for MeanRegressor {
    fn fit(&mut self, _x: &Matrix, y: &[f64]) -> Result<()> {
        if y.is_empty() {
            return Err(ServingError::NotFittable("no labels provided".to_string()));
        }
        self.mean = Some(y.iter().sum::<f64>() / y.len() as f64);
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let mean = self.mean.ok_or(ServingError::NotFitted)?;
        Ok(vec![mean; x.len()])
    }

    fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }
}

/// Ordinary least squares fitted by gradient descent on standardized
/// features. Deterministic for a fixed input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub learning_rate: f64,
    pub epochs: usize,
    weights: Option<Vec<f64>>,
    bias: f64,
    feature_means: Vec<f64>,
    feature_stds: Vec<f64>,
}

impl Default for LinearRegressor {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 300,
            weights: None,
            bias: 0.0,
            feature_means: Vec::new(),
            feature_stds: Vec::new(),
        }
    }
}

impl LinearRegressor {
    fn standardize(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.feature_means.iter().zip(&self.feature_stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

impl Regressor for LinearRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ServingError::NotFittable(format!(
                "{} feature rows vs {} labels",
                x.len(),
                y.len()
            )));
        }
        let n = x.len() as f64;
        let dims = x[0].len();
        if x.iter().any(|row| row.len() != dims) {
            return Err(ServingError::NotFittable("ragged feature matrix".to_string()));
        }

        self.feature_means = (0..dims)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        self.feature_stds = (0..dims)
            .map(|j| {
                let m = self.feature_means[j];
                let var = x.iter().map(|row| (row[j] - m).powi(2)).sum::<f64>() / n;
                let s = var.sqrt();
                if s > f64::EPSILON {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        let xs: Matrix = x.iter().map(|row| self.standardize(row)).collect();
        let mut weights = vec![0.0; dims];
        let mut bias = y.iter().sum::<f64>() / n;
        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; dims];
            let mut grad_b = 0.0;
            for (row, &target) in xs.iter().zip(y) {
                let pred = bias + row.iter().zip(&weights).map(|(a, b)| a * b).sum::<f64>();
                let err = pred - target;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g / n;
            }
            bias -= self.learning_rate * grad_b / n;
        }
        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let weights = self.weights.as_ref().ok_or(ServingError::NotFitted)?;
        let mut out = Vec::with_capacity(x.len());
        for row in x {
            if row.len() != weights.len() {
                return Err(ServingError::SchemaMismatch(format!(
                    "expected {} features, got {}",
                    weights.len(),
                    row.len()
                )));
            }
            let row = self.standardize(row);
            out.push(self.bias + row.iter().zip(weights).map(|(a, b)| a * b).sum::<f64>());
        }
        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionModel {
    pub model_id: String,
    preprocessor: Preprocessor,
    predictor: Predictor,
}

impl PredictionModel {
    pub fn new(
        model_id: impl Into<String>,
        preprocessor: Preprocessor,
        predictor: Predictor,
    ) -> Self {
        Self { model_id: model_id.into(), preprocessor, predictor }
    }

    pub fn is_fitted(&self) -> bool {
        self.preprocessor.is_fitted() && self.predictor.is_fitted()
    }

    /// Columns the model was trained on, once fitted.
    pub fn feature_columns(&self) -> Option<&[String]> {
        self.preprocessor.training_columns()
    }

    /// Fits the preprocessor then the predictor, in sequence.
    pub fn fit(&mut self, frame: &FeatureFrame, y: &[f64]) -> Result<()> {
        if frame.num_rows() != y.len() {
            return Err(ServingError::NotFittable(format!(
                "{} feature rows vs {} labels",
                frame.num_rows(),
                y.len()
            )));
        }
        self.preprocessor.fit(frame)?;
        let x = self.preprocessor.transform(frame)?;
        self.predictor.fit(&x, y)
    }

    /// One prediction per input row.
    pub fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(ServingError::NotFitted);
        }
        let x = self.preprocessor.transform(frame)?;
        self.predictor.predict(&x)
    }

    /// Mean absolute percentage error with the denominator clamped at 1,
    /// i.e. mean(|actual - predicted| / max(1, |actual|)).
    pub fn evaluate(&self, frame: &FeatureFrame, y: &[f64]) -> Result<f64> {
        if y.is_empty() {
            return Err(ServingError::Validation("no labels to evaluate against".to_string()));
        }
        let predictions = self.predict(frame)?;
        let total: f64 = predictions
            .iter()
            .zip(y)
            .map(|(p, a)| (a - p).abs() / a.abs().max(1.0))
            .sum();
        Ok(total / y.len() as f64)
    }

    /// Persists the whole wrapper as one versioned JSON artifact.
    pub fn serialize(&self, path: impl AsRef<Path>) -> Result<()> {
        let artifact = Artifact {
            format: ARTIFACT_FORMAT.to_string(),
            schema_version: ARTIFACT_SCHEMA_VERSION,
            model: self.clone(),
        };
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &artifact)
            .map_err(|e| ServingError::Internal(format!("artifact encode failed: {e}")))
    }

    /// Restores a wrapper from an artifact written by [`serialize`].
    ///
    /// [`serialize`]: PredictionModel::serialize
    pub fn deserialize(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ServingError::Deserialization(e.to_string()))?;

        let format = value.get("format").and_then(|v| v.as_str()).unwrap_or("unknown");
        if format != ARTIFACT_FORMAT {
            return Err(ServingError::TypeMismatch {
                expected: ARTIFACT_FORMAT.to_string(),
                found: format.to_string(),
            });
        }
        let version = value.get("schema_version").and_then(|v| v.as_u64()).unwrap_or(0);
        if version != ARTIFACT_SCHEMA_VERSION as u64 {
            return Err(ServingError::TypeMismatch {
                expected: format!("schema_version {ARTIFACT_SCHEMA_VERSION}"),
                found: format!("schema_version {version}"),
            });
        }

        let artifact: Artifact = serde_json::from_value(value)
            .map_err(|e| ServingError::Deserialization(e.to_string()))?;
        Ok(artifact.model)
    }
}

#[derive(Serialize, Deserialize)]
struct Artifact {
    format: String,
    schema_version: u32,
    model: PredictionModel,
}
