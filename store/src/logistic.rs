//! Binary logistic regression, the predictor shipped as `model.json`.
//!
//! Features are standardized with the reference means and standard deviations
//! before the linear term, so the stored model accepts raw feature values.

use drift_monitor_analysis::{
    PredictError,
    Predictor,
    ReferenceTable,
};
use ndarray::{
    Array1,
    Array2,
    ArrayView2,
    Axis,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("logistic regression needs labels 0 and 1, found {0}")]
    NotBinary(i64),
    #[error("logistic regression needs both classes in the training data")]
    SingleClass,
}

/// Gradient descent settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// L2 regularization strength.
    pub alpha: f64,
    pub tol: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
            alpha: 0.01,
            tol: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

impl LogisticModel {
    /// Fits the model on the reference data, `target` being the label.
    pub fn fit(reference: &ReferenceTable, settings: &FitSettings) -> Result<Self, FitError> {
        let y: Array1<f64> = reference
            .target()
            .iter()
            .map(|label| match label {
                0 | 1 => Ok(*label as f64),
                other => Err(FitError::NotBinary(*other)),
            })
            .collect::<Result<_, _>>()?;
        if y.iter().all(|v| *v == y[0]) {
            return Err(FitError::SingleClass);
        }

        let x = reference.features();
        let n_samples = x.nrows() as f64;
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > f64::EPSILON { s } else { 1.0 });
        let standardized: Array2<f64> = (&x - &means) / &scales;

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        for _ in 0..settings.max_iter {
            let predictions = sigmoid(&(standardized.dot(&weights) + bias));
            let errors = &predictions - &y;
            let dw = (standardized.t().dot(&errors) / n_samples) + (settings.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < settings.tol {
                break;
            }

            weights = weights - settings.learning_rate * dw;
            bias -= settings.learning_rate * db;
        }

        Ok(Self {
            feature_names: reference.feature_names().to_vec(),
            means: means.to_vec(),
            scales: scales.to_vec(),
            coefficients: weights.to_vec(),
            intercept: bias,
            threshold: default_threshold(),
        })
    }

    /// Checks that the stored vectors describe one consistent model.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.feature_names.len();
        for (name, len) in [
            ("means", self.means.len()),
            ("scales", self.scales.len()),
            ("coefficients", self.coefficients.len()),
        ] {
            if len != n {
                return Err(format!("{name} has {len} entries for {n} features"));
            }
        }
        if self.scales.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err("scales must be finite and non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} is outside [0, 1]", self.threshold));
        }
        Ok(())
    }

    pub fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError> {
        if features.ncols() != self.coefficients.len() {
            return Err(PredictError::FeatureCount {
                expected: self.coefficients.len(),
                found: features.ncols(),
            });
        }
        let means = Array1::from(self.means.clone());
        let scales = Array1::from(self.scales.clone());
        let coefficients = Array1::from(self.coefficients.clone());

        let standardized = (&features - &means) / &scales;
        let proba = sigmoid(&(standardized.dot(&coefficients) + self.intercept));
        match proba.iter().position(|p| !p.is_finite()) {
            Some(row) => Err(PredictError::NonFinite(row)),
            None => Ok(proba),
        }
    }
}

impl Predictor for LogisticModel {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<i64>, PredictError> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|p| i64::from(*p >= self.threshold))
            .collect())
    }
}
