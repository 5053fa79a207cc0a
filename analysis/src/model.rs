use crate::{
    collaborators::Predictor,
    error::{
        AnalysisError,
        TableError,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use ndarray::{
    Array1,
    Array2,
    ArrayView1,
    ArrayView2,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::{
        BTreeMap,
        HashSet,
    },
    fmt,
};

/// Label column of reference and current tables.
pub const TARGET_COLUMN: &str = "target";
/// Model output column of current tables.
pub const PREDICTION_COLUMN: &str = "prediction";

pub fn is_reserved_column(name: &str) -> bool {
    name == TARGET_COLUMN || name == PREDICTION_COLUMN
}

/// Stable key of one registered model version across all stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `"Cancer Model"` + `"v1.0"` becomes `cancer_model_v1.0`.
    pub fn from_name_and_version(name: &str, version: &str) -> Self {
        Self(format!("{}_{}", name.replace(' ', "_").to_lowercase(), version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One live inference record with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub model_id: ModelId,
    pub features: BTreeMap<String, f64>,
    pub ground_truth: i64,
    pub ingested_at: DateTime<Utc>,
}

/// The fixed baseline a model's live traffic is compared against.
///
/// Column order is the order of the source data and defines the feature schema
/// every current table is projected onto.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    feature_names: Vec<String>,
    features: Array2<f64>,
    target: Array1<i64>,
}

impl ReferenceTable {
    pub fn new(feature_names: Vec<String>, features: Array2<f64>, target: Array1<i64>) -> Result<Self, TableError> {
        validate_feature_names(&feature_names)?;
        if features.nrows() == 0 {
            return Err(TableError::Empty);
        }
        if features.ncols() != feature_names.len() {
            return Err(TableError::SchemaMismatch {
                expected: feature_names,
                actual: (0..features.ncols()).map(|i| format!("#{i}")).collect(),
            });
        }
        if target.len() != features.nrows() {
            return Err(TableError::LengthMismatch {
                column: TARGET_COLUMN.to_string(),
                expected: features.nrows(),
                found: target.len(),
            });
        }
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    /// Builds a table from named numeric columns, one of which must be `target`.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, TableError> {
        let mut target = None;
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            if name == TARGET_COLUMN {
                if target.replace(column).is_some() {
                    return Err(TableError::DuplicateColumn(name));
                }
            } else {
                names.push(name);
                values.push(column);
            }
        }

        let target = target.ok_or(TableError::MissingTarget)?;
        let n_rows = target.len();
        if n_rows == 0 {
            return Err(TableError::Empty);
        }
        let target = target
            .into_iter()
            .map(label_from_value)
            .collect::<Result<Array1<i64>, _>>()?;

        let mut features = Array2::zeros((n_rows, names.len()));
        for (index, (name, column)) in names.iter().zip(values).enumerate() {
            if column.len() != n_rows {
                return Err(TableError::LengthMismatch {
                    column: name.clone(),
                    expected: n_rows,
                    found: column.len(),
                });
            }
            features.column_mut(index).assign(&Array1::from(column));
        }

        Self::new(names, features, target)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.features.column(index)
    }

    pub fn target(&self) -> ArrayView1<'_, i64> {
        self.target.view()
    }

    /// The reference side carries no model output, so its prediction column is the
    /// true label column. Classification quality of the reference is therefore
    /// perfect and current-side metrics read as absolute values.
    pub fn prediction(&self) -> ArrayView1<'_, i64> {
        self.target.view()
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Projects live feature vectors onto the feature schema.
    ///
    /// Keys outside the schema are dropped, a missing key fails the projection.
    pub fn project(&self, observations: &[Observation]) -> Result<Array2<f64>, TableError> {
        if observations.is_empty() {
            return Err(TableError::Empty);
        }

        let mut features = Array2::zeros((observations.len(), self.feature_names.len()));
        for (index, observation) in observations.iter().enumerate() {
            for (column, name) in self.feature_names.iter().enumerate() {
                let value = observation
                    .features
                    .get(name)
                    .ok_or_else(|| TableError::MissingFeature {
                        index,
                        feature: name.clone(),
                    })?;
                features[[index, column]] = *value;
            }
        }
        Ok(features)
    }
}

/// A window of live traffic, labeled with ground truth and model predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTable {
    feature_names: Vec<String>,
    features: Array2<f64>,
    target: Array1<i64>,
    prediction: Array1<i64>,
}

impl CurrentTable {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        target: Array1<i64>,
        prediction: Array1<i64>,
    ) -> Result<Self, TableError> {
        validate_feature_names(&feature_names)?;
        if features.nrows() == 0 {
            return Err(TableError::Empty);
        }
        if features.ncols() != feature_names.len() {
            return Err(TableError::SchemaMismatch {
                expected: feature_names,
                actual: (0..features.ncols()).map(|i| format!("#{i}")).collect(),
            });
        }
        for (column, len) in [(TARGET_COLUMN, target.len()), (PREDICTION_COLUMN, prediction.len())] {
            if len != features.nrows() {
                return Err(TableError::LengthMismatch {
                    column: column.to_string(),
                    expected: features.nrows(),
                    found: len,
                });
            }
        }
        Ok(Self {
            feature_names,
            features,
            target,
            prediction,
        })
    }

    /// Projects `observations` onto the reference schema, takes `target` from their
    /// ground truth and `prediction` from `predictor`.
    pub fn from_observations(
        reference: &ReferenceTable,
        observations: &[Observation],
        predictor: &dyn Predictor,
    ) -> Result<Self, AnalysisError> {
        let features = reference.project(observations)?;
        let target: Array1<i64> = observations.iter().map(|o| o.ground_truth).collect();
        let prediction = predictor.predict(features.view())?;
        if prediction.len() != features.nrows() {
            return Err(AnalysisError::PredictionCount {
                expected: features.nrows(),
                found: prediction.len(),
            });
        }
        Ok(Self::new(
            reference.feature_names().to_vec(),
            features,
            target,
            Array1::from(prediction),
        )?)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.features.column(index)
    }

    pub fn target(&self) -> ArrayView1<'_, i64> {
        self.target.view()
    }

    pub fn prediction(&self) -> ArrayView1<'_, i64> {
        self.prediction.view()
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }
}

/// `i64::MIN` is exactly representable as `f64`, `i64::MAX` is not.
const LABEL_RANGE: std::ops::Range<f64> = (i64::MIN as f64)..-(i64::MIN as f64);

fn label_from_value(value: f64) -> Result<i64, TableError> {
    if LABEL_RANGE.contains(&value) && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(TableError::NonIntegralLabel(value))
    }
}

fn validate_feature_names(names: &[String]) -> Result<(), TableError> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if is_reserved_column(name) {
            return Err(TableError::ReservedColumn(name.clone()));
        }
        if !seen.insert(name.as_str()) {
            return Err(TableError::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}
