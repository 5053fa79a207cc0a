use crate::model::ModelId;

/// Problems building a reference or current table.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("the reference data has no `target` column")]
    MissingTarget,
    #[error("the table has no rows")]
    Empty,
    #[error("column `{0}` is reserved and cannot be used as a feature")]
    ReservedColumn(String),
    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("expected {expected} values in `{column}`, found {found}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("label {0} in `target` is not an integer in the range of i64")]
    NonIntegralLabel(f64),
    #[error("observation {index} is missing feature `{feature}`")]
    MissingFeature { index: usize, feature: String },
    #[error("feature columns {actual:?} do not match the reference schema {expected:?}")]
    SchemaMismatch { expected: Vec<String>, actual: Vec<String> },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("the predictor expects {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },
    #[error("the predictor produced a non-finite score for row {0}")]
    NonFinite(usize),
}

/// Why a single column could not be compared.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DriftTestError {
    #[error("the reference sample is empty")]
    EmptyReference,
    #[error("the current sample is empty")]
    EmptyCurrent,
    #[error("the {0} sample contains non-finite values")]
    NonFinite(&'static str),
    #[error("the test distribution could not be evaluated: {0}")]
    Distribution(String),
}

/// Why classification quality could not be computed for a window.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("there are no labels to score")]
    Empty,
    #[error("{target} targets but {prediction} predictions")]
    LengthMismatch { target: usize, prediction: usize },
    #[error("every target belongs to class {0}")]
    SingleClass(i64),
}

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("the predictor failed: {0}")]
    Predictor(#[from] PredictError),
    #[error("the predictor returned {found} labels for {expected} rows")]
    PredictionCount { expected: usize, found: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("no assets are registered for model `{0}`")]
    AssetsNotFound(ModelId),
    #[error("the reference data of `{model_id}` is unusable: {reason}")]
    InvalidReference { model_id: ModelId, reason: String },
    #[error("the model file of `{model_id}` is unusable: {reason}")]
    InvalidModel { model_id: ModelId, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
