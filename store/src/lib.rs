//! # Drift Monitor Stores
//!
//! SQLite implementations of the observation store, metrics store and model registry,
//! plus the filesystem provider of reference data and trained models.
//!
//! - **`observations`**: `live_data`, appended by ingestion and windowed by the engine
//! - **`metrics`**: `model_performance` and `feature_metrics`, written in one transaction
//! - **`registry`**: `model_registry`, one row per model version
//! - **`assets`**: `<assets_dir>/<model_id>/reference_data.csv` and `model.json`
//! - **`logistic`**: the serialized logistic regression used as predictor
//!
//! Every query is parameterized.

#[macro_use]
extern crate tracing;

pub mod assets;
pub mod error;
pub mod logistic;
pub mod metrics;
pub mod observations;
pub mod registry;
mod sqlite;

pub use assets::{
    FsAssetProvider,
    StagedAssets,
    MODEL_FILE,
    REFERENCE_FILE,
};
pub use error::StoreError;
pub use logistic::{
    FitSettings,
    LogisticModel,
};
pub use metrics::SqliteMetricsStore;
pub use observations::SqliteObservationStore;
pub use registry::{
    RegisteredModel,
    SqliteModelRegistry,
};
