//! # Collaborator Interfaces
//!
//! The engine reads live observations, registered model identifiers and reference
//! assets, and writes reduced metrics. Every store is an implementation of one of
//! the traits below; the engine never touches a database or the filesystem itself.

use crate::{
    error::{
        AssetError,
        PredictError,
    },
    model::{
        ModelId,
        Observation,
        ReferenceTable,
    },
    reducer::{
        FeatureDriftRow,
        PerformanceRow,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use eyre::Result;
use ndarray::ArrayView2;
use std::{
    fmt,
    sync::Arc,
};

/// A trained classifier. Rows of `features` follow the reference feature schema.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<i64>, PredictError>;
}

/// Append-only record of live feature vectors and ground truth.
pub trait ObservationStore: Send + Sync {
    /// All observations of `model_id` ingested at or after `since`.
    fn fetch_window(&self, model_id: &ModelId, since: DateTime<Utc>) -> Result<Vec<Observation>>;
}

/// Everything needed to analyze one model version.
#[derive(Clone)]
pub struct ModelAssets {
    pub reference: Arc<ReferenceTable>,
    pub predictor: Arc<dyn Predictor>,
}

impl fmt::Debug for ModelAssets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAssets")
            .field("features", &self.reference.feature_names())
            .field("reference_rows", &self.reference.n_rows())
            .finish_non_exhaustive()
    }
}

pub trait AssetProvider: Send + Sync {
    /// Fails with [`AssetError::AssetsNotFound`] when nothing is registered for `model_id`.
    fn load_reference_assets(&self, model_id: &ModelId) -> Result<ModelAssets, AssetError>;
}

pub trait ModelRegistry: Send + Sync {
    fn list_registered_models(&self) -> Result<Vec<ModelId>>;
}

/// Append-only time series of reduced metrics.
pub trait MetricsStore: Send + Sync {
    /// Writes the performance row and its feature rows together or not at all.
    fn persist(&self, performance: &PerformanceRow, features: &[FeatureDriftRow]) -> Result<()>;

    /// Timestamp of the most recent performance row of `model_id`.
    fn latest_timestamp(&self, model_id: &ModelId) -> Result<Option<DateTime<Utc>>>;

    /// Cheap reachability check.
    fn ping(&self) -> Result<()>;
}
