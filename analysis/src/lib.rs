//! # Drift Monitor Analysis Engine
//!
//! The core of the model drift monitor. For every registered model it selects a
//! trailing window of live observations, compares it against the model's
//! reference dataset, and reduces the comparison into a small set of stored metrics.
//!
//! ## Architecture
//!
//! - **`model`**: Domain types (model identifiers, observations, reference and current tables)
//! - **`collaborators`**: Interfaces to the stores and asset provider the engine consumes
//! - **`window`**: Trailing window selection with a minimum-sample gate
//! - **`drift`**: Per-column two-sample tests (Kolmogorov-Smirnov, chi-square)
//! - **`scoring`**: Classification quality (accuracy, precision, recall, f1)
//! - **`analyzer`**: Runs drift tests and scoring over a reference/current pair
//! - **`reducer`**: Turns an analysis into the rows written to the metrics store
//! - **`scheduler`**: Drives the cycle for every registered model on a fixed interval
//!
//! ## Data Flow
//!
//! ```text
//! Scheduler ─► WindowSelector ─► Analyzer ─► reduce ─► MetricsStore
//! ```

#[macro_use]
extern crate tracing;

pub mod analyzer;
pub mod collaborators;
pub mod drift;
pub mod error;
pub mod model;
pub mod reducer;
pub mod scheduler;
pub mod scoring;
pub mod window;

pub use analyzer::{
    AnalysisResult,
    Analyzer,
    DatasetDrift,
    QualityOutcome,
    SkippedColumn,
};
pub use collaborators::{
    AssetProvider,
    MetricsStore,
    ModelAssets,
    ModelRegistry,
    ObservationStore,
    Predictor,
};
pub use drift::{
    AutoDriftTest,
    ChiSquareTest,
    ColumnDrift,
    ColumnDriftTest,
    ColumnKind,
    KolmogorovSmirnovTest,
    StatTest,
};
pub use error::{
    AnalysisError,
    AssetError,
    DriftTestError,
    PredictError,
    ScoringError,
    TableError,
};
pub use model::{
    CurrentTable,
    ModelId,
    Observation,
    ReferenceTable,
    PREDICTION_COLUMN,
    TARGET_COLUMN,
};
pub use reducer::{
    reduce,
    FeatureDriftRow,
    PerformanceRow,
    ReducedMetrics,
};
pub use scheduler::{
    Collaborators,
    CycleContext,
    CycleOutcome,
    PassSummary,
    Scheduler,
    SchedulerSettings,
    SkipReason,
};
pub use scoring::{
    Averaging,
    ClassificationQuality,
    ClassificationScorer,
    LabelScorer,
};
pub use window::{
    Window,
    WindowSelector,
};
