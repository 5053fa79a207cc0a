//! # Scheduler Loop
//!
//! Every pass lists the registered models and runs one independent cycle per model:
//!
//! ```text
//! SELECT_WINDOW ─► SKIP (insufficient data, no assets)
//!              └─► ANALYZE ─► REDUCE ─► PERSIST
//! ```
//!
//! Nothing is carried from one cycle to the next except what the stores already hold,
//! so the loop can be stopped and restarted at any point between cycles. A failing
//! model is logged and the pass moves on to the next one.

use crate::{
    analyzer::{
        AnalysisResult,
        Analyzer,
    },
    collaborators::{
        AssetProvider,
        MetricsStore,
        ModelRegistry,
        ObservationStore,
        Predictor,
    },
    error::AssetError,
    model::{
        CurrentTable,
        ModelId,
        Observation,
        ReferenceTable,
    },
    reducer::reduce,
    window::{
        Window,
        WindowSelector,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use eyre::{
    eyre,
    Result,
    WrapErr,
};
use std::{
    sync::Arc,
    time::Duration,
};
use strum::Display;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STORE_RETRY_ATTEMPTS: usize = 5;

/// The stores and asset provider a scheduler works against.
#[derive(Clone)]
pub struct Collaborators {
    pub observations: Arc<dyn ObservationStore>,
    pub assets: Arc<dyn AssetProvider>,
    pub registry: Arc<dyn ModelRegistry>,
    pub metrics: Arc<dyn MetricsStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Pause between two passes over all registered models.
    pub interval: Duration,
    /// Upper bound of building the current table and analyzing it for one model.
    pub analysis_timeout: Duration,
    /// Retries of the metrics store ping before the loop gives up.
    pub store_retry_attempts: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
            store_retry_attempts: DEFAULT_STORE_RETRY_ATTEMPTS,
        }
    }
}

/// Everything one cycle of one model works on, loaded fresh for every cycle.
#[derive(Clone)]
pub struct CycleContext {
    pub model_id: ModelId,
    pub reference: Arc<ReferenceTable>,
    pub predictor: Arc<dyn Predictor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[strum(to_string = "insufficient data ({found} of {required} samples)")]
    InsufficientData { found: usize, required: usize },
    #[strum(to_string = "no reference assets registered")]
    AssetsNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Persisted {
        drift_score: u8,
        features: usize,
        window_size: usize,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Scheduler {
    collaborators: Collaborators,
    selector: WindowSelector,
    analyzer: Arc<Analyzer>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        collaborators: Collaborators,
        selector: WindowSelector,
        analyzer: Analyzer,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            collaborators,
            selector,
            analyzer: Arc::new(analyzer),
            settings,
        }
    }

    /// Runs passes until `shutdown` fires. Cancellation is only observed between
    /// passes, a cycle in progress always completes.
    ///
    /// Returns an error when the metrics store stays unreachable after the configured
    /// retries.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(interval = ?self.settings.interval, "starting the analysis loop");

        loop {
            self.ensure_metrics_store().await?;

            match self.run_pass(Utc::now()).await {
                Ok(summary) => info!(
                    persisted = summary.persisted,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "analysis pass finished"
                ),
                Err(err) => error!("analysis pass failed: {err:?}"),
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        info!("analysis loop stopped");
        Ok(())
    }

    /// One pass over every registered model.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassSummary> {
        let models = self
            .collaborators
            .registry
            .list_registered_models()
            .wrap_err("failed to list the registered models")?;

        let mut summary = PassSummary::default();
        for model_id in models {
            match self.run_cycle(&model_id, now).await {
                Ok(CycleOutcome::Persisted {
                    drift_score,
                    features,
                    window_size,
                }) => {
                    summary.persisted += 1;
                    info!(%model_id, drift_score, features, window_size, "metrics persisted");
                }
                Ok(CycleOutcome::Skipped(reason)) => {
                    summary.skipped += 1;
                    debug!(%model_id, %reason, "cycle skipped");
                }
                Err(err) => {
                    summary.failed += 1;
                    error!(%model_id, "cycle failed: {err:?}");
                }
            }
        }

        Ok(summary)
    }

    /// One cycle of one model. Either both the performance row and its feature rows
    /// are persisted, or nothing is.
    #[tracing::instrument(level = "debug", skip_all, fields(%model_id))]
    pub async fn run_cycle(&self, model_id: &ModelId, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let observations = match self.selector.select(self.collaborators.observations.as_ref(), model_id, now)? {
            Window::Ready(observations) => observations,
            Window::Insufficient { found, required } => {
                return Ok(CycleOutcome::Skipped(SkipReason::InsufficientData { found, required }));
            }
        };

        let assets = match self.collaborators.assets.load_reference_assets(model_id) {
            Ok(assets) => assets,
            Err(AssetError::AssetsNotFound(_)) => return Ok(CycleOutcome::Skipped(SkipReason::AssetsNotFound)),
            Err(err) => return Err(err).wrap_err_with(|| format!("failed to load the assets of {model_id}")),
        };

        let context = CycleContext {
            model_id: model_id.clone(),
            reference: assets.reference,
            predictor: assets.predictor,
        };
        let analysis = self.analyze(context, observations).await?;
        for skipped in &analysis.skipped_columns {
            warn!(column = %skipped.name, "drift test skipped: {}", skipped.reason);
        }
        debug!(
            reference_rows = analysis.reference_rows,
            current_rows = analysis.current_rows,
            baseline_accuracy = ?analysis.baseline.map(|quality| quality.accuracy),
            "analysis finished"
        );

        let timestamp = match self.collaborators.metrics.latest_timestamp(model_id)? {
            Some(latest) => Utc::now().max(latest),
            None => Utc::now(),
        };
        let reduced = reduce(model_id, timestamp, &analysis);
        self.collaborators
            .metrics
            .persist(&reduced.performance, &reduced.features)
            .wrap_err_with(|| format!("failed to persist the metrics of {model_id}"))?;

        Ok(CycleOutcome::Persisted {
            drift_score: reduced.performance.drift_score,
            features: reduced.features.len(),
            window_size: reduced.performance.window_size,
        })
    }

    /// Builds the current table and analyzes it on the blocking pool, bounded by
    /// the analysis timeout.
    async fn analyze(&self, context: CycleContext, observations: Vec<Observation>) -> Result<AnalysisResult> {
        let analyzer = Arc::clone(&self.analyzer);
        let model_id = context.model_id.clone();
        let task = tokio::task::spawn_blocking(move || {
            let current = CurrentTable::from_observations(&context.reference, &observations, context.predictor.as_ref())?;
            analyzer.analyze(&context.reference, &current)
        });

        let result = tokio::time::timeout(self.settings.analysis_timeout, task)
            .await
            .map_err(|_| eyre!("the analysis of {model_id} timed out after {:?}", self.settings.analysis_timeout))?
            .wrap_err_with(|| format!("the analysis task of {model_id} panicked"))?
            .wrap_err_with(|| format!("failed to analyze {model_id}"))?;

        Ok(result)
    }

    async fn ensure_metrics_store(&self) -> Result<()> {
        let mut backoff = maybe_backoff::MaybeBackoff::default();
        let mut attempt = 0;
        loop {
            backoff.sleep().await;
            match self.collaborators.metrics.ping() {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.settings.store_retry_attempts => {
                    attempt += 1;
                    backoff.arm();
                    warn!(?attempt, "metrics store unreachable, retrying: {err}");
                }
                Err(err) => return Err(err.wrap_err("the metrics store is unreachable")),
            }
        }
    }
}
