use crate::drift::{
    drift_factor,
    DriftTargets,
};
use chrono::Utc;
use drift_monitor_analysis::{
    ModelId,
    ReferenceTable,
};
use eyre::{
    Context as _,
    Result,
};
use rand::{
    rngs::StdRng,
    Rng,
    SeedableRng,
};
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    time::Duration,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    pub api_url: Url,
    pub send_interval: Duration,
    pub grace_period: Duration,
    pub retry_interval: Duration,
}

/// Body of `POST /ingest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestPayload {
    pub model_id: ModelId,
    pub features: BTreeMap<String, f64>,
    pub ground_truth: i64,
}

pub struct Simulator {
    http_client: HttpClient,
    ingest_url: Url,
    model_id: ModelId,
    reference: ReferenceTable,
    targets: DriftTargets,
    settings: SimulatorSettings,
    rng: StdRng,
}

/// `base` with `path` appended to its path. A base without a trailing slash is
/// treated as a directory rather than having its last segment replaced.
fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    if base.path().ends_with('/') {
        base.join(path)
    } else {
        let mut base = base.clone();
        base.set_path(&format!("{}/", base.path()));
        base.join(path)
    }
}

impl Simulator {
    pub fn new(model_id: ModelId, reference: ReferenceTable, settings: SimulatorSettings) -> Result<Self> {
        Self::with_rng(model_id, reference, settings, StdRng::from_entropy())
    }

    pub fn with_rng(model_id: ModelId, reference: ReferenceTable, settings: SimulatorSettings, rng: StdRng) -> Result<Self> {
        let ingest_url =
            endpoint(&settings.api_url, "ingest").wrap_err_with(|| format!("Invalid API url {}", settings.api_url))?;
        let targets = DriftTargets::for_features(reference.feature_names());
        debug!(%model_id, ?targets, "drift columns resolved");

        Ok(Self {
            http_client: HttpClient::new(),
            ingest_url,
            model_id,
            reference,
            targets,
            settings,
            rng,
        })
    }

    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }

    /// A uniformly sampled reference row, distorted with the drift of
    /// `unix_seconds` when `drifting`.
    pub fn sample(&mut self, drifting: bool, unix_seconds: i64) -> IngestPayload {
        let row = self.rng.gen_range(0..self.reference.n_rows());
        let mut values = self.reference.features().row(row).to_vec();
        if drifting {
            self.targets.apply(&mut values, drift_factor(unix_seconds), &mut self.rng);
        }

        IngestPayload {
            model_id: self.model_id.clone(),
            features: self.reference.feature_names().iter().cloned().zip(values).collect(),
            ground_truth: self.reference.target()[row],
        }
    }

    async fn send(&self, payload: &IngestPayload) -> Result<()> {
        self.http_client
            .post(self.ingest_url.clone())
            .json(payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Posts observations until `cancel` fires and returns how many were accepted.
    /// Failed requests are retried after the retry interval.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<u64> {
        info!(
            model_id = %self.model_id,
            url = %self.ingest_url,
            grace_period = ?self.settings.grace_period,
            "starting simulation"
        );
        let started = Instant::now();
        let mut drift_engaged = false;
        let mut sent = 0;

        loop {
            if !drift_engaged && started.elapsed() >= self.settings.grace_period {
                info!(model_id = %self.model_id, "grace period over, drift engaged");
                drift_engaged = true;
            }

            let payload = self.sample(drift_engaged, Utc::now().timestamp());
            let delay = match self.send(&payload).await {
                Ok(()) => {
                    sent += 1;
                    debug!(sent, "observation sent");
                    self.settings.send_interval
                }
                Err(err) => {
                    warn!("Could not reach {}: {err}. Retrying in {:?}", self.ingest_url, self.settings.retry_interval);
                    self.settings.retry_interval
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(model_id = %self.model_id, sent, "simulation stopped");
        Ok(sent)
    }
}
