use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        Path,
        State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use drift_monitor_analysis::{
    FeatureDriftRow,
    ModelId,
    Observation,
    PerformanceRow,
};
use drift_monitor_store::{
    LogisticModel,
    RegisteredModel,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub model_id: ModelId,
    pub features: BTreeMap<String, f64>,
    pub ground_truth: i64,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub id: i64,
}

/// Appends one observation, stamped with the server clock.
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    if request.model_id.as_str().trim().is_empty() {
        return Err(AppError::BadRequest("model_id must not be empty".to_string()));
    }
    if request.features.is_empty() {
        return Err(AppError::BadRequest("features must not be empty".to_string()));
    }
    if let Some((name, _)) = request.features.iter().find(|(_, v)| !v.is_finite()) {
        return Err(AppError::BadRequest(format!("feature `{name}` is not a finite number")));
    }

    let observation = Observation {
        model_id: request.model_id,
        features: request.features,
        ground_truth: request.ground_truth,
        ingested_at: Utc::now(),
    };
    let id = state.observations.append(&observation)?;
    debug!(model_id = %observation.model_id, id, "observation ingested");

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { status: "accepted", id })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub model_name: String,
    pub model_version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub model: LogisticModel,
    pub reference_csv: String,
}

/// Registers a new model version and stores its assets.
///
/// Assets are validated first and only written once the registry accepted the
/// identifier, so a conflicting request never replaces the files of a known model.
pub async fn register_model(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredModel>), AppError> {
    let model_name = request.model_name.trim();
    let model_version = request.model_version.trim();
    if model_name.is_empty() || model_version.is_empty() {
        return Err(AppError::BadRequest("model_name and model_version are required".to_string()));
    }

    let model_id = ModelId::from_name_and_version(model_name, model_version);
    let staged = state
        .assets
        .stage_assets(&model_id, request.reference_csv.as_bytes(), &request.model)?;
    let registered = state
        .registry
        .register(model_name, model_version, request.description.as_deref())?;
    staged.write()?;

    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<RegisteredModel>>, AppError> {
    Ok(Json(state.registry.list()?))
}

/// Performance series of a model, oldest first.
pub async fn metrics(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Json<Vec<PerformanceRow>>, AppError> {
    Ok(Json(state.metrics.performance_series(&ModelId::new(model_id))?))
}

/// Latest per-feature drift snapshot of a model, strongest drift first.
pub async fn feature_drift(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Json<Vec<FeatureDriftRow>>, AppError> {
    Ok(Json(state.metrics.latest_feature_drift(&ModelId::new(model_id))?))
}
