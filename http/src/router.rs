use crate::handlers::{
    feature_drift,
    ingest,
    list_models,
    metrics,
    register_model,
};
use axum::{
    routing::{
        get,
        post,
    },
    Router,
};
use drift_monitor_store::{
    FsAssetProvider,
    SqliteMetricsStore,
    SqliteModelRegistry,
    SqliteObservationStore,
};
use eyre::Result;
use std::{
    net::SocketAddr,
    sync::Arc,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub observations: Arc<SqliteObservationStore>,
    pub metrics: Arc<SqliteMetricsStore>,
    pub registry: Arc<SqliteModelRegistry>,
    pub assets: Arc<FsAssetProvider>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ingest", post(ingest))
        .route("/models", get(list_models).post(register_model))
        .route("/api/metrics/{model_id}", get(metrics))
        .route("/api/feature_drift/{model_id}", get(feature_drift))
        .with_state(state)
}

/// Serves the API until `shutdown` fires.
pub async fn serve(listen_address: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(listen_address).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state).into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "Hello!"
}
