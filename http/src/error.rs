use axum::{
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};
use drift_monitor_analysis::AssetError;
use drift_monitor_store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("The request is invalid: {0}")]
    BadRequest(String),
    #[error("The model assets cannot be used: {0}")]
    Assets(#[from] AssetError),
    #[error("The store failed: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::AlreadyRegistered(_)) => StatusCode::CONFLICT,
            AppError::Assets(AssetError::InvalidReference { .. } | AssetError::InvalidModel { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Assets(_) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        (status, axum::Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
