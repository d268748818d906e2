use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{EditableRecord, Id};
use crate::store::memory::{BackendError, InMemoryBackend};

/// State of one collection router.
pub type CollectionState<R> = Arc<InMemoryBackend<R>>;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

fn error_response(err: BackendError) -> ApiError {
    let status = match &err {
        BackendError::EmptyKey { .. } => StatusCode::BAD_REQUEST,
        BackendError::NotFound { .. } => StatusCode::NOT_FOUND,
        BackendError::Conflict { .. } => StatusCode::CONFLICT,
        BackendError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        warn!("{}", err);
    } else {
        debug!("{}", err);
    }
    (status, Json(ErrorResponse::new(&err.to_string())))
}

pub async fn list_records<R: EditableRecord>(
    State(collection): State<CollectionState<R>>,
) -> Result<Json<Vec<R>>, ApiError> {
    collection.list().map(Json).map_err(error_response)
}

pub async fn get_record<R: EditableRecord>(
    State(collection): State<CollectionState<R>>,
    Path(key): Path<Id>,
) -> Result<Json<R>, ApiError> {
    collection.find(&key).map(Json).map_err(error_response)
}

pub async fn create_record<R: EditableRecord>(
    State(collection): State<CollectionState<R>>,
    Json(record): Json<R>,
) -> Result<(StatusCode, Json<R>), ApiError> {
    let created = collection.insert(record).map_err(error_response)?;
    info!("Created {} '{}'", R::KIND, created.business_key());
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace the record stored under `key`. The body may carry a new key.
pub async fn update_record<R: EditableRecord>(
    State(collection): State<CollectionState<R>>,
    Path(key): Path<Id>,
    Json(record): Json<R>,
) -> Result<Json<R>, ApiError> {
    let updated = collection.replace(&key, record).map_err(error_response)?;
    if updated.business_key() != key {
        info!("Renamed {} '{}' to '{}'", R::KIND, key, updated.business_key());
    } else {
        info!("Updated {} '{}'", R::KIND, key);
    }
    Ok(Json(updated))
}

pub async fn delete_record<R: EditableRecord>(
    State(collection): State<CollectionState<R>>,
    Path(key): Path<Id>,
) -> Result<StatusCode, ApiError> {
    collection.remove(&key).map_err(error_response)?;
    info!("Deleted {} '{}'", R::KIND, key);
    Ok(StatusCode::NO_CONTENT)
}
