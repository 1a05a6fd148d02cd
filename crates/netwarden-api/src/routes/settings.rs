use crate::error::{ApiError, ApiResult};
use crate::extract::AdminUser;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use netwarden_core::{
    setting_keys, Error, MAX_DATA_RETENTION_DAYS, MAX_SCAN_PARALLELISM, MIN_DATA_RETENTION_DAYS,
    MIN_SCAN_PARALLELISM,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct SettingsResponse {
    scan_parallelism: i64,
    data_retention_days: i64,
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    scan_parallelism: i64,
    data_retention_days: i64,
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    Ok(Json(SettingsResponse {
        scan_parallelism: state.store.scan_parallelism().await.map_err(ApiError)?,
        data_retention_days: state.store.data_retention_days().await.map_err(ApiError)?,
    }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    if !(MIN_SCAN_PARALLELISM..=MAX_SCAN_PARALLELISM).contains(&body.scan_parallelism) {
        return Err(ApiError(Error::Validation(format!(
            "scan_parallelism must be between {MIN_SCAN_PARALLELISM} and {MAX_SCAN_PARALLELISM}"
        ))));
    }
    if !(MIN_DATA_RETENTION_DAYS..=MAX_DATA_RETENTION_DAYS).contains(&body.data_retention_days) {
        return Err(ApiError(Error::Validation(format!(
            "data_retention_days must be between {MIN_DATA_RETENTION_DAYS} and {MAX_DATA_RETENTION_DAYS}"
        ))));
    }

    state
        .store
        .setting_set(setting_keys::SCAN_PARALLELISM, &body.scan_parallelism.to_string())
        .await
        .map_err(ApiError)?;
    state
        .store
        .setting_set(
            setting_keys::DATA_RETENTION_DAYS,
            &body.data_retention_days.to_string(),
        )
        .await
        .map_err(ApiError)?;

    Ok(Json(SettingsResponse {
        scan_parallelism: body.scan_parallelism,
        data_retention_days: body.data_retention_days,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
