use crate::error::{ApiError, ApiResult};
use crate::extract::AdminUser;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use netwarden_core::{Error, Schedule};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    name: String,
    cron_expression: String,
    networks: Vec<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateScheduleRequest {
    name: String,
    cron_expression: String,
    networks: Vec<String>,
    enabled: bool,
}

pub async fn create_schedule(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(body): Json<CreateScheduleRequest>,
) -> ApiResult<Json<Schedule>> {
    netwarden_orchestrator::scheduler::next_run_after(&body.cron_expression, chrono::Utc::now())
        .map_err(ApiError)?;

    let schedule = state
        .store
        .create_schedule(
            &body.name,
            &body.cron_expression,
            &body.networks.join(","),
            body.enabled,
            Some(user.id),
        )
        .await
        .map_err(ApiError)?;

    if schedule.enabled {
        state.scheduler.add_schedule(&schedule).await.map_err(ApiError)?;
    }
    Ok(Json(schedule))
}

pub async fn list_schedules(State(state): State<AppState>) -> ApiResult<Json<Vec<Schedule>>> {
    Ok(Json(state.store.list_schedules().await.map_err(ApiError)?))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<Schedule>> {
    let schedule = state
        .store
        .get_schedule(schedule_id)
        .await
        .map_err(ApiError)?
        .ok_or_else(|| ApiError(Error::NotFound(format!("schedule {schedule_id} not found"))))?;
    Ok(Json(schedule))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(schedule_id): Path<i64>,
    Json(body): Json<UpdateScheduleRequest>,
) -> ApiResult<Json<Schedule>> {
    netwarden_orchestrator::scheduler::next_run_after(&body.cron_expression, chrono::Utc::now())
        .map_err(ApiError)?;

    state
        .store
        .update_schedule(
            schedule_id,
            &body.name,
            &body.cron_expression,
            &body.networks.join(","),
            body.enabled,
        )
        .await
        .map_err(ApiError)?;

    let schedule = state
        .store
        .get_schedule(schedule_id)
        .await
        .map_err(ApiError)?
        .ok_or_else(|| ApiError(Error::NotFound(format!("schedule {schedule_id} not found"))))?;

    if schedule.enabled {
        state.scheduler.update_schedule(&schedule).await.map_err(ApiError)?;
    } else {
        state.scheduler.remove_schedule(schedule.id).await.map_err(ApiError)?;
    }
    Ok(Json(schedule))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(schedule_id): Path<i64>,
) -> ApiResult<axum::http::StatusCode> {
    state.scheduler.remove_schedule(schedule_id).await.map_err(ApiError)?;
    state.store.delete_schedule(schedule_id).await.map_err(ApiError)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn trigger_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state.scheduler.trigger(schedule_id).await.map_err(ApiError)?;
    Ok(Json(serde_json::json!({ "status": "triggered" })))
}
