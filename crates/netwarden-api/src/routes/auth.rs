use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use netwarden_core::Role;
use netwarden_orchestrator::Auth;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    access_token: String,
    refresh_token: String,
    must_change_password: bool,
    role: Role,
    username: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    id: i64,
    username: String,
    role: Role,
    must_change_password: bool,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let auth = Auth::new(&state.store, &state.config);
    let result = auth.login(&body.username, &body.password).await.map_err(ApiError)?;
    Ok(Json(TokenResponse {
        access_token: result.tokens.access_token,
        refresh_token: result.tokens.refresh_token,
        must_change_password: result.must_change_password,
        role: result.role,
        username: result.username,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let auth = Auth::new(&state.store, &state.config);
    let tokens = auth.refresh(&body.refresh_token).await.map_err(ApiError)?;
    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        must_change_password: user.must_change_password,
    })
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let auth = Auth::new(&state.store, &state.config);
    auth.change_password(&user, &body.current_password, &body.new_password)
        .await
        .map_err(ApiError)?;
    Ok(Json(serde_json::json!({ "status": "password changed" })))
}
