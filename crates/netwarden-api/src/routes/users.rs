use crate::error::{ApiError, ApiResult};
use crate::extract::AdminUser;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use netwarden_core::User;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct UserView {
    id: i64,
    username: String,
    email: Option<String>,
    role: netwarden_core::Role,
    is_active: bool,
    must_change_password: bool,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        UserView {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            is_active: u.is_active,
            must_change_password: u.must_change_password,
        }
    }
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    new_password: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserView>>> {
    let users = state.store.list_users().await.map_err(ApiError)?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

pub async fn reset_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<i64>,
    Json(body): Json<ResetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let auth = netwarden_orchestrator::Auth::new(&state.store, &state.config);
    auth.reset_password(user_id, &body.new_password).await.map_err(ApiError)?;
    Ok(Json(serde_json::json!({ "status": "password reset" })))
}
