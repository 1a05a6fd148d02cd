//! `Authorization: Bearer <token>` extractors used by mutation handlers.

use crate::state::AppState;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use netwarden_core::{Role, User};
use netwarden_orchestrator::Auth;
use serde_json::json;

pub struct AuthRejection {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

fn unauthorized(message: impl Into<String>) -> AuthRejection {
    AuthRejection {
        status: StatusCode::UNAUTHORIZED,
        message: message.into(),
    }
}

fn forbidden(message: impl Into<String>) -> AuthRejection {
    AuthRejection {
        status: StatusCode::FORBIDDEN,
        message: message.into(),
    }
}

/// Any authenticated, active user.
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(parts)?;

        let auth = Auth::new(&app_state.store, &app_state.config);
        let user = auth
            .authenticate(&token)
            .await
            .map_err(|e| unauthorized(e.to_string()))?;
        Ok(AuthUser(user))
    }
}

/// An authenticated user holding the `admin` role; required by every
/// mutation endpoint in the external interface table.
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(forbidden("admin role required"));
        }
        Ok(AdminUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AuthRejection> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing Authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| unauthorized("Authorization header must be a Bearer token"))
}
