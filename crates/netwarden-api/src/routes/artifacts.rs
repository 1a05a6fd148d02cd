use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use netwarden_core::{ArtifactType, Error};
use std::str::FromStr;

fn content_type(artifact_type: ArtifactType) -> &'static str {
    match artifact_type {
        ArtifactType::Html => "text/html",
        ArtifactType::Png => "image/png",
        ArtifactType::Svg => "image/svg+xml",
        ArtifactType::Xlsx => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        ArtifactType::Dot => "text/vnd.graphviz",
        ArtifactType::Xml => "application/xml",
    }
}

pub async fn get_artifact(
    State(state): State<AppState>,
    Path((scan_id, artifact_type)): Path<(i64, String)>,
) -> ApiResult<Response> {
    let artifact_type = ArtifactType::from_str(&artifact_type).map_err(ApiError)?;

    let artifact = state
        .store
        .list_artifacts_for_scan(scan_id)
        .await
        .map_err(ApiError)?
        .into_iter()
        .find(|a| a.artifact_type == artifact_type)
        .ok_or_else(|| {
            ApiError(Error::NotFound(format!(
                "no {artifact_type} artifact for scan {scan_id}"
            )))
        })?;

    let bytes = tokio::fs::read(&artifact.file_path)
        .await
        .map_err(|e| ApiError(Error::Io(e)))?;

    Ok((
        [(header::CONTENT_TYPE, content_type(artifact_type))],
        Body::from(bytes),
    )
        .into_response())
}
