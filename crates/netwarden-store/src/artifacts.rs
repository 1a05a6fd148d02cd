use crate::{map_sqlx, Store};
use netwarden_core::{Artifact, ArtifactType, Result};
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct RawArtifactRow {
    id: i64,
    scan_id: i64,
    r#type: String,
    file_path: String,
    file_size: Option<i64>,
}

impl RawArtifactRow {
    fn into_artifact(self) -> Result<Artifact> {
        Ok(Artifact {
            id: self.id,
            scan_id: self.scan_id,
            artifact_type: ArtifactType::from_str(&self.r#type)?,
            file_path: self.file_path,
            file_size: self.file_size,
        })
    }
}

impl Store {
    /// Records a generated report/graph file. Report generation is
    /// best-effort: a missing renderer means the artifact is simply absent,
    /// never an error (spec §4.D.8), so this is only called on success.
    pub async fn create_artifact(
        &self,
        scan_id: i64,
        artifact_type: ArtifactType,
        file_path: &str,
        file_size: Option<i64>,
    ) -> Result<Artifact> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO artifacts (scan_id, type, file_path, file_size) VALUES (?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(scan_id)
        .bind(artifact_type.to_string())
        .bind(file_path)
        .bind(file_size)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx)?;

        self.get_artifact(id).await?.ok_or_else(|| {
            netwarden_core::Error::Store("artifact vanished immediately after insert".to_string())
        })
    }

    pub async fn get_artifact(&self, id: i64) -> Result<Option<Artifact>> {
        let row = sqlx::query_as::<_, RawArtifactRow>(
            "SELECT id, scan_id, type, file_path, file_size FROM artifacts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx)?;
        row.map(RawArtifactRow::into_artifact).transpose()
    }

    pub async fn list_artifacts_for_scan(&self, scan_id: i64) -> Result<Vec<Artifact>> {
        let rows = sqlx::query_as::<_, RawArtifactRow>(
            "SELECT id, scan_id, type, file_path, file_size FROM artifacts \
             WHERE scan_id = ? ORDER BY id",
        )
        .bind(scan_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(RawArtifactRow::into_artifact).collect()
    }
}
