use crate::{map_sqlx, Store};
use chrono::{DateTime, Utc};
use netwarden_core::{Error, Result, Scan, ScanStatus};
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct RawScanRow {
    id: i64,
    network_range: String,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    progress_percent: i64,
    progress_message: Option<String>,
    error_message: Option<String>,
    schedule_id: Option<i64>,
    external_pid: Option<i64>,
}

impl RawScanRow {
    fn into_scan(self) -> Result<Scan> {
        Ok(Scan {
            id: self.id,
            network_range: self.network_range,
            status: ScanStatus::from_str(&self.status)?,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
            progress_percent: self.progress_percent as i32,
            progress_message: self.progress_message,
            error_message: self.error_message,
            schedule_id: self.schedule_id,
            external_pid: self.external_pid,
        })
    }
}

const SELECT_SCAN: &str = "SELECT id, network_range, status, created_at, started_at, \
     completed_at, updated_at, progress_percent, progress_message, error_message, schedule_id, \
     external_pid FROM scans";

impl Store {
    /// Creates a new pending scan row.
    pub async fn create_scan(&self, network_range: &str, schedule_id: Option<i64>) -> Result<Scan> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO scans (network_range, status, created_at, updated_at, \
             progress_percent, schedule_id) VALUES (?, 'pending', ?, ?, 0, ?) \
             RETURNING id",
        )
        .bind(network_range)
        .bind(now)
        .bind(now)
        .bind(schedule_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx)?;

        self.get_scan(id)
            .await?
            .ok_or_else(|| Error::Store("scan vanished immediately after insert".to_string()))
    }

    pub async fn get_scan(&self, id: i64) -> Result<Option<Scan>> {
        let row = sqlx::query_as::<_, RawScanRow>(&format!("{SELECT_SCAN} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx)?;

        row.map(RawScanRow::into_scan).transpose()
    }

    /// Newest-first page of scans.
    pub async fn list_scans(&self, skip: i64, limit: i64) -> Result<Vec<Scan>> {
        let rows = sqlx::query_as::<_, RawScanRow>(&format!(
            "{SELECT_SCAN} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(RawScanRow::into_scan).collect()
    }

    /// All scans currently `pending` or `running`, used by the watchdog sweep.
    pub async fn list_active_scans(&self) -> Result<Vec<Scan>> {
        let rows = sqlx::query_as::<_, RawScanRow>(&format!(
            "{SELECT_SCAN} WHERE status IN ('pending', 'running')"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(RawScanRow::into_scan).collect()
    }

    /// Transitions `scan_id` from `pending` to `running`, stamping `started_at`.
    pub async fn begin_scan(&self, scan_id: i64) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE scans SET status = 'running', started_at = ?, updated_at = ? WHERE id = ? \
             AND status = 'pending'",
        )
        .bind(now)
        .bind(now)
        .bind(scan_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Records (or clears, with `None`) the pid of the discovery-phase
    /// scanner process currently running for this scan.
    pub async fn set_scan_pid(&self, scan_id: i64, pid: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE scans SET external_pid = ? WHERE id = ?")
            .bind(pid)
            .bind(scan_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    /// Updates progress percent/message. The monotonicity invariant
    /// (`progress_percent` never decreases within one run) is the caller's
    /// responsibility — the orchestrator is the only writer in practice.
    pub async fn update_scan_progress(
        &self,
        scan_id: i64,
        progress_percent: i32,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE scans SET progress_percent = ?, progress_message = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(progress_percent)
        .bind(message)
        .bind(Utc::now())
        .bind(scan_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn complete_scan(&self, scan_id: i64, message: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE scans SET status = 'completed', progress_percent = 100, \
             progress_message = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(message)
        .bind(now)
        .bind(now)
        .bind(scan_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Marks a scan failed unless it already reached a terminal state.
    pub async fn fail_scan(&self, scan_id: i64, error_message: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE scans SET status = 'failed', error_message = ?, \
             progress_message = ?, completed_at = ?, updated_at = ? WHERE id = ? \
             AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(error_message)
        .bind(format!("Scan failed: {error_message}"))
        .bind(now)
        .bind(now)
        .bind(scan_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Marks a scan cancelled, used by the stuck-scan watchdog.
    pub async fn cancel_scan(&self, scan_id: i64, reason: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE scans SET status = 'cancelled', error_message = ?, completed_at = ?, \
             updated_at = ? WHERE id = ? AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(reason)
        .bind(now)
        .bind(now)
        .bind(scan_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Scans whose `created_at` is older than `cutoff`, used by the
    /// data-retention cleanup job.
    pub async fn list_scans_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Scan>> {
        let rows = sqlx::query_as::<_, RawScanRow>(&format!(
            "{SELECT_SCAN} WHERE created_at < ? ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(RawScanRow::into_scan).collect()
    }

    /// Deletes a scan and every row that transitively belongs to it
    /// (cascades to hosts, ports, traceroute hops, and artifacts via
    /// `ON DELETE CASCADE`). Returns the deleted artifacts' file paths so the
    /// caller can remove them from disk — the store only owns the database.
    pub async fn delete_scan(&self, scan_id: i64) -> Result<Vec<String>> {
        let paths: Vec<String> =
            sqlx::query_scalar("SELECT file_path FROM artifacts WHERE scan_id = ?")
                .bind(scan_id)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx)?;

        sqlx::query("DELETE FROM scans WHERE id = ?")
            .bind(scan_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;

        Ok(paths)
    }

    /// Backdates a scan's `created_at`/`updated_at` for watchdog tests that
    /// need to simulate a stale scan without sleeping in real time.
    #[cfg(feature = "test-support")]
    pub async fn backdate_scan_for_test(
        &self,
        scan_id: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE scans SET created_at = ?, updated_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(updated_at)
            .bind(scan_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use netwarden_core::ScanStatus;

    #[tokio::test]
    async fn create_scan_starts_pending() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Pending);
        assert_eq!(scan.progress_percent, 0);
        assert!(scan.started_at.is_none());
    }

    #[tokio::test]
    async fn lifecycle_transitions_are_terminal() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();

        store.begin_scan(scan.id).await.unwrap();
        let running = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(running.status, ScanStatus::Running);
        assert!(running.started_at.is_some());

        store.complete_scan(scan.id, "done").await.unwrap();
        let completed = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(completed.status, ScanStatus::Completed);
        assert_eq!(completed.progress_percent, 100);
        assert!(completed.completed_at.is_some());

        // A scan that already reached a terminal state never reverts.
        store.fail_scan(scan.id, "too late").await.unwrap();
        let still_completed = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(still_completed.status, ScanStatus::Completed);
    }

    #[tokio::test]
    async fn delete_scan_returns_artifact_paths_for_caller_cleanup() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        store
            .create_artifact(
                scan.id,
                netwarden_core::ArtifactType::Html,
                "/tmp/report.html",
                Some(1024),
            )
            .await
            .unwrap();

        let paths = store.delete_scan(scan.id).await.unwrap();
        assert_eq!(paths, vec!["/tmp/report.html".to_string()]);
        assert!(store.get_scan(scan.id).await.unwrap().is_none());
    }
}
