//! Cron-driven recurring scans. A durable `Schedule` row is mirrored into an
//! in-memory job set; firing a job synthesizes a pending `Scan` and hands it
//! to an [`Orchestrator`] on a detached task, exactly like an API-submitted
//! scan.

use crate::orchestrator::Orchestrator;
use chrono::{DateTime, Utc};
use croner::Cron;
use netwarden_core::{Error, Result, Schedule};
use netwarden_store::Store;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Validates a cron expression is 5- or 6-field and parses with [`croner`].
fn parse_cron(expression: &str) -> Result<Cron> {
    let field_count = expression.split_whitespace().count();
    if field_count != 5 && field_count != 6 {
        return Err(Error::Validation(format!(
            "cron expression must have 5 or 6 fields, got {field_count}: {expression:?}"
        )));
    }
    Cron::new(expression)
        .parse()
        .map_err(|e| Error::Validation(format!("invalid cron expression {expression:?}: {e}")))
}

/// tokio-cron-scheduler's underlying `cron` crate always expects seconds
/// first; the schedule table stores the conventional minute-first dialect,
/// so a 5-field expression needs `0 ` prepended before it can drive a job.
fn with_seconds_field(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// The next UTC firing time of `expression` strictly after `from`.
pub fn next_run_after(expression: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let cron = parse_cron(expression)?;
    cron.find_next_occurrence(&from, false)
        .map_err(|e| Error::Validation(format!("failed to compute next run: {e}")))
}

pub struct Scheduler {
    store: Store,
    output_dir: PathBuf,
    inner: JobScheduler,
    job_ids: Arc<Mutex<HashMap<i64, Uuid>>>,
}

impl Scheduler {
    pub async fn new(store: Store, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .map_err(|e| Error::Store(format!("failed to start job scheduler: {e}")))?;
        Ok(Self {
            store,
            output_dir: output_dir.into(),
            inner,
            job_ids: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Loads every enabled schedule, wires the daily retention-cleanup job
    /// and the 10-minute stuck-scan sweep, and starts the tick engine.
    pub async fn start(&self) -> Result<()> {
        for schedule in self.store.list_enabled_schedules().await? {
            if let Err(e) = self.add_schedule(&schedule).await {
                error!(schedule_id = schedule.id, error = %e, "failed to schedule job");
            }
        }
        self.add_cleanup_job().await?;
        self.add_watchdog_job().await?;

        self.inner
            .start()
            .await
            .map_err(|e| Error::Store(format!("failed to start job scheduler: {e}")))?;
        Ok(())
    }

    pub async fn add_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.remove_schedule(schedule.id).await?;

        let job_expr = with_seconds_field(&schedule.cron_expression);
        let schedule_id = schedule.id;
        let store = self.store.clone();
        let output_dir = self.output_dir.clone();

        let job = Job::new_async(job_expr.as_str(), move |_uuid, _l| {
            let store = store.clone();
            let output_dir = output_dir.clone();
            Box::pin(async move {
                fire_schedule(&store, &output_dir, schedule_id).await;
            })
        })
        .map_err(|e| Error::Validation(format!("invalid cron expression: {e}")))?;

        let uuid = self
            .inner
            .add(job)
            .await
            .map_err(|e| Error::Store(format!("failed to register job: {e}")))?;
        self.job_ids.lock().await.insert(schedule.id, uuid);
        info!(schedule_id = schedule.id, cron = %schedule.cron_expression, "added schedule job");
        Ok(())
    }

    pub async fn remove_schedule(&self, schedule_id: i64) -> Result<()> {
        let uuid = self.job_ids.lock().await.remove(&schedule_id);
        if let Some(uuid) = uuid {
            if let Err(e) = self.inner.remove(&uuid).await {
                warn!(schedule_id, error = %e, "job not found in scheduler during removal");
            }
        }
        Ok(())
    }

    pub async fn update_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.add_schedule(schedule).await
    }

    /// Executes a schedule immediately, independent of its cron timer.
    pub async fn trigger(&self, schedule_id: i64) -> Result<()> {
        let schedule = self
            .store
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id} not found")))?;
        if !schedule.enabled {
            return Err(Error::Validation(format!(
                "schedule {schedule_id} is disabled"
            )));
        }
        fire_schedule(&self.store, &self.output_dir, schedule.id).await;
        Ok(())
    }

    async fn add_cleanup_job(&self) -> Result<()> {
        let store = self.store.clone();
        let job = Job::new_async("0 0 2 * * *", move |_uuid, _l| {
            let store = store.clone();
            Box::pin(async move {
                if let Err(e) = run_retention_cleanup(&store).await {
                    error!(error = %e, "data retention cleanup failed");
                }
            })
        })
        .map_err(|e| Error::Store(format!("failed to build cleanup job: {e}")))?;
        self.inner
            .add(job)
            .await
            .map_err(|e| Error::Store(format!("failed to register cleanup job: {e}")))?;
        Ok(())
    }

    async fn add_watchdog_job(&self) -> Result<()> {
        let store = self.store.clone();
        let job = Job::new_async("0 */10 * * * *", move |_uuid, _l| {
            let store = store.clone();
            Box::pin(async move {
                let watchdog = crate::watchdog::Watchdog::new(&store);
                match watchdog.sweep().await {
                    Ok(0) => {}
                    Ok(n) => warn!(fixed = n, "stuck scan monitor fixed scans"),
                    Err(e) => error!(error = %e, "stuck scan monitor failed"),
                }
            })
        })
        .map_err(|e| Error::Store(format!("failed to build watchdog job: {e}")))?;
        self.inner
            .add(job)
            .await
            .map_err(|e| Error::Store(format!("failed to register watchdog job: {e}")))?;
        Ok(())
    }
}

/// Creates the pending `Scan` row for a firing schedule, stamps its
/// bookkeeping, and runs the orchestration on a detached task so the
/// scheduler tick never blocks on a full scan.
async fn fire_schedule(store: &Store, output_dir: &std::path::Path, schedule_id: i64) {
    let schedule = match store.get_schedule(schedule_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            error!(schedule_id, "schedule not found at fire time");
            return;
        }
        Err(e) => {
            error!(schedule_id, error = %e, "failed to load schedule at fire time");
            return;
        }
    };
    if !schedule.enabled {
        info!(schedule_id, "schedule disabled, skipping fire");
        return;
    }

    let scan = match store
        .create_scan(&schedule.network_range, Some(schedule_id))
        .await
    {
        Ok(scan) => scan,
        Err(e) => {
            error!(schedule_id, error = %e, "failed to create scan for schedule");
            return;
        }
    };
    info!(schedule_id, scan_id = scan.id, "created scan for schedule");

    let next_run = next_run_after(&schedule.cron_expression, Utc::now())
        .ok();
    if let Err(e) = store.record_schedule_run(schedule_id, next_run).await {
        error!(schedule_id, error = %e, "failed to record schedule run");
    }

    let store = store.clone();
    let output_dir = output_dir.to_path_buf();
    let networks = schedule.networks();
    tokio::spawn(async move {
        let orchestrator = Orchestrator::new(store, output_dir);
        if let Err(e) = orchestrator.execute_scan(scan.id, &networks).await {
            error!(scan_id = scan.id, error = %e, "scheduled scan failed");
        }
    });
}

/// Deletes every scan (and its artifact files) older than the configured
/// data-retention window. Run daily by the scheduler's cleanup job, and
/// exposed publicly so `netwarden db cleanup` can trigger it on demand.
pub async fn run_retention_cleanup(store: &Store) -> Result<()> {
    let retention_days = store.data_retention_days().await?.clamp(1, 365);
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    info!(retention_days, %cutoff, "starting data retention cleanup");

    let stale = store.list_scans_older_than(cutoff).await?;
    if stale.is_empty() {
        return Ok(());
    }

    let mut removed = 0;
    for scan in &stale {
        let artifact_paths = store.delete_scan(scan.id).await?;
        for path in artifact_paths {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path, error = %e, "failed to delete artifact file during retention cleanup");
            }
        }
        removed += 1;
    }
    info!(removed, "data retention cleanup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cron_accepts_five_and_six_fields() {
        assert!(parse_cron("0 2 * * *").is_ok());
        assert!(parse_cron("30 0 2 * * *").is_ok());
        assert!(parse_cron("not a cron").is_err());
    }

    #[test]
    fn with_seconds_field_prepends_zero_for_five_field_expressions() {
        assert_eq!(with_seconds_field("0 2 * * *"), "0 0 2 * * *");
        assert_eq!(with_seconds_field("30 0 2 * * *"), "30 0 2 * * *");
    }

    #[test]
    fn next_run_after_is_strictly_after_now() {
        let now = Utc::now();
        let next = next_run_after("0 2 * * *", now).unwrap();
        assert!(next > now);
    }

    #[tokio::test]
    async fn trigger_creates_a_pending_scan() {
        let store = Store::connect_memory().await.unwrap();
        let schedule = store
            .create_schedule("nightly", "0 2 * * *", "10.0.0.0/24", true, None)
            .await
            .unwrap();

        let scheduler = Scheduler::new(store.clone(), std::env::temp_dir())
            .await
            .unwrap();
        scheduler.trigger(schedule.id).await.unwrap();

        let scans = store.list_scans(0, 10).await.unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].schedule_id, Some(schedule.id));
    }

    #[tokio::test]
    async fn trigger_rejects_disabled_schedule() {
        let store = Store::connect_memory().await.unwrap();
        let schedule = store
            .create_schedule("nightly", "0 2 * * *", "10.0.0.0/24", false, None)
            .await
            .unwrap();

        let scheduler = Scheduler::new(store, std::env::temp_dir()).await.unwrap();
        let err = scheduler.trigger(schedule.id).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
