use crate::row::{bool_to_int, int_to_bool};
use crate::{map_sqlx, Store};
use chrono::{DateTime, Utc};
use netwarden_core::{Error, Result, Schedule};

#[derive(sqlx::FromRow)]
struct RawScheduleRow {
    id: i64,
    name: String,
    cron_expression: String,
    network_range: String,
    enabled: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    created_by: Option<i64>,
}

impl From<RawScheduleRow> for Schedule {
    fn from(r: RawScheduleRow) -> Self {
        Schedule {
            id: r.id,
            name: r.name,
            cron_expression: r.cron_expression,
            network_range: r.network_range,
            enabled: int_to_bool(r.enabled),
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_run_at: r.last_run_at,
            next_run_at: r.next_run_at,
            created_by: r.created_by,
        }
    }
}

const SELECT_SCHEDULE: &str = "SELECT id, name, cron_expression, network_range, enabled, \
     created_at, updated_at, last_run_at, next_run_at, created_by FROM schedules";

impl Store {
    pub async fn create_schedule(
        &self,
        name: &str,
        cron_expression: &str,
        network_range: &str,
        enabled: bool,
        created_by: Option<i64>,
    ) -> Result<Schedule> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO schedules (name, cron_expression, network_range, enabled, created_at, \
             updated_at, created_by) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(cron_expression)
        .bind(network_range)
        .bind(bool_to_int(enabled))
        .bind(now)
        .bind(now)
        .bind(created_by)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx)?;

        self.get_schedule(id)
            .await?
            .ok_or_else(|| Error::Store("schedule vanished immediately after insert".to_string()))
    }

    pub async fn get_schedule(&self, id: i64) -> Result<Option<Schedule>> {
        let row = sqlx::query_as::<_, RawScheduleRow>(&format!("{SELECT_SCHEDULE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(Schedule::from))
    }

    pub async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, RawScheduleRow>(&format!(
            "{SELECT_SCHEDULE} ORDER BY name"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    pub async fn list_enabled_schedules(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, RawScheduleRow>(&format!(
            "{SELECT_SCHEDULE} WHERE enabled = 1 ORDER BY name"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    pub async fn count_enabled_schedules(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM schedules WHERE enabled = 1")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_schedule(
        &self,
        id: i64,
        name: &str,
        cron_expression: &str,
        network_range: &str,
        enabled: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE schedules SET name = ?, cron_expression = ?, network_range = ?, \
             enabled = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(cron_expression)
        .bind(network_range)
        .bind(bool_to_int(enabled))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Stamps the run bookkeeping after the scheduler fires a schedule.
    pub async fn record_schedule_run(
        &self,
        id: i64,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE schedules SET last_run_at = ?, next_run_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(next_run_at)
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
