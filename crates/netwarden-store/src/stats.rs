use crate::{map_sqlx, Store};
use netwarden_core::Result;
use serde::Serialize;

/// Snapshot counters for the `/api/stats` endpoint and the `get_network_stats`
/// MCP tool. "Services" uses the distinct `(ip, port, protocol)` definition
/// (see the services-counting Open Question resolved in the design notes),
/// not a raw count of `ports` rows.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_scans: i64,
    pub scans_last_24h: i64,
    pub failed_scans: i64,
    pub unique_host_count: i64,
    pub unique_vm_count: i64,
    pub unique_service_count: i64,
    pub enabled_schedule_count: i64,
}

impl Store {
    pub async fn stats(&self) -> Result<Stats> {
        let total_scans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx)?;

        let scans_last_24h: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM scans WHERE created_at >= datetime('now', '-1 day')",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx)?;

        let failed_scans: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scans WHERE status = 'failed'")
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx)?;

        let unique_host_count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT ip) FROM hosts")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx)?;

        let unique_vm_count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT ip) FROM hosts WHERE is_vm = 1")
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx)?;

        let unique_service_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ( \
                 SELECT DISTINCT h.ip, p.port, p.protocol FROM ports p \
                 JOIN hosts h ON h.id = p.host_id \
             )",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx)?;

        let enabled_schedule_count = self.count_enabled_schedules().await?;

        Ok(Stats {
            total_scans,
            scans_last_24h,
            failed_scans,
            unique_host_count,
            unique_vm_count,
            unique_service_count,
            enabled_schedule_count,
        })
    }
}
