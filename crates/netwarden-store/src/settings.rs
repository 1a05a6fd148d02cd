use crate::{map_sqlx, Store};
use chrono::{DateTime, Utc};
use netwarden_core::Result;

impl Store {
    /// Inserts `key = value` only if absent; used by migration to seed
    /// defaults without clobbering an operator's existing tuning.
    pub async fn settings_set_if_absent(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn setting_get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx)
    }

    pub async fn setting_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn settings_list(&self) -> Result<Vec<(String, String, DateTime<Utc>)>> {
        sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT key, value, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)
    }

    /// The live scan-parallelism cap, falling back to the built-in default if
    /// unset or corrupt.
    pub async fn scan_parallelism(&self) -> Result<i64> {
        Ok(self
            .setting_get(netwarden_core::setting_keys::SCAN_PARALLELISM)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(netwarden_core::DEFAULT_SCAN_PARALLELISM))
    }

    /// The live artifact/row retention window in days.
    pub async fn data_retention_days(&self) -> Result<i64> {
        Ok(self
            .setting_get(netwarden_core::setting_keys::DATA_RETENTION_DAYS)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(netwarden_core::DEFAULT_DATA_RETENTION_DAYS))
    }
}
