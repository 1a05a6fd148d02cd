use crate::row::{bool_to_int, int_to_bool};
use crate::{map_sqlx, Store};
use chrono::{DateTime, Utc};
use netwarden_core::{Error, Result, Role, User};
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct RawUserRow {
    id: i64,
    username: String,
    email: Option<String>,
    full_name: Option<String>,
    hashed_password: String,
    role: String,
    must_change_password: i64,
    is_active: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawUserRow {
    fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            hashed_password: self.hashed_password,
            role: Role::from_str(&self.role)?,
            must_change_password: int_to_bool(self.must_change_password),
            is_active: int_to_bool(self.is_active),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_USER: &str = "SELECT id, username, email, full_name, hashed_password, role, \
     must_change_password, is_active, created_at, updated_at FROM users";

impl Store {
    /// Inserts a new account. `username` uniqueness is enforced by the
    /// schema; a duplicate surfaces as `Error::Validation` (invariant 8).
    pub async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        full_name: Option<&str>,
        hashed_password: &str,
        role: Role,
        must_change_password: bool,
    ) -> Result<User> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, email, full_name, hashed_password, role, \
             must_change_password, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?) RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(full_name)
        .bind(hashed_password)
        .bind(role.to_string())
        .bind(bool_to_int(must_change_password))
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Validation(format!("username {username:?} already exists"))
            }
            _ => map_sqlx(e),
        })?;

        self.get_user(id)
            .await?
            .ok_or_else(|| Error::Store("user vanished immediately after insert".to_string()))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, RawUserRow>(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx)?;
        row.map(RawUserRow::into_user).transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, RawUserRow>(&format!("{SELECT_USER} WHERE username = ?"))
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx)?;
        row.map(RawUserRow::into_user).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, RawUserRow>(&format!("{SELECT_USER} ORDER BY username"))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(RawUserRow::into_user).collect()
    }

    pub async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx)
    }

    pub async fn update_password(&self, id: i64, hashed_password: &str, must_change: bool) -> Result<()> {
        sqlx::query(
            "UPDATE users SET hashed_password = ?, must_change_password = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(hashed_password)
        .bind(bool_to_int(must_change))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn set_user_active(&self, id: i64, is_active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(bool_to_int(is_active))
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    /// Deletes a user. `Schedule.created_by` referencing this id is nulled
    /// by the schema's `ON DELETE SET NULL` (invariant 7).
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
