use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

const USER_COLUMNS: &str = "id, email, full_name, is_admin, is_active, created_at";

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_user(&row)))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_user(&row)))
    }

    /// Emails of all active admin users, for operational notification mail.
    pub async fn admin_emails(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT email FROM users WHERE is_admin = TRUE AND is_active = TRUE",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(|row| row.get("email")).collect())
    }

    /// All active admin users, for fanning in-app notifications out to staff.
    pub async fn admin_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE is_admin = TRUE AND is_active = TRUE",
            USER_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(map_user).collect())
    }

    pub async fn is_admin(&self, user_id: Uuid) -> Result<bool> {
        let admin: Option<bool> = sqlx::query_scalar(
            "SELECT is_admin FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(admin.unwrap_or(false))
    }
}

pub(crate) fn map_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        is_admin: row.get("is_admin"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}
