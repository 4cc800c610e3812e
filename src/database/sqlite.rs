use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use super::{ContactUpsert, RecordStore};
use crate::errors::{AppError, Result};
use crate::models::user::{AccountStatus, UserRecord};
use crate::models::verification::{VerificationRequest, VerificationStatus};

#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn new(database_path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::RecordStoreError(format!("Failed to create database directory: {}", e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;

        info!(action = "database_connected", path = %database_path);
        Ok(db)
    }

    /// A private database that lives as long as this value; used by tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::RecordStoreError(format!("Invalid in-memory database URL: {}", e)))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT,
                phone_number TEXT,
                student_id TEXT,
                account_status TEXT NOT NULL DEFAULT 'active', -- 'active', 'frozen', 'suspended'
                suspended_until TEXT,
                profile_photo TEXT,
                is_admin BOOLEAN NOT NULL DEFAULT FALSE,
                password_hash TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS verifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                student_id TEXT NOT NULL,
                id_image_url TEXT NOT NULL,
                cor_image_url TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending', -- 'pending', 'approved', 'rejected'
                created_at TEXT NOT NULL,
                reviewed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            CREATE INDEX IF NOT EXISTS idx_verifications_email ON verifications(email, created_at);
            CREATE INDEX IF NOT EXISTS idx_verifications_status ON verifications(status, created_at);
        "#;

        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::RecordStoreError(format!("Invalid {} timestamp: {}", column, e)))
}

fn parse_optional_ts(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(column, &v)).transpose()
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::RecordStoreError(format!("Invalid {}: {}", column, e)))
}

fn verification_from_row(row: &SqliteRow) -> Result<VerificationRequest> {
    Ok(VerificationRequest {
        id: parse_uuid("verification id", &row.try_get::<String, _>("id")?)?,
        user_id: parse_uuid("user id", &row.try_get::<String, _>("user_id")?)?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        student_id: row.try_get("student_id")?,
        id_image_url: row.try_get("id_image_url")?,
        cor_image_url: row.try_get("cor_image_url")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: parse_ts("created_at", &row.try_get::<String, _>("created_at")?)?,
        reviewed_at: parse_optional_ts("reviewed_at", row.try_get("reviewed_at")?)?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    Ok(UserRecord {
        id: parse_uuid("user id", &row.try_get::<String, _>("id")?)?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        phone_number: row.try_get("phone_number")?,
        student_id: row.try_get("student_id")?,
        account_status: row.try_get::<String, _>("account_status")?.parse()?,
        suspended_until: parse_optional_ts("suspended_until", row.try_get("suspended_until")?)?,
        profile_photo: row.try_get("profile_photo")?,
        is_admin: row.try_get("is_admin")?,
        password_hash: row.try_get("password_hash")?,
        created_at: parse_ts("created_at", &row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts("updated_at", &row.try_get::<String, _>("updated_at")?)?,
    })
}

const INSERT_VERIFICATION: &str = r#"
    INSERT INTO verifications (id, user_id, email, phone, student_id, id_image_url, cor_image_url, status, created_at, reviewed_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#;

fn bind_verification<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    request: &'q VerificationRequest,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(request.id.to_string())
        .bind(request.user_id.to_string())
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.student_id)
        .bind(&request.id_image_url)
        .bind(&request.cor_image_url)
        .bind(request.status.as_str())
        .bind(ts(request.created_at))
        .bind(request.reviewed_at.map(ts))
}

#[async_trait]
impl RecordStore for SqliteDatabase {
    async fn find_verifications_by_email(&self, email: &str) -> Result<Vec<VerificationRequest>> {
        let rows = sqlx::query("SELECT * FROM verifications WHERE email = ?1 ORDER BY created_at DESC")
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to fetch verification requests: {}", e)))?;
        rows.iter().map(verification_from_row).collect()
    }

    async fn get_verification(&self, id: &Uuid) -> Result<Option<VerificationRequest>> {
        let row = sqlx::query("SELECT * FROM verifications WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to fetch verification request: {}", e)))?;
        row.as_ref().map(verification_from_row).transpose()
    }

    async fn list_verifications(
        &self,
        status: Option<VerificationStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationRequest>> {
        // LIMIT -1 means no limit in SQLite
        let rows = sqlx::query(
            "SELECT * FROM verifications WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::RecordStoreError(format!("Failed to list verification requests: {}", e)))?;
        rows.iter().map(verification_from_row).collect()
    }

    async fn insert_verification(&self, request: &VerificationRequest) -> Result<()> {
        bind_verification(sqlx::query(INSERT_VERIFICATION), request)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to create verification request: {}", e)))?;
        Ok(())
    }

    async fn replace_verification(&self, replaced_id: &Uuid, request: &VerificationRequest) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM verifications WHERE id = ?1")
            .bind(replaced_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to delete rejected request: {}", e)))?;

        bind_verification(sqlx::query(INSERT_VERIFICATION), request)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to create verification request: {}", e)))?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_verification_status(
        &self,
        id: &Uuid,
        status: VerificationStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query("UPDATE verifications SET status = ?1, reviewed_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(ts(reviewed_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to update verification status: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to fetch user by id: {}", e)))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to fetch user by email: {}", e)))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let query = r#"
            INSERT INTO users (id, email, display_name, phone_number, student_id, account_status, suspended_until, profile_photo, is_admin, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#;

        sqlx::query(query)
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(&user.phone_number)
            .bind(&user.student_id)
            .bind(user.account_status.as_str())
            .bind(user.suspended_until.map(ts))
            .bind(&user.profile_photo)
            .bind(user.is_admin)
            .bind(&user.password_hash)
            .bind(ts(user.created_at))
            .bind(ts(user.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint failed") {
                    AppError::ValidationError("Email already exists".to_string())
                } else {
                    AppError::RecordStoreError(format!("Failed to create user: {}", e))
                }
            })?;
        Ok(())
    }

    async fn list_users(&self, limit: Option<i64>) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at DESC LIMIT ?1")
            .bind(limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to list users: {}", e)))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn upsert_user_contact(&self, contact: ContactUpsert<'_>, now: DateTime<Utc>) -> Result<()> {
        let query = r#"
            INSERT INTO users (id, email, phone_number, student_id, account_status, is_admin, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'active', FALSE, ?5, ?5)
            ON CONFLICT(email) DO UPDATE SET
                phone_number = excluded.phone_number,
                student_id = excluded.student_id,
                updated_at = excluded.updated_at
        "#;
        sqlx::query(query)
            .bind(contact.user_id.to_string())
            .bind(contact.email)
            .bind(contact.phone_number)
            .bind(contact.student_id)
            .bind(ts(now))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to upsert user contact fields: {}", e)))?;
        Ok(())
    }

    async fn update_account_status(
        &self,
        user_id: &Uuid,
        status: AccountStatus,
        suspended_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE users SET account_status = ?1, suspended_until = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(suspended_until.map(ts))
        .bind(ts(now))
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::RecordStoreError(format!("Failed to update account status: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn update_password_hash(&self, user_id: &Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(password_hash)
            .bind(ts(now))
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to update password: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn delete_user(&self, user_id: &Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RecordStoreError(format!("Failed to delete user: {}", e)))?;
        Ok(result.rows_affected())
    }
}
