// src/db/sqlite.rs
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow}, Row};
use uuid::Uuid;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{PasswordRecord, RecordFilter, RecordUpdate, PageRequest};
use super::{filter_clause, order_clause, DatabaseBackend, DbError};

#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: Option<SqlitePool>,
}

impl SqliteBackend {
    pub fn new() -> Self {
        Self {
            pool: None,
        }
    }

    // Helper to get the pool or return an error
    fn get_pool(&self) -> Result<&SqlitePool, DbError> {
        self.pool.as_ref().ok_or(DbError::InitError("Database not initialized".into()))
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn db_path(connection_string: &str) -> String {
    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))
        .unwrap_or(connection_string);
    path.split('?').next().unwrap_or(path).to_string()
}

fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

// Fixed-width timestamps so TEXT ordering matches time ordering.
// Only holds for years 0000-9999; the store rejects dates outside that range.
fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_record(row: &SqliteRow) -> Result<PasswordRecord, DbError> {
    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DbError::SqlxError(format!("Invalid UUID: {}", e)))?;

    let date_str: String = row.try_get("date")?;
    let date = DateTime::parse_from_rfc3339(&date_str)
        .map_err(|e| DbError::SqlxError(format!("Invalid datetime: {}", e)))?
        .with_timezone(&Utc);

    Ok(PasswordRecord {
        id,
        password_category: row.try_get("password_category")?,
        project_name: row.try_get("project_name")?,
        password_details: row.try_get("password_details")?,
        date,
    })
}

impl DatabaseBackend for SqliteBackend {
    async fn init(&mut self, connection_string: &str, max_connections: u32) -> Result<(), DbError> {
        if !connection_string.starts_with("sqlite:") {
            return Err(DbError::ConfigError("Invalid SQLite connection string".into()));
        }

        let in_memory = is_in_memory(connection_string);

        // Every in-memory connection is its own database, so keep exactly one
        let max_connections = if in_memory {
            1
        } else {
            let path = db_path(connection_string);
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e|
                        DbError::InitError(format!("Failed to create database directory: {}", e))
                    )?;
                }
            }
            log::info!("Initializing SQLite database at: {}", path);
            max_connections
        };

        // Concurrent writers on one file wait for the lock instead of failing
        let options = SqliteConnectOptions::from_str(connection_string)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS password_details (
                id TEXT PRIMARY KEY,
                password_category TEXT NOT NULL CHECK (password_category <> ''),
                project_name TEXT NOT NULL CHECK (project_name <> ''),
                password_details TEXT NOT NULL CHECK (password_details <> ''),
                date TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_password_details_category ON password_details(password_category);")
            .execute(&pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_password_details_date ON password_details(date, id);")
            .execute(&pool)
            .await?;

        self.pool = Some(pool);
        Ok(())
    }

    async fn insert_record(&self, record: &PasswordRecord) -> Result<(), DbError> {
        let pool = self.get_pool()?;

        sqlx::query(
            r#"
            INSERT INTO password_details (id, password_category, project_name, password_details, date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.password_category)
        .bind(&record.project_name)
        .bind(&record.password_details)
        .bind(format_date(&record.date))
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<PasswordRecord, DbError> {
        let pool = self.get_pool()?;

        let row = sqlx::query(
            r#"
            SELECT id, password_category, project_name, password_details, date
            FROM password_details
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

        row_to_record(&row)
    }

    async fn find_page(&self, filter: &RecordFilter, request: &PageRequest) -> Result<Vec<PasswordRecord>, DbError> {
        let pool = self.get_pool()?;

        // SQLite's LIKE is already case-insensitive for ASCII
        let (where_clause, params) = filter_clause(filter, |_| "?".to_string(), "LIKE");
        let query = format!(
            "SELECT id, password_category, project_name, password_details, date FROM password_details{}{} LIMIT ? OFFSET ?",
            where_clause,
            order_clause(request.sort),
        );

        let mut sqlx_query = sqlx::query(&query);
        for param in &params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query
            .bind(i64::from(request.limit))
            .bind(request.offset() as i64)
            .fetch_all(pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn count_records(&self, filter: &RecordFilter) -> Result<u64, DbError> {
        let pool = self.get_pool()?;

        let (where_clause, params) = filter_clause(filter, |_| "?".to_string(), "LIKE");
        let query = format!("SELECT COUNT(*) AS count FROM password_details{}", where_clause);

        let mut sqlx_query = sqlx::query(&query);
        for param in &params {
            sqlx_query = sqlx_query.bind(param);
        }

        let row = sqlx_query.fetch_one(pool).await?;
        Ok(row.try_get::<i64, _>("count")? as u64)
    }

    async fn update_record(&self, id: Uuid, update: &RecordUpdate) -> Result<(), DbError> {
        let pool = self.get_pool()?;

        let mut update_parts = Vec::new();
        let mut values = Vec::new();

        if let Some(v) = &update.password_category {
            update_parts.push("password_category = ?");
            values.push(v);
        }
        if let Some(v) = &update.project_name {
            update_parts.push("project_name = ?");
            values.push(v);
        }
        if let Some(v) = &update.password_details {
            update_parts.push("password_details = ?");
            values.push(v);
        }

        if update_parts.is_empty() {
            return Ok(());
        }

        let query = format!(
            "UPDATE password_details SET {} WHERE id = ?",
            update_parts.join(", ")
        );

        let mut sqlx_query = sqlx::query(&query);
        for v in values {
            sqlx_query = sqlx_query.bind(v);
        }

        let result = sqlx_query.bind(id.to_string()).execute(pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<(), DbError> {
        let pool = self.get_pool()?;

        let result = sqlx::query("DELETE FROM password_details WHERE id = ?")
            .bind(id.to_string())
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn get_config_value(&self, key: &str) -> Result<Option<String>, DbError> {
        let pool = self.get_pool()?;

        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

        row.map(|r| r.try_get::<String, _>("value")).transpose().map_err(DbError::from)
    }

    async fn insert_config_value_if_absent(&self, key: &str, value: &str) -> Result<bool, DbError> {
        let pool = self.get_pool()?;

        let result = sqlx::query(
            r#"
            INSERT INTO config (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(format_date(&Utc::now()))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn close(&self) {
        if let Some(pool) = &self.pool {
            log::info!("Closing SQLite pool");
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_strips_scheme_and_query() {
        assert_eq!(db_path("sqlite:./data/records.db"), "./data/records.db");
        assert_eq!(db_path("sqlite://records.db?mode=rwc"), "records.db");
    }

    #[test]
    fn in_memory_urls_are_detected() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://shared?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite:./records.db"));
    }

    #[test]
    fn formatted_dates_sort_lexically() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z").unwrap().with_timezone(&Utc);
        assert!(format_date(&earlier) < format_date(&later));
        assert_eq!(format_date(&earlier), "2024-01-01T00:00:00.000000Z");
    }
}
