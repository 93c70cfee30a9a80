// src/db/postgres.rs
use sqlx::{postgres::PgPoolOptions, PgPool, Row, types::Uuid};
use sqlx::postgres::PgRow;

use crate::models::{PasswordRecord, RecordFilter, RecordUpdate, PageRequest};
use super::{filter_clause, order_clause, DatabaseBackend, DbError};

#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: Option<PgPool>,
}

impl PostgresBackend {
    pub fn new() -> Self {
        Self {
            pool: None,
        }
    }

    // Helper to get the pool or return an error
    fn get_pool(&self) -> Result<&PgPool, DbError> {
        self.pool.as_ref().ok_or(DbError::InitError("Database not initialized".into()))
    }

    fn row_to_record(row: &PgRow) -> Result<PasswordRecord, DbError> {
        Ok(PasswordRecord {
            id: row.try_get("id")?,
            password_category: row.try_get("password_category")?,
            project_name: row.try_get("project_name")?,
            password_details: row.try_get("password_details")?,
            date: row.try_get("date")?,
        })
    }
}

fn numbered(n: usize) -> String {
    format!("${}", n)
}

// Page SELECT with filter binds first, then LIMIT and OFFSET
fn page_query(filter: &RecordFilter, request: &PageRequest) -> (String, Vec<String>) {
    let (where_clause, params) = filter_clause(filter, numbered, "ILIKE");
    let query = format!(
        "SELECT id, password_category, project_name, password_details, date FROM password_details{}{} LIMIT {} OFFSET {}",
        where_clause,
        order_clause(request.sort),
        numbered(params.len() + 1),
        numbered(params.len() + 2),
    );
    (query, params)
}

// `$1` is the id; changed fields bind from `$2` on. None when nothing changes.
fn update_query(update: &RecordUpdate) -> Option<(String, Vec<&String>)> {
    let mut update_parts = Vec::new();
    let mut values = Vec::new();

    let fields = [
        ("password_category", &update.password_category),
        ("project_name", &update.project_name),
        ("password_details", &update.password_details),
    ];
    for (column, value) in fields {
        if let Some(v) = value {
            values.push(v);
            update_parts.push(format!("{} = {}", column, numbered(values.len() + 1)));
        }
    }

    if update_parts.is_empty() {
        return None;
    }

    let query = format!(
        "UPDATE password_details SET {} WHERE id = $1",
        update_parts.join(", ")
    );
    Some((query, values))
}

impl Default for PostgresBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseBackend for PostgresBackend {
    async fn init(&mut self, connection_string: &str, max_connections: u32) -> Result<(), DbError> {
        log::info!("Initializing PostgreSQL database...");

        // Create a connection pool
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        log::info!("Connected to PostgreSQL");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            );
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS password_details (
                id UUID PRIMARY KEY,
                password_category TEXT NOT NULL CHECK (password_category <> ''),
                project_name TEXT NOT NULL CHECK (project_name <> ''),
                password_details TEXT NOT NULL CHECK (password_details <> ''),
                date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
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
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(&record.password_category)
        .bind(&record.project_name)
        .bind(&record.password_details)
        .bind(record.date)
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
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Self::row_to_record(&row)
    }

    async fn find_page(&self, filter: &RecordFilter, request: &PageRequest) -> Result<Vec<PasswordRecord>, DbError> {
        let pool = self.get_pool()?;

        let (query, params) = page_query(filter, request);

        let mut sqlx_query = sqlx::query(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query
            .bind(i64::from(request.limit))
            .bind(request.offset() as i64)
            .fetch_all(pool)
            .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count_records(&self, filter: &RecordFilter) -> Result<u64, DbError> {
        let pool = self.get_pool()?;

        let (where_clause, params) = filter_clause(filter, numbered, "ILIKE");
        let query = format!("SELECT COUNT(*) AS count FROM password_details{}", where_clause);

        let mut sqlx_query = sqlx::query(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let row = sqlx_query.fetch_one(pool).await?;
        Ok(row.try_get::<i64, _>("count")? as u64)
    }

    async fn update_record(&self, id: Uuid, update: &RecordUpdate) -> Result<(), DbError> {
        let pool = self.get_pool()?;

        let Some((query, values)) = update_query(update) else {
            return Ok(());
        };

        let mut sqlx_query = sqlx::query(&query).bind(id);
        for v in values {
            sqlx_query = sqlx_query.bind(v);
        }

        let result = sqlx_query.execute(pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<(), DbError> {
        let pool = self.get_pool()?;

        let result = sqlx::query("DELETE FROM password_details WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn get_config_value(&self, key: &str) -> Result<Option<String>, DbError> {
        let pool = self.get_pool()?;

        let row = sqlx::query("SELECT value FROM config WHERE key = $1")
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
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn close(&self) {
        if let Some(pool) = &self.pool {
            log::info!("Closing PostgreSQL pool");
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_numbers_limit_and_offset_after_filter_binds() {
        let filter = RecordFilter {
            password_category: Some("email".into()),
            project_name_contains: Some("bill".into()),
        };
        let (query, params) = page_query(&filter, &PageRequest::new(3, 20).newest_first());

        assert_eq!(
            query,
            "SELECT id, password_category, project_name, password_details, date FROM password_details \
             WHERE password_category = $1 AND project_name ILIKE $2 ESCAPE '\\' \
             ORDER BY date DESC, id DESC LIMIT $3 OFFSET $4"
        );
        assert_eq!(params, vec!["email".to_string(), "%bill%".to_string()]);
    }

    #[test]
    fn unfiltered_page_query_starts_at_one() {
        let (query, params) = page_query(&RecordFilter::default(), &PageRequest::new(1, 10));

        assert!(query.ends_with(" ORDER BY date ASC, id ASC LIMIT $1 OFFSET $2"));
        assert!(params.is_empty());
    }

    #[test]
    fn update_query_binds_fields_after_id() {
        let update = RecordUpdate {
            project_name: Some("core".into()),
            password_details: Some("new".into()),
            ..Default::default()
        };
        let (query, values) = update_query(&update).unwrap();

        assert_eq!(
            query,
            "UPDATE password_details SET project_name = $2, password_details = $3 WHERE id = $1"
        );
        assert_eq!(values, vec!["core", "new"]);
    }

    #[test]
    fn empty_update_builds_no_query() {
        assert!(update_query(&RecordUpdate::default()).is_none());
    }
}
