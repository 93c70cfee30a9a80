// src/db/mod.rs
use uuid::Uuid;
use crate::models::{PasswordRecord, RecordFilter, RecordUpdate, PageRequest, SortOrder};
use thiserror::Error;

pub mod postgres;
pub mod sqlite;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(String),

    #[error("Password record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

// Convert database-specific errors to our DbError
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Configuration(_) => DbError::ConfigError(error.to_string()),
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::Other => DbError::SqlxError(error.to_string()),
                _ => DbError::ConstraintViolation(db_err.message().to_string()),
            },
            _ => DbError::SqlxError(error.to_string()),
        }
    }
}

// Database backend trait - implemented by each database type
pub trait DatabaseBackend: Send + Sync {
    // Open the pool and create the schema
    async fn init(&mut self, connection_string: &str, max_connections: u32) -> Result<(), DbError>;

    async fn insert_record(&self, record: &PasswordRecord) -> Result<(), DbError>;

    async fn get_record(&self, id: Uuid) -> Result<PasswordRecord, DbError>;

    async fn find_page(&self, filter: &RecordFilter, request: &PageRequest) -> Result<Vec<PasswordRecord>, DbError>;

    async fn count_records(&self, filter: &RecordFilter) -> Result<u64, DbError>;

    async fn update_record(&self, id: Uuid, update: &RecordUpdate) -> Result<(), DbError>;

    async fn delete_record(&self, id: Uuid) -> Result<(), DbError>;

    // Configuration values
    async fn get_config_value(&self, key: &str) -> Result<Option<String>, DbError>;

    // Insert only when the key is absent; returns whether this call wrote it.
    // An existing value always wins, so concurrent writers agree on one value.
    async fn insert_config_value_if_absent(&self, key: &str, value: &str) -> Result<bool, DbError>;

    async fn close(&self);
}

// Enum to hold specific backend implementations
#[derive(Debug, Clone)]
pub enum DatabaseType {
    Postgres(postgres::PostgresBackend),
    Sqlite(sqlite::SqliteBackend),
}

// The main database struct that uses the enum pattern instead of trait objects
#[derive(Debug, Clone)]
pub struct Database {
    pub backend: DatabaseType,
}

impl Database {
    // Pick the backend from the URL scheme. There is no fallback between backends.
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, DbError> {
        if connection_string.starts_with("sqlite:") {
            let mut backend = sqlite::SqliteBackend::new();
            backend.init(connection_string, max_connections).await?;
            Ok(Self {
                backend: DatabaseType::Sqlite(backend),
            })
        } else if connection_string.starts_with("postgres://")
            || connection_string.starts_with("postgresql://")
        {
            let mut backend = postgres::PostgresBackend::new();
            backend.init(connection_string, max_connections).await?;
            Ok(Self {
                backend: DatabaseType::Postgres(backend),
            })
        } else {
            Err(DbError::ConfigError(
                "Unsupported database URL scheme (expected sqlite:, postgres:// or postgresql://)".into(),
            ))
        }
    }

    // Delegate methods to the appropriate backend type
    pub async fn insert_record(&self, record: &PasswordRecord) -> Result<(), DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.insert_record(record).await,
            DatabaseType::Sqlite(backend) => backend.insert_record(record).await,
        }
    }

    pub async fn get_record(&self, id: Uuid) -> Result<PasswordRecord, DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.get_record(id).await,
            DatabaseType::Sqlite(backend) => backend.get_record(id).await,
        }
    }

    pub async fn find_page(&self, filter: &RecordFilter, request: &PageRequest) -> Result<Vec<PasswordRecord>, DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.find_page(filter, request).await,
            DatabaseType::Sqlite(backend) => backend.find_page(filter, request).await,
        }
    }

    pub async fn count_records(&self, filter: &RecordFilter) -> Result<u64, DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.count_records(filter).await,
            DatabaseType::Sqlite(backend) => backend.count_records(filter).await,
        }
    }

    pub async fn update_record(&self, id: Uuid, update: &RecordUpdate) -> Result<(), DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.update_record(id, update).await,
            DatabaseType::Sqlite(backend) => backend.update_record(id, update).await,
        }
    }

    pub async fn delete_record(&self, id: Uuid) -> Result<(), DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.delete_record(id).await,
            DatabaseType::Sqlite(backend) => backend.delete_record(id).await,
        }
    }

    pub async fn get_config_value(&self, key: &str) -> Result<Option<String>, DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.get_config_value(key).await,
            DatabaseType::Sqlite(backend) => backend.get_config_value(key).await,
        }
    }

    pub async fn insert_config_value_if_absent(&self, key: &str, value: &str) -> Result<bool, DbError> {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.insert_config_value_if_absent(key, value).await,
            DatabaseType::Sqlite(backend) => backend.insert_config_value_if_absent(key, value).await,
        }
    }

    pub async fn close(&self) {
        match &self.backend {
            DatabaseType::Postgres(backend) => backend.close().await,
            DatabaseType::Sqlite(backend) => backend.close().await,
        }
    }

    pub fn get_backend_type(&self) -> &str {
        match &self.backend {
            DatabaseType::Sqlite(_) => "SQLite",
            DatabaseType::Postgres(_) => "PostgreSQL",
        }
    }
}

// Function to initialize the database
pub async fn init_db(db_url: &str, max_connections: u32) -> Result<Database, DbError> {
    Database::new(db_url, max_connections).await
}

/// WHERE clause for a filter plus its bind values, in order.
///
/// `placeholder` renders the n-th (1-based) bind marker for the backend and
/// `like_op` is the case-insensitive LIKE operator it understands.
pub(crate) fn filter_clause(
    filter: &RecordFilter,
    placeholder: impl Fn(usize) -> String,
    like_op: &str,
) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(category) = &filter.password_category {
        params.push(category.clone());
        conditions.push(format!("password_category = {}", placeholder(params.len())));
    }

    if let Some(project) = &filter.project_name_contains {
        params.push(format!("%{}%", escape_like(project)));
        conditions.push(format!(
            "project_name {} {} ESCAPE '\\'",
            like_op,
            placeholder(params.len())
        ));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

pub(crate) fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Oldest => " ORDER BY date ASC, id ASC",
        SortOrder::Newest => " ORDER BY date DESC, id DESC",
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (clause, params) = filter_clause(&RecordFilter::default(), |_| "?".into(), "LIKE");
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn postgres_placeholders_are_numbered() {
        let filter = RecordFilter {
            password_category: Some("email".into()),
            project_name_contains: Some("100%_done".into()),
        };
        let (clause, params) = filter_clause(&filter, |n| format!("${}", n), "ILIKE");

        assert_eq!(
            clause,
            " WHERE password_category = $1 AND project_name ILIKE $2 ESCAPE '\\'"
        );
        assert_eq!(params, vec!["email".to_string(), "%100\\%\\_done%".to_string()]);
    }
}
