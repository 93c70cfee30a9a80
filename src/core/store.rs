// src/core/store.rs
use std::sync::Arc;
use chrono::{Datelike, SubsecRound, Utc};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::{Config, ConfigError};
use crate::crypto::{self, CryptoError, DetailsCipher};
use crate::db::{self, Database, DbError};
use crate::models::{NewPasswordRecord, Page, PageRequest, PasswordRecord, RecordFilter, RecordUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Password record not found")]
    NotFound,

    #[error(transparent)]
    Database(DbError),

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
}

/// Coarse classification of a [`StoreError`] for callers deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    NotFound,
    /// Connection or I/O failure; the same call may succeed later
    TransientIo,
    /// Stored data violated a constraint or could not be decoded
    Integrity,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Config(_) => ErrorKind::Configuration,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::Database(DbError::ConstraintViolation(_)) => ErrorKind::Integrity,
            StoreError::Database(_) => ErrorKind::TransientIo,
            StoreError::Crypto(CryptoError::Db(_)) => ErrorKind::TransientIo,
            StoreError::Crypto(_) => ErrorKind::Integrity,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => StoreError::NotFound,
            DbError::ConfigError(msg) => StoreError::Config(msg),
            other => StoreError::Database(other),
        }
    }
}

impl From<CryptoError> for StoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Db(db_err) => StoreError::from(db_err),
            CryptoError::Argon2Error(msg) => StoreError::Config(format!("Invalid key derivation settings: {}", msg)),
            other => StoreError::Crypto(other),
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        StoreError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(e: validator::ValidationErrors) -> Self {
        StoreError::Validation(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Typed handle for creating and paging through password records.
///
/// Owns no global state: the database is passed in (or opened by
/// [`PasswordStore::connect`]) and released with [`PasswordStore::close`].
#[derive(Debug, Clone)]
pub struct PasswordStore {
    db: Arc<Database>,
    cipher: Option<DetailsCipher>,
    default_page_size: u32,
    max_page_size: u32,
}

impl PasswordStore {
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        config.validate()?;

        log::info!("Connecting to {}", config.redacted_database_url());
        let db = db::init_db(&config.database_url, config.max_connections).await?;
        log::info!("Connected using the {} backend", db.get_backend_type());

        Self::with_database(Arc::new(db), config).await
    }

    /// Wrap an already-open database.
    ///
    /// Fails with a configuration error when the database already holds
    /// encrypted details and no passphrase is configured.
    pub async fn with_database(db: Arc<Database>, config: &Config) -> StoreResult<Self> {
        let cipher = match &config.details_passphrase {
            Some(passphrase) => Some(DetailsCipher::from_passphrase(passphrase, &db, &config.kdf).await?),
            None => {
                if crypto::has_details_salt(&db).await? {
                    return Err(StoreError::Config(
                        "database holds encrypted details; DETAILS_PASSPHRASE is required".into(),
                    ));
                }
                log::warn!("DETAILS_PASSPHRASE is not set; password details are stored unencrypted");
                None
            }
        };

        Ok(Self {
            db,
            cipher,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    pub fn encrypts_details(&self) -> bool {
        self.cipher.is_some()
    }

    pub async fn create(&self, new: NewPasswordRecord) -> StoreResult<PasswordRecord> {
        new.validate()?;

        // Postgres keeps microseconds; truncate so the returned record matches what is stored
        let date = new.date.unwrap_or_else(Utc::now).trunc_subsecs(6);
        if !(0..=9999).contains(&date.year()) {
            return Err(StoreError::Validation(format!(
                "date year {} is outside 0000-9999",
                date.year()
            )));
        }

        let record = PasswordRecord {
            id: Uuid::new_v4(),
            password_category: new.password_category,
            project_name: new.project_name,
            password_details: new.password_details,
            date,
        };

        let stored = PasswordRecord {
            password_details: self.seal(&record.password_details)?,
            ..record.clone()
        };
        self.db.insert_record(&stored).await?;

        log::debug!("Created password record {}", record.id);
        Ok(record)
    }

    pub async fn paginate(&self, filter: &RecordFilter, request: PageRequest) -> StoreResult<Page<PasswordRecord>> {
        if request.page == 0 {
            return Err(StoreError::Validation("page must be at least 1".into()));
        }
        if request.limit == 0 || request.limit > self.max_page_size {
            return Err(StoreError::Validation(format!(
                "limit must be between 1 and {}",
                self.max_page_size
            )));
        }

        let total_docs = self.db.count_records(filter).await?;
        let docs = if request.offset() < total_docs {
            self.db
                .find_page(filter, &request)
                .await?
                .into_iter()
                .map(|r| self.open(r))
                .collect::<StoreResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        log::debug!(
            "Fetched page {} ({} of {} records)",
            request.page,
            docs.len(),
            total_docs
        );
        Ok(Page::new(docs, total_docs, &request))
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<PasswordRecord> {
        let record = self.db.get_record(id).await?;
        self.open(record)
    }

    /// Change any of the string fields. `date` is never touched.
    pub async fn update(&self, id: Uuid, mut update: RecordUpdate) -> StoreResult<PasswordRecord> {
        update.validate()?;

        if update.is_empty() {
            return self.get(id).await;
        }

        if let Some(details) = update.password_details.take() {
            update.password_details = Some(self.seal(&details)?);
        }

        self.db.update_record(id, &update).await?;
        log::debug!("Updated password record {}", id);
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.db.delete_record(id).await?;
        log::debug!("Deleted password record {}", id);
        Ok(())
    }

    pub async fn count(&self, filter: &RecordFilter) -> StoreResult<u64> {
        Ok(self.db.count_records(filter).await?)
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    fn seal(&self, details: &str) -> StoreResult<String> {
        match &self.cipher {
            Some(cipher) => Ok(cipher.encrypt(details)?),
            None => Ok(details.to_string()),
        }
    }

    fn open(&self, mut record: PasswordRecord) -> StoreResult<PasswordRecord> {
        if let Some(cipher) = &self.cipher {
            record.password_details = cipher.decrypt(&record.password_details)?;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_classified() {
        assert_eq!(StoreError::from(DbError::NotFound).kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::from(DbError::ConfigError("bad url".into())).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            StoreError::from(DbError::SqlxError("connection refused".into())).kind(),
            ErrorKind::TransientIo
        );
        assert_eq!(
            StoreError::from(DbError::ConstraintViolation("NOT NULL".into())).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            StoreError::from(CryptoError::DecryptionError("tag".into())).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            StoreError::from(CryptoError::Db(DbError::SqlxError("io".into()))).kind(),
            ErrorKind::TransientIo
        );
    }

    #[test]
    fn validation_errors_convert() {
        let err = NewPasswordRecord::default().validate().unwrap_err();
        assert_eq!(StoreError::from(err).kind(), ErrorKind::Validation);
    }
}
