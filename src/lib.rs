// src/lib.rs
//! Password record store: validated inserts, paginated reads and optional
//! at-rest encryption of the details field, over PostgreSQL or SQLite.

pub mod core;
pub mod crypto;
pub mod db;
pub mod models;
pub mod utils;

pub use crate::core::{Config, ErrorKind, PasswordStore, StoreError};
pub use crate::models::{NewPasswordRecord, Page, PageRequest, PasswordRecord, RecordFilter, RecordUpdate, SortOrder};
