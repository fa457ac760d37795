//! Database layer for the school health store.

mod schema;
mod accounts;
mod consultations;
mod medicine;
mod campaigns;

pub use consultations::{is_storable_slot_time, SLOT_TIME_FORMAT};
use schema::SCHEMA;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use thiserror::Error;

use crate::models::StatusTransitionError;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid status change: {0}")]
    InvalidTransition(#[from] StatusTransitionError),

    /// Another handle changed the record between read and write.
    #[error("Concurrent update: {0}")]
    Conflict(String),
}

impl DbError {
    /// True when an insert hit the `UNIQUE` constraint on `users.username`.
    pub fn is_username_conflict(&self) -> bool {
        matches!(self, DbError::Constraint(msg) if msg.contains("users.username"))
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Turn SQLite constraint failures into [`DbError::Constraint`].
pub(crate) fn constraint_aware(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            DbError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        other => DbError::Sqlite(other),
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction (`BEGIN IMMEDIATE`).
    ///
    /// Statements issued through `self` while the guard is alive run inside it;
    /// dropping the guard without `commit()` rolls back.
    pub fn begin_immediate(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}
