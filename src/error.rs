use thiserror::Error;

/// Errors that can occur while writing or reading tables.
///
/// Every variant that relates to a specific table carries the table name and
/// the database path, so failures from a multi-table pipeline run can be
/// triaged without a debugger.
#[derive(Debug, Error)]
pub enum TableError {
    /// The declared schema is invalid, or its DDL collides with an object
    /// that already exists in the database.
    #[error("invalid schema for table '{table}' in {db}: {reason}")]
    Schema {
        table: String,
        db: String,
        reason: String,
    },

    /// A writer method was called in the wrong order, in the wrong mode, or
    /// with a row of the wrong width.
    #[error("protocol violation for table '{table}' in {db}: {reason}")]
    Protocol {
        table: String,
        db: String,
        reason: String,
    },

    /// A row carries a value that cannot be stored (e.g. a null relation
    /// endpoint or a null header entry).
    #[error("invalid row for table '{table}' in {db}: {reason}")]
    InvalidRow {
        table: String,
        db: String,
        reason: String,
    },

    /// A record with a different shape than the first one was passed to the
    /// same writer. The record schema is frozen after the first write.
    #[error("incompatible record schema for table '{table}' in {db}: {reason}")]
    TypeMismatch {
        table: String,
        db: String,
        reason: String,
    },

    /// An error from the SQLite engine, annotated with the table it occurred
    /// on. Also raised when writing to a closed writer or reading a table
    /// that does not exist.
    #[error("I/O error for table '{table}' in {db}: {reason}")]
    Io {
        table: String,
        db: String,
        reason: String,
    },

    /// The database file itself could not be opened or probed.
    #[error("could not open database {db}: {reason}")]
    Open { db: String, reason: String },
}

impl TableError {
    /// Wraps an engine error for the given table.
    pub(crate) fn io(table: &str, db: &str, err: rusqlite::Error) -> Self {
        TableError::Io {
            table: table.to_string(),
            db: db.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn schema(table: &str, db: &str, reason: impl Into<String>) -> Self {
        TableError::Schema {
            table: table.to_string(),
            db: db.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(table: &str, db: &str, reason: impl Into<String>) -> Self {
        TableError::Protocol {
            table: table.to_string(),
            db: db.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_row(table: &str, db: &str, reason: impl Into<String>) -> Self {
        TableError::InvalidRow {
            table: table.to_string(),
            db: db.to_string(),
            reason: reason.into(),
        }
    }
}
