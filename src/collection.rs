use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::error::TableError;
use crate::escape::IdentifierConvention;
use crate::reader::TableReader;
use crate::writer::TableWriter;

/// One logical collection of tables, backed by a single SQLite file.
///
/// The collection itself holds one connection for metadata queries; every
/// writer and reader it hands out owns a fresh, independent connection to
/// the same file. Concurrent writers are serialized by SQLite's file
/// locking; the busy timeout set on each connection makes them retry instead
/// of failing immediately with `SQLITE_BUSY`.
pub struct TableCollection {
    path: PathBuf,
    db_name: String,
    convention: IdentifierConvention,
    conn: Option<Connection>,
}

impl TableCollection {
    /// Opens (or creates) the database file, using the default quote-based
    /// identifier convention.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TableError> {
        Self::open_with(path, IdentifierConvention::default())
    }

    /// Opens (or creates) the database file with an explicit identifier
    /// convention. [`IdentifierConvention::Legacy`] is only meant for
    /// addressing databases written by the old underscore-mangling scheme.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with(
        path: impl AsRef<Path>,
        convention: IdentifierConvention,
    ) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();
        let db_name = path.display().to_string();
        let conn = open_connection(&path, &db_name)?;

        // Probe the schema so that a corrupted or non-SQLite file fails here
        // rather than on first table access.
        conn.query_row("SELECT count(*) FROM sqlite_master;", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| TableError::Open {
            db: db_name.clone(),
            reason: e.to_string(),
        })?;

        debug!("opened table collection");
        Ok(TableCollection {
            path,
            db_name,
            convention,
            conn: Some(conn),
        })
    }

    /// Creates a writer for the given table, with its own connection.
    ///
    /// The table is not touched until the writer declares its header or
    /// receives its first record.
    pub fn get_writer(&self, table_name: &str) -> Result<TableWriter, TableError> {
        let conn = open_connection(&self.path, &self.db_name)?;
        Ok(TableWriter::new(
            conn,
            self.db_name.clone(),
            table_name.to_string(),
            self.convention,
        ))
    }

    /// Creates a reader for the given table or view, with its own
    /// connection. Fails with [`TableError::Io`] if the table does not
    /// exist.
    pub fn get_reader(&self, table_name: &str) -> Result<TableReader, TableError> {
        let conn = open_connection(&self.path, &self.db_name)?;
        TableReader::new(
            conn,
            self.db_name.clone(),
            table_name.to_string(),
            self.convention,
        )
    }

    /// Names of all user tables and views in the database, excluding
    /// SQLite's internal catalog objects.
    pub fn table_names(&self) -> Result<HashSet<String>, TableError> {
        let conn = self.connection()?;
        let catalog = |e: rusqlite::Error| TableError::Open {
            db: self.db_name.clone(),
            reason: e.to_string(),
        };
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\';",
            )
            .map_err(catalog)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(catalog)?
            .collect::<Result<HashSet<String>, _>>()
            .map_err(catalog)?;
        Ok(names)
    }

    /// The set of files backing this collection: always exactly the one
    /// database file.
    pub fn files(&self) -> HashSet<PathBuf> {
        let mut files = HashSet::with_capacity(1);
        files.insert(self.path.clone());
        files
    }

    /// Closes the metadata connection. Writers and readers handed out
    /// earlier keep their own connections and stay usable.
    pub fn close(&mut self) -> Result<(), TableError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| TableError::Open {
                db: self.db_name.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn connection(&self) -> Result<&Connection, TableError> {
        self.conn.as_ref().ok_or_else(|| TableError::Open {
            db: self.db_name.clone(),
            reason: "collection closed".to_string(),
        })
    }
}

/// Opens one connection with the profile every writer and reader uses:
/// foreign keys enforced, fsync-per-write disabled for throughput, and a
/// busy timeout so concurrent writers wait for the file lock instead of
/// failing.
fn open_connection(path: &Path, db_name: &str) -> Result<Connection, TableError> {
    let conn = Connection::open(path).map_err(|e| TableError::Open {
        db: db_name.to_string(),
        reason: e.to_string(),
    })?;
    conn.execute_batch(
        "PRAGMA foreign_keys=ON; PRAGMA synchronous=OFF; PRAGMA busy_timeout=10000;",
    )
    .map_err(|e| TableError::Open {
        db: db_name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(conn)
}
