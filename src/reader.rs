use std::collections::VecDeque;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::error::TableError;
use crate::escape::IdentifierConvention;
use crate::schema::ID_COLUMN;

/// Reads one table (or view) of a SQLite database.
///
/// Column names are discovered from the engine catalog at construction; the
/// surrogate key column is excluded from the exposed header. The first call
/// to [`TableReader::read_next_row`] returns the header, subsequent calls
/// return data rows in insertion order (when the surrogate key is present)
/// with NULL values coerced to empty strings.
///
/// The iterator is forward-only and non-seekable. Since rusqlite rows borrow
/// their statement, the result set is materialized up front; the observable
/// behaviour is unchanged.
pub struct TableReader {
    conn: Option<Connection>,
    db_name: String,
    table_name: String,
    header: Vec<String>,
    rows: VecDeque<Vec<String>>,
    returned_header: bool,
    line_number: usize,
}

impl TableReader {
    /// Discovers the table's columns and runs the ordered SELECT.
    ///
    /// Fails with [`TableError::Io`] if the table does not exist or has no
    /// columns.
    pub(crate) fn new(
        conn: Connection,
        db_name: String,
        table_name: String,
        convention: IdentifierConvention,
    ) -> Result<Self, TableError> {
        let escaped_table = convention.identifier(&table_name);

        // PRAGMA table_info instead of a catalog LIKE query: % and _ in the
        // table name must not act as wildcards.
        let columns = {
            let pragma = format!("PRAGMA table_info({});", escaped_table);
            let mut stmt = conn
                .prepare(&pragma)
                .map_err(|e| TableError::io(&table_name, &db_name, e))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>("name"))
                .map_err(|e| TableError::io(&table_name, &db_name, e))?
                .collect::<Result<Vec<String>, _>>()
                .map_err(|e| TableError::io(&table_name, &db_name, e))?;
            names
        };

        if columns.is_empty() {
            return Err(TableError::Io {
                table: table_name,
                db: db_name,
                reason: "table has no columns or doesn't exist".to_string(),
            });
        }

        let has_id = columns.iter().any(|c| c == ID_COLUMN);
        let header: Vec<String> = columns.into_iter().filter(|c| c != ID_COLUMN).collect();

        // Discovered names are raw, so always quote them here; the injected
        // convention only governs the table-name lookup above.
        let column_list = header
            .iter()
            .map(|c| IdentifierConvention::Quoted.identifier(c))
            .collect::<Vec<String>>()
            .join(", ");
        let order_by = if has_id {
            format!(" ORDER BY {}", IdentifierConvention::Quoted.identifier(ID_COLUMN))
        } else {
            // No surrogate key (e.g. a reconstructive view): engine order.
            String::new()
        };
        let select = format!("SELECT {} FROM {}{};", column_list, escaped_table, order_by);

        let rows = {
            let mut stmt = conn
                .prepare(&select)
                .map_err(|e| TableError::io(&table_name, &db_name, e))?;
            let column_count = header.len();
            let mapped = stmt
                .query_map([], |row| {
                    let mut values = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        values.push(value_to_string(row.get_ref(i)?));
                    }
                    Ok(values)
                })
                .map_err(|e| TableError::io(&table_name, &db_name, e))?;
            mapped
                .collect::<Result<VecDeque<Vec<String>>, _>>()
                .map_err(|e| TableError::io(&table_name, &db_name, e))?
        };

        debug!(table = %table_name, rows = rows.len(), "opened reader");
        Ok(TableReader {
            conn: Some(conn),
            db_name,
            table_name,
            header,
            rows,
            returned_header: false,
            line_number: 0,
        })
    }

    /// Returns the header on the first call, then one data row per call,
    /// then `None` once exhausted. The header does not count towards
    /// [`TableReader::line_number`].
    pub fn read_next_row(&mut self) -> Result<Option<Vec<String>>, TableError> {
        if self.conn.is_none() {
            return Err(TableError::Io {
                table: self.table_name.clone(),
                db: self.db_name.clone(),
                reason: "reader closed".to_string(),
            });
        }

        if !self.returned_header {
            self.returned_header = true;
            return Ok(Some(self.header.clone()));
        }

        match self.rows.pop_front() {
            Some(row) => {
                self.line_number += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Reads the remaining content at once: header (if not yet returned)
    /// followed by all data rows.
    pub fn read_full(&mut self) -> Result<Vec<Vec<String>>, TableError> {
        let mut content = Vec::new();
        while let Some(row) = self.read_next_row()? {
            content.push(row);
        }
        Ok(content)
    }

    /// Number of data rows returned so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Releases the owned connection. Idempotent.
    pub fn close(&mut self) -> Result<(), TableError> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| TableError::io(&self.table_name, &self.db_name, e))?;
        }
        Ok(())
    }
}

/// Coerces any stored value to a string; NULL becomes the empty string.
fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}
