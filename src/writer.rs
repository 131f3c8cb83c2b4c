use rusqlite::{params_from_iter, Connection};
use tracing::{debug, instrument};

use crate::error::TableError;
use crate::escape::IdentifierConvention;
use crate::record::{Record, RecordKind, RecordSchema};
use crate::relation::RelationSchema;
use crate::schema::RowSchema;

/// Which declaration path a writer has committed to.
///
/// A writer starts unopened. The first call to [`TableWriter::write_header`]
/// or [`TableWriter::write_record`] decides the mode and freezes the schema;
/// the two modes cannot be mixed on the same writer.
enum WriterState {
    Unopened,
    /// Header-mode: positional rows against a declared column list.
    Rows {
        insert_sql: String,
        column_count: usize,
    },
    /// Record-mode with plain records.
    Records {
        insert_sql: String,
        schema: RecordSchema,
    },
    /// Record-mode with relation records (normalized three-table storage).
    Relation {
        insert_element_sql: String,
        insert_link_sql: String,
        schema: RecordSchema,
    },
}

/// Writes one table of a SQLite database.
///
/// The writer exclusively owns its connection and its prepared statements;
/// every write is persisted immediately (there is no buffering, so
/// [`TableWriter::flush`] is a no-op). Declaring a header drops and recreates
/// any table of the same name, which is how re-running a pipeline stage
/// overwrites stale results.
pub struct TableWriter {
    conn: Option<Connection>,
    db_name: String,
    table_name: String,
    convention: IdentifierConvention,
    state: WriterState,
}

impl TableWriter {
    pub(crate) fn new(
        conn: Connection,
        db_name: String,
        table_name: String,
        convention: IdentifierConvention,
    ) -> Self {
        TableWriter {
            conn: Some(conn),
            db_name,
            table_name,
            convention,
            state: WriterState::Unopened,
        }
    }

    /// Declares the column names and creates the table.
    ///
    /// Drops any existing table of the same name first. Valid only as the
    /// very first call on this writer.
    #[instrument(skip_all, fields(table = %self.table_name))]
    pub fn write_header<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<(), TableError> {
        self.connection()?;
        match self.state {
            WriterState::Unopened => {}
            WriterState::Rows { .. } => {
                return Err(self.protocol("can't call write_header() twice"));
            }
            WriterState::Records { .. } | WriterState::Relation { .. } => {
                return Err(self.protocol("can't mix write_record() and write_header()"));
            }
        }

        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let schema = RowSchema::declare(&self.table_name, &self.db_name, &columns, self.convention)?;
        self.execute_row_ddl(&schema)?;

        self.state = WriterState::Rows {
            insert_sql: schema.insert_sql,
            column_count: schema.column_count,
        };
        Ok(())
    }

    /// Writes one positional row. Requires a prior [`TableWriter::write_header`]
    /// call; the row must have exactly as many values as the header declared.
    /// `None` values are stored as SQL NULL.
    pub fn write_row<S: AsRef<str>>(&mut self, values: &[Option<S>]) -> Result<(), TableError> {
        let (insert_sql, column_count) = match &self.state {
            WriterState::Rows {
                insert_sql,
                column_count,
            } => (insert_sql, *column_count),
            WriterState::Unopened => {
                return Err(self.protocol("write_header() must be called before write_row()"));
            }
            WriterState::Records { .. } | WriterState::Relation { .. } => {
                return Err(self.protocol("can't mix write_record() and write_row()"));
            }
        };
        if values.len() != column_count {
            return Err(TableError::protocol(
                &self.table_name,
                &self.db_name,
                format!("expected {} values, but got {}", column_count, values.len()),
            ));
        }

        let conn = self.connection()?;
        let mut stmt = conn
            .prepare_cached(insert_sql)
            .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        stmt.execute(params_from_iter(values.iter().map(|v| {
            v.as_ref().map(|s| s.as_ref())
        })))
        .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        Ok(())
    }

    /// Writes one structured record.
    ///
    /// The first record declares the schema: relation records create the
    /// normalized three-table layout, plain records behave like a fused
    /// `write_header` + `write_row`. Every later record must carry an equal
    /// [`RecordSchema`], otherwise [`TableError::TypeMismatch`] is returned.
    #[instrument(skip_all, fields(table = %self.table_name))]
    pub fn write_record(&mut self, record: &Record) -> Result<(), TableError> {
        self.connection()?;
        match &self.state {
            WriterState::Unopened => {
                self.state = match record.schema().kind() {
                    RecordKind::Row => self.declare_record_table(record.schema())?,
                    RecordKind::Relation => self.declare_relation_tables(record.schema())?,
                };
            }
            WriterState::Rows { .. } => {
                return Err(self.protocol("can't mix write_header() and write_record()"));
            }
            WriterState::Records { schema, .. } | WriterState::Relation { schema, .. } => {
                if record.schema() != schema {
                    return Err(TableError::TypeMismatch {
                        table: self.table_name.clone(),
                        db: self.db_name.clone(),
                        reason: format!(
                            "schema is frozen to {:?}, got {:?}",
                            schema.fields(),
                            record.schema().fields()
                        ),
                    });
                }
            }
        }

        match &self.state {
            WriterState::Records { insert_sql, schema } => {
                self.insert_record(insert_sql, schema.fields().len(), record)
            }
            WriterState::Relation {
                insert_element_sql,
                insert_link_sql,
                schema,
            } => self.insert_relation(
                insert_element_sql,
                insert_link_sql,
                schema.fields().len(),
                record,
            ),
            WriterState::Unopened | WriterState::Rows { .. } => {
                Err(self.protocol("no record schema declared"))
            }
        }
    }

    /// No-op: every write is persisted immediately. Exists to satisfy the
    /// generic writer contract.
    pub fn flush(&mut self) -> Result<(), TableError> {
        Ok(())
    }

    /// Releases the owned connection. Idempotent; any write afterwards fails
    /// with [`TableError::Io`]. Persisted data is left intact.
    pub fn close(&mut self) -> Result<(), TableError> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| TableError::io(&self.table_name, &self.db_name, e))?;
            debug!(table = %self.table_name, "closed writer");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Drops and recreates the plain table for a declared header.
    fn execute_row_ddl(&self, schema: &RowSchema) -> Result<(), TableError> {
        let conn = self.connection()?;
        debug!(sql = %schema.create_sql, "creating table");
        conn.execute(&schema.drop_sql, []).map_err(|e| {
            TableError::io(&self.table_name, &self.db_name, e)
        })?;
        conn.execute(&schema.create_sql, []).map_err(|e| {
            TableError::schema(
                &self.table_name,
                &self.db_name,
                format!("could not create table: {} ({})", e, schema.create_sql),
            )
        })?;
        Ok(())
    }

    /// First plain record: declare the table from the record's field names.
    fn declare_record_table(&self, schema: &RecordSchema) -> Result<WriterState, TableError> {
        let row_schema = RowSchema::declare(
            &self.table_name,
            &self.db_name,
            schema.fields(),
            self.convention,
        )?;
        self.execute_row_ddl(&row_schema)?;
        Ok(WriterState::Records {
            insert_sql: row_schema.insert_sql,
            schema: schema.clone(),
        })
    }

    /// First relation record: create the element dictionary, the relation
    /// table and the reconstructive view. Unlike the header path nothing is
    /// dropped first, so a collision with previously written data fails
    /// instead of destroying it.
    fn declare_relation_tables(&self, schema: &RecordSchema) -> Result<WriterState, TableError> {
        let relation = RelationSchema::declare(
            &self.table_name,
            &self.db_name,
            schema.fields(),
            self.convention,
        )?;

        let conn = self.connection()?;
        for sql in [
            &relation.create_elements_sql,
            &relation.create_relation_sql,
            &relation.create_view_sql,
        ] {
            debug!(sql = %sql, "creating relation artifact");
            conn.execute(sql, []).map_err(|e| {
                TableError::schema(
                    &self.table_name,
                    &self.db_name,
                    format!("could not create relation artifact: {} ({})", e, sql),
                )
            })?;
        }

        Ok(WriterState::Relation {
            insert_element_sql: relation.insert_element_sql,
            insert_link_sql: relation.insert_link_sql,
            schema: schema.clone(),
        })
    }

    /// Inserts one plain record. `None` values become SQL NULL.
    fn insert_record(
        &self,
        insert_sql: &str,
        field_count: usize,
        record: &Record,
    ) -> Result<(), TableError> {
        if record.values().len() != field_count {
            return Err(TableError::protocol(
                &self.table_name,
                &self.db_name,
                format!(
                    "record has {} values for {} fields",
                    record.values().len(),
                    field_count
                ),
            ));
        }

        let conn = self.connection()?;
        let mut stmt = conn
            .prepare_cached(insert_sql)
            .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        stmt.execute(params_from_iter(
            record.values().iter().map(|v| v.as_deref()),
        ))
        .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        Ok(())
    }

    /// Inserts one relation record: register both endpoint values in the
    /// element dictionary (idempotent), then insert one relation row that
    /// resolves the endpoint ids by value.
    ///
    /// The three inserts are not wrapped in a transaction; a concurrent
    /// reader can observe a registered endpoint without its relation row.
    fn insert_relation(
        &self,
        insert_element_sql: &str,
        insert_link_sql: &str,
        field_count: usize,
        record: &Record,
    ) -> Result<(), TableError> {
        if record.values().len() != field_count {
            return Err(TableError::protocol(
                &self.table_name,
                &self.db_name,
                format!(
                    "record has {} values for {} fields",
                    record.values().len(),
                    field_count
                ),
            ));
        }

        let first = record.values()[0].as_deref().ok_or_else(|| {
            TableError::invalid_row(
                &self.table_name,
                &self.db_name,
                "can't use null as relation endpoint",
            )
        })?;
        let second = record.values()[1].as_deref().ok_or_else(|| {
            TableError::invalid_row(
                &self.table_name,
                &self.db_name,
                "can't use null as relation endpoint",
            )
        })?;

        // Null attributes are stored as empty strings, never as NULL.
        let mut link_values: Vec<&str> = Vec::with_capacity(record.values().len());
        link_values.push(first);
        link_values.push(second);
        for value in &record.values()[2..] {
            link_values.push(value.as_deref().unwrap_or(""));
        }

        let conn = self.connection()?;
        let mut element_stmt = conn
            .prepare_cached(insert_element_sql)
            .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        for value in [first, second] {
            element_stmt
                .execute([value])
                .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        }

        let mut link_stmt = conn
            .prepare_cached(insert_link_sql)
            .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        link_stmt
            .execute(params_from_iter(link_values))
            .map_err(|e| TableError::io(&self.table_name, &self.db_name, e))?;
        Ok(())
    }

    /// The owned connection, or an error if this writer was closed.
    fn connection(&self) -> Result<&Connection, TableError> {
        self.conn.as_ref().ok_or_else(|| TableError::Io {
            table: self.table_name.clone(),
            db: self.db_name.clone(),
            reason: "writer closed".to_string(),
        })
    }

    fn protocol(&self, reason: &str) -> TableError {
        TableError::protocol(&self.table_name, &self.db_name, reason)
    }
}
