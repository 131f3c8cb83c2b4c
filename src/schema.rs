use std::collections::HashSet;

use crate::error::TableError;
use crate::escape::IdentifierConvention;

/// Name of the auto-assigned surrogate key column added to every table.
pub const ID_COLUMN: &str = "ID";

/// Prefix reserved by SQLite for its own catalog objects.
const RESERVED_TABLE_PREFIX: &str = "sqlite_";

/// The SQL statements for one plain (non-relation) table.
///
/// Produced by [`RowSchema::declare`]; executing the DDL is the writer's job.
/// The insert template has one placeholder per declared column plus a literal
/// NULL for the surrogate key, which makes SQLite auto-assign it.
#[derive(Debug, Clone)]
pub struct RowSchema {
    pub drop_sql: String,
    pub create_sql: String,
    pub insert_sql: String,
    pub column_count: usize,
}

impl RowSchema {
    /// Validates the column names and builds the DROP/CREATE/INSERT
    /// statements for `table`.
    ///
    /// `table` and `db` are also used to annotate errors.
    pub fn declare(
        table: &str,
        db: &str,
        columns: &[String],
        convention: IdentifierConvention,
    ) -> Result<RowSchema, TableError> {
        validate_table_name(table, db)?;
        if columns.is_empty() {
            return Err(TableError::schema(
                table,
                db,
                "table must have at least one column",
            ));
        }

        let escaped_table = convention.identifier(table);
        let escaped_id = convention.identifier(ID_COLUMN);

        let mut column_defs = String::new();
        let mut placeholders = String::new();
        let mut seen = HashSet::new();
        for column in columns {
            let escaped = escaped_column(table, db, column, convention, &mut seen)?;
            column_defs.push_str(&format!(", {} TEXT", escaped));
            placeholders.push_str(", ?");
        }

        let drop_sql = format!("DROP TABLE IF EXISTS {};", escaped_table);
        let create_sql = format!(
            "CREATE TABLE {} ({} INTEGER PRIMARY KEY{});",
            escaped_table, escaped_id, column_defs
        );
        // NULL for the primary key, so it is auto-incremented.
        let insert_sql = format!(
            "INSERT INTO {} VALUES (NULL{});",
            escaped_table, placeholders
        );

        Ok(RowSchema {
            drop_sql,
            create_sql,
            insert_sql,
            column_count: columns.len(),
        })
    }
}

/// Rejects table names SQLite reserves for its own catalog.
pub(crate) fn validate_table_name(table: &str, db: &str) -> Result<(), TableError> {
    let reserved = table
        .get(..RESERVED_TABLE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RESERVED_TABLE_PREFIX));
    if reserved {
        return Err(TableError::schema(
            table,
            db,
            format!(
                "table names starting with '{}' are reserved by the engine",
                RESERVED_TABLE_PREFIX
            ),
        ));
    }
    Ok(())
}

/// Escapes one column name, checking it is non-empty, unique after escaping
/// and does not collide with the surrogate key column.
///
/// Column names are compared case-insensitively, matching how SQLite
/// resolves them.
pub(crate) fn escaped_column(
    table: &str,
    db: &str,
    column: &str,
    convention: IdentifierConvention,
    seen: &mut HashSet<String>,
) -> Result<String, TableError> {
    if column.is_empty() {
        return Err(TableError::invalid_row(
            table,
            db,
            "empty column name in header",
        ));
    }

    let escaped = convention.column(table, column);
    if escaped.eq_ignore_ascii_case(&convention.identifier(ID_COLUMN)) {
        return Err(TableError::schema(
            table,
            db,
            format!(
                "column name '{}' collides with the surrogate key column",
                column
            ),
        ));
    }
    if !seen.insert(escaped.to_lowercase()) {
        return Err(TableError::schema(
            table,
            db,
            format!("duplicate column name '{}'", column),
        ));
    }

    Ok(escaped)
}
