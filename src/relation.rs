use std::collections::HashSet;

use crate::error::TableError;
use crate::escape::IdentifierConvention;
use crate::schema::{escaped_column, validate_table_name, ID_COLUMN};

/// Column holding the endpoint values inside the element dictionary.
const ELEMENT_COLUMN: &str = "Element";

/// Aliases used to join the element dictionary twice in the view. These only
/// exist inside the view's SELECT, so a user table with the same name still
/// works.
const JOIN_ALIAS_1: &str = "tmp_join1";
const JOIN_ALIAS_2: &str = "tmp_join2";

/// The normalized three-table representation of a relation.
///
/// A relation table named `X` is stored as:
///
/// 1. an element dictionary `X Elements` mapping each distinct endpoint
///    value to a surrogate integer id (insert-or-ignore keeps values unique),
/// 2. the relation table `X` holding two id columns (foreign keys into the
///    dictionary) plus one TEXT column per attribute field,
/// 3. a read-only view `X View` joining the relation table twice against the
///    dictionary to restore the original string values under the original
///    field names. Readers use the view, never `X` directly.
///
/// None of the CREATE statements use IF NOT EXISTS: a collision with a
/// previously created table or view must fail loudly instead of silently
/// overwriting unrelated data.
#[derive(Debug, Clone)]
pub struct RelationSchema {
    pub create_elements_sql: String,
    pub create_relation_sql: String,
    pub create_view_sql: String,
    /// `INSERT OR IGNORE` of one endpoint value into the dictionary.
    pub insert_element_sql: String,
    /// Insert of one relation row, resolving both endpoint ids via
    /// correlated subqueries against the dictionary.
    pub insert_link_sql: String,
    pub field_count: usize,
}

impl RelationSchema {
    /// Builds the DDL and insert templates for a relation named `table`.
    ///
    /// The first two entries of `fields` are the endpoint columns, the rest
    /// are attributes. Fails with [`TableError::Schema`] if fewer than two
    /// fields are supplied or any name is invalid.
    pub fn declare(
        table: &str,
        db: &str,
        fields: &[String],
        convention: IdentifierConvention,
    ) -> Result<RelationSchema, TableError> {
        validate_table_name(table, db)?;
        if fields.len() < 2 {
            return Err(TableError::schema(
                table,
                db,
                format!("a relation needs at least 2 fields, got {}", fields.len()),
            ));
        }

        let elements_raw = format!("{} Elements", table);
        let view_raw = format!("{} View", table);

        let relation_table = convention.identifier(table);
        let elements_table = convention.identifier(&elements_raw);
        let view_name = convention.identifier(&view_raw);
        let id = convention.identifier(ID_COLUMN);
        let element = convention.column(&elements_raw, ELEMENT_COLUMN);

        let mut seen = HashSet::new();
        let first = escaped_column(table, db, &fields[0], convention, &mut seen)?;
        let second = escaped_column(table, db, &fields[1], convention, &mut seen)?;
        let mut attributes = Vec::with_capacity(fields.len() - 2);
        for field in &fields[2..] {
            attributes.push(escaped_column(table, db, field, convention, &mut seen)?);
        }

        let create_elements_sql = format!(
            "CREATE TABLE {elements} ({id} INTEGER PRIMARY KEY, {element} TEXT, UNIQUE({element}));",
            elements = elements_table,
            id = id,
            element = element,
        );

        let mut attribute_defs = String::new();
        for attribute in &attributes {
            attribute_defs.push_str(&format!("{} TEXT, ", attribute));
        }
        let create_relation_sql = format!(
            "CREATE TABLE {relation} ({first} INTEGER, {second} INTEGER, {attrs}\
             FOREIGN KEY({first}) REFERENCES {elements}({id}), \
             FOREIGN KEY({second}) REFERENCES {elements}({id}));",
            relation = relation_table,
            first = first,
            second = second,
            attrs = attribute_defs,
            elements = elements_table,
            id = id,
        );

        // Join twice against the dictionary under two aliases, one per
        // foreign key reference.
        let alias1 = convention.identifier(JOIN_ALIAS_1);
        let alias2 = convention.identifier(JOIN_ALIAS_2);
        let mut attribute_list = String::new();
        for attribute in &attributes {
            attribute_list.push_str(&format!(", {}", attribute));
        }
        let create_view_sql = format!(
            "CREATE VIEW {view} AS SELECT {a1}.{element} AS {first}, {a2}.{element} AS {second}{attrs} \
             FROM {relation} \
             INNER JOIN {elements} AS {a1} ON {relation}.{first} = {a1}.{id} \
             INNER JOIN {elements} AS {a2} ON {relation}.{second} = {a2}.{id};",
            view = view_name,
            a1 = alias1,
            a2 = alias2,
            element = element,
            first = first,
            second = second,
            attrs = attribute_list,
            relation = relation_table,
            elements = elements_table,
            id = id,
        );

        // NULL auto-assigns the dictionary id; OR IGNORE keeps repeated
        // endpoint values from creating duplicate entries.
        let insert_element_sql = format!(
            "INSERT OR IGNORE INTO {} VALUES (NULL, ?);",
            elements_table
        );

        let id_lookup = format!(
            "(SELECT {} FROM {} WHERE {} = ?)",
            id, elements_table, element
        );
        let mut placeholders = String::new();
        for _ in &attributes {
            placeholders.push_str(", ?");
        }
        let insert_link_sql = format!(
            "INSERT INTO {} VALUES ({}, {}{});",
            relation_table, id_lookup, id_lookup, placeholders
        );

        Ok(RelationSchema {
            create_elements_sql,
            create_relation_sql,
            create_view_sql,
            insert_element_sql,
            insert_link_sql,
            field_count: fields.len(),
        })
    }
}
