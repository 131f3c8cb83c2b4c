use serde::{Deserialize, Serialize};

/// Whether a record describes a plain row or a relation between two
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// One row of named columns.
    Row,
    /// A link between two endpoint values, plus optional attributes. The
    /// first two fields are the endpoints.
    Relation,
}

/// The shape of a structured record: its ordered field names and its kind.
///
/// This replaces runtime type inspection: the caller describes the record
/// layout explicitly, and a writer freezes the first schema it sees. Two
/// records are compatible exactly when their schemas are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    kind: RecordKind,
    fields: Vec<String>,
}

impl RecordSchema {
    pub fn new<S: Into<String>>(kind: RecordKind, fields: impl IntoIterator<Item = S>) -> Self {
        RecordSchema {
            kind,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// One structured record: a schema plus one optional string value per field.
///
/// `None` values are stored as SQL NULL for plain rows; for relations they
/// are only allowed in attribute fields (endpoints must be present) and are
/// stored as empty strings.
#[derive(Debug, Clone)]
pub struct Record {
    schema: RecordSchema,
    values: Vec<Option<String>>,
}

impl Record {
    /// Pairs a schema with its values. The writer checks at write time that
    /// the value count matches the field count.
    pub fn new(schema: RecordSchema, values: Vec<Option<String>>) -> Self {
        Record { schema, values }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }
}
