//! # tabledb
//!
//! SQLite-backed table collection for analysis pipelines.
//!
//! This crate maps a generic "rows of named columns" abstraction onto a
//! local SQLite file, so pipeline stages that otherwise emit flat delimited
//! files can target a structured database instead. Many-to-many relation
//! records get a normalized three-table representation (element dictionary,
//! relation links, reconstructive view) built automatically by the writer.
//!
//! ## Quick start
//!
//! ```no_run
//! use tabledb::TableCollection;
//!
//! let collection = TableCollection::open("results.sqlite").unwrap();
//!
//! let mut writer = collection.get_writer("People").unwrap();
//! writer.write_header(&["First Name", "Last Name"]).unwrap();
//! writer.write_row(&[Some("Donald"), Some("Duck")]).unwrap();
//! writer.close().unwrap();
//!
//! let mut reader = collection.get_reader("People").unwrap();
//! while let Some(row) = reader.read_next_row().unwrap() {
//!     println!("{:?}", row);
//! }
//! ```

pub mod collection;
pub mod error;
pub mod escape;
pub mod reader;
pub mod record;
pub mod relation;
pub mod schema;
pub mod writer;

// Re-exports for convenience.
pub use collection::TableCollection;
pub use error::TableError;
pub use escape::IdentifierConvention;
pub use reader::TableReader;
pub use record::{Record, RecordKind, RecordSchema};
pub use writer::TableWriter;
