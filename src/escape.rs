use serde::{Deserialize, Serialize};

/// Policy for turning arbitrary strings into SQL identifiers.
///
/// Two conventions exist in the wild:
///
/// - [`IdentifierConvention::Quoted`] wraps the raw string in double quotes
///   and doubles any embedded quote. This tolerates spaces, punctuation,
///   non-ASCII letters and the quote character itself, and is the only
///   convention used for newly written databases.
/// - [`IdentifierConvention::Legacy`] is the mangling scheme of an earlier
///   generation of this adapter: non-alphanumeric characters become
///   underscores (after transliterating German umlauts) and column names are
///   prefixed with their table name. It is kept so old databases written
///   under that scheme can still be addressed, and must not be used for new
///   data.
///
/// The convention is injected where writers and readers are constructed; it
/// is never a global flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierConvention {
    /// Quote-based escaping, lossless for round trips.
    #[default]
    Quoted,
    /// Underscore mangling with table-name column prefixes.
    Legacy,
}

impl IdentifierConvention {
    /// Escapes a standalone identifier (table name, view name, join alias).
    ///
    /// Total over all inputs; never fails.
    pub fn identifier(self, name: &str) -> String {
        match self {
            IdentifierConvention::Quoted => quote(name),
            IdentifierConvention::Legacy => mangle(name),
        }
    }

    /// Escapes a column name. The legacy convention prefixes the column with
    /// its table name, so the owning table must be supplied.
    pub fn column(self, table: &str, name: &str) -> String {
        match self {
            IdentifierConvention::Quoted => quote(name),
            IdentifierConvention::Legacy => format!("{}_{}", mangle(table), mangle(name)),
        }
    }
}

/// Wraps `name` in double quotes, doubling embedded quotes.
///
/// This is the only escaping SQLite needs for identifiers; no other
/// substitution is applied.
fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Legacy mangling: transliterate umlauts, then replace everything outside
/// `[A-Za-z0-9_]` with an underscore.
fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'ä' => out.push_str("ae"),
            'Ä' => out.push_str("Ae"),
            'ö' => out.push_str("oe"),
            'Ö' => out.push_str("Oe"),
            'ü' => out.push_str("ue"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            _ => out.push('_'),
        }
    }
    out
}
