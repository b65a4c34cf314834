//! Building value indexes from a SQLite database.
//!
//! For every `table.column` to index:
//!
//! 1. if a value mapping exists (keyed `table.column`, else bare `column`),
//!    each `db_value → description` pair becomes an entry searchable by its
//!    description
//! 2. otherwise the column's distinct, non-null, non-blank values are read
//!    and each one is searchable by itself

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};

use super::index::{IndexEntry, IndexError, IndexResult, ValueIndex};

/// `db_value → description` translations, keyed by `table.column` or `column`.
pub type ValueMappings = HashMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    columns: Vec<String>,
    mappings: ValueMappings,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `table.column` to index.
    pub fn column(mut self, qualified: &str) -> Self {
        self.columns.push(qualified.to_string());
        self
    }

    pub fn columns<I, S>(mut self, qualified: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(qualified.into_iter().map(Into::into));
        self
    }

    pub fn mappings(mut self, mappings: ValueMappings) -> Self {
        self.mappings = mappings;
        self
    }

    /// Build against a database file, opened read-only.
    pub fn build_from_path<P: AsRef<Path>>(&self, path: P) -> IndexResult<ValueIndex> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        self.build(&conn)
    }

    pub fn build(&self, conn: &Connection) -> IndexResult<ValueIndex> {
        let mut index = ValueIndex::new();

        for qualified in &self.columns {
            let (table, column) = qualified
                .split_once('.')
                .filter(|(t, c)| !t.is_empty() && !c.is_empty())
                .ok_or_else(|| IndexError::InvalidColumn(qualified.clone()))?;

            let entries = match self.mapping_for(qualified, column) {
                Some(mapping) => mapping
                    .iter()
                    .map(|(db_value, description)| IndexEntry::new(description, db_value))
                    .collect(),
                None => distinct_values(conn, table, column)?
                    .into_iter()
                    .map(IndexEntry::raw)
                    .collect::<Vec<_>>(),
            };

            tracing::debug!(table, column, entries = entries.len(), "indexed column");
            index.insert(table, column, entries);
        }

        Ok(index)
    }

    fn mapping_for(&self, qualified: &str, column: &str) -> Option<&BTreeMap<String, String>> {
        self.mappings
            .get(qualified)
            .or_else(|| self.mappings.get(column))
            .filter(|mapping| !mapping.is_empty())
    }
}

fn distinct_values(conn: &Connection, table: &str, column: &str) -> IndexResult<Vec<String>> {
    let column = quote_ident(column);
    let sql = format!(
        "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL",
        col = column,
        table = quote_ident(table)
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, Value>(0))?;

    let mut values = Vec::new();
    for value in rows {
        let text = match value? {
            Value::Text(s) => s,
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Null | Value::Blob(_) => continue,
        };
        if !text.trim().is_empty() {
            values.push(text);
        }
    }
    Ok(values)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
