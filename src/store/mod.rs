//! Typed access layer over the local artifact store.
//!
//! The store is a single SQLite database holding one table per record kind
//! (code, render, state, comment), every table keyed by the shared `base`
//! identifier. [`Store`] exposes generic get/get-all/put/clear primitives
//! written against the [`Record`] trait, thin typed aliases per table, and
//! the combined review view.

pub mod sqlite;

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

pub use sqlite::Store;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A reset could not take the exclusive lock because another session
    /// holds a write transaction.
    #[error("Store is busy; close other sessions and retry")]
    Busy,

    #[error("Storage engine error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The named tables of the store, all keyed by `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Code,
    Render,
    State,
    Comment,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Code, Table::Render, Table::State, Table::Comment];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Render => "render",
            Self::State => "state",
            Self::Comment => "comment",
        }
    }
}

/// Review status of one artifact set.
///
/// Every import starts a base at [`ComparisonStatus::NotCompared`]; review
/// actions overwrite it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonStatus {
    Equal,
    Different,
    #[default]
    NotCompared,
}

impl ComparisonStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Different => "different",
            Self::NotCompared => "not-compared",
        }
    }

    /// Parse the canonical text form stored in the database.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "equal" => Some(Self::Equal),
            "different" => Some(Self::Different),
            "not-compared" => Some(Self::NotCompared),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ComparisonStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ComparisonStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Self::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown comparison state: {text}").into()))
    }
}

/// One row of [`Table::Code`]: the chosen source text for a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRecord {
    pub base: String,
    pub code: String,
    /// Extension tag of the code entry that won the tie-break (e.g. "py").
    pub language: String,
}

/// One row of [`Table::Render`]: the fence-trimmed render content for a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRecord {
    pub base: String,
    pub content: String,
}

/// One row of [`Table::State`]: the review status for a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub base: String,
    pub state: ComparisonStatus,
}

/// One row of [`Table::Comment`]: the reviewer comment for a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub base: String,
    pub comment: String,
}

/// A fully joined review record, materialized by
/// [`Store::get_all_combined`]; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedRecord {
    pub base: String,
    pub code: String,
    pub language: String,
    pub render: String,
    pub state: ComparisonStatus,
    pub comment: String,
}

/// Row mapping for one table, used by the generic store primitives.
///
/// `COLUMNS` starts with `base`; `params` must yield values in the same
/// order, and `from_row` reads a row selected in that order.
pub trait Record: Sized {
    const TABLE: Table;
    const COLUMNS: &'static [&'static str];

    /// Map a result row back into the record.
    ///
    /// # Errors
    ///
    /// Returns an engine error if a column cannot be converted.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;

    /// Bind values in `COLUMNS` order.
    fn params(&self) -> Vec<&dyn ToSql>;
}

impl Record for CodeRecord {
    const TABLE: Table = Table::Code;
    const COLUMNS: &'static [&'static str] = &["base", "code", "language"];

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            base: row.get(0)?,
            code: row.get(1)?,
            language: row.get(2)?,
        })
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.base, &self.code, &self.language]
    }
}

impl Record for RenderRecord {
    const TABLE: Table = Table::Render;
    const COLUMNS: &'static [&'static str] = &["base", "content"];

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            base: row.get(0)?,
            content: row.get(1)?,
        })
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.base, &self.content]
    }
}

impl Record for StateRecord {
    const TABLE: Table = Table::State;
    const COLUMNS: &'static [&'static str] = &["base", "state"];

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            base: row.get(0)?,
            state: row.get(1)?,
        })
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.base, &self.state]
    }
}

impl Record for CommentRecord {
    const TABLE: Table = Table::Comment;
    const COLUMNS: &'static [&'static str] = &["base", "comment"];

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            base: row.get(0)?,
            comment: row.get(1)?,
        })
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.base, &self.comment]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod status_tests {
        use super::*;

        #[test]
        fn canonical_text_round_trips() {
            for status in [
                ComparisonStatus::Equal,
                ComparisonStatus::Different,
                ComparisonStatus::NotCompared,
            ] {
                assert_eq!(ComparisonStatus::parse(status.as_str()), Some(status));
            }
        }

        #[test]
        fn unknown_text_is_rejected() {
            assert_eq!(ComparisonStatus::parse("compared"), None);
            assert_eq!(ComparisonStatus::parse(""), None);
            assert_eq!(ComparisonStatus::parse("Equal"), None);
        }

        #[test]
        fn default_is_not_compared() {
            assert_eq!(ComparisonStatus::default(), ComparisonStatus::NotCompared);
        }

        #[test]
        fn display_matches_stored_form() {
            assert_eq!(ComparisonStatus::NotCompared.to_string(), "not-compared");
        }
    }

    mod table_tests {
        use super::*;

        #[test]
        fn names_are_distinct() {
            let names: Vec<&str> = Table::ALL.iter().map(|t| t.name()).collect();
            assert_eq!(names, vec!["code", "render", "state", "comment"]);
        }

        #[test]
        fn columns_start_with_base() {
            assert_eq!(CodeRecord::COLUMNS[0], "base");
            assert_eq!(RenderRecord::COLUMNS[0], "base");
            assert_eq!(StateRecord::COLUMNS[0], "base");
            assert_eq!(CommentRecord::COLUMNS[0], "base");
        }
    }
}
