//! SQLite-backed store gateway.
//!
//! [`Store`] holds only the database path; every operation opens a fresh
//! connection, so the engine's own locking is the only cross-call
//! coordination. Writes run inside explicit transactions and report
//! success only after the commit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{
    Connection, ErrorCode, OptionalExtension, TransactionBehavior, params, params_from_iter,
};

use crate::store::{
    CodeRecord, CombinedRecord, CommentRecord, ComparisonStatus, Record, RenderRecord, StateRecord,
    StoreError, Table,
};

/// Database file name inside the configured store directory.
const STORE_FILE: &str = "pairvault.db";

/// Schema version recorded in `PRAGMA user_version`. A database below this
/// version gets the creation batch re-run, which only adds missing tables.
const SCHEMA_VERSION: i64 = 1;

/// How long a connection waits on the engine's lock before giving up, in
/// milliseconds. Reset connections override this to zero.
const BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS code (
      base TEXT PRIMARY KEY,
      code TEXT NOT NULL,
      language TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS render (
      base TEXT PRIMARY KEY,
      content TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS state (
      base TEXT PRIMARY KEY,
      state TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS comment (
      base TEXT PRIMARY KEY,
      comment TEXT NOT NULL
    );
";

/// Handle to the artifact store.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Open the store in `dir`, creating the directory, the database file
    /// and any missing tables. Safe to call against an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created, or
    /// [`StoreError::Sql`] if the database cannot be opened or migrated.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let store = Self {
            db_path: dir.join(STORE_FILE),
        };
        store.connect()?;
        Ok(store)
    }

    /// Path of the underlying database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Delete every table and recreate the empty schema.
    ///
    /// The drop runs inside one exclusive transaction taken with a zero
    /// busy timeout: a concurrent write transaction surfaces immediately as
    /// [`StoreError::Busy`] instead of stalling the reset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Busy`] when another session holds the write
    /// lock, or [`StoreError::Sql`] on any other engine failure.
    pub fn reset(&self) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        conn.execute_batch("PRAGMA busy_timeout = 0;")?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(busy_or_sql)?;
        for table in Table::ALL {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", table.name()), [])?;
        }
        tx.pragma_update(None, "user_version", 0)?;
        tx.commit()?;
        migrate(&conn)?;
        Ok(())
    }

    /// Fetch one record by base, or `None` if the base has no row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on engine failure.
    pub fn get<R: Record>(&self, base: &str) -> Result<Option<R>, StoreError> {
        let conn = self.connect()?;
        fetch(&conn, base)
    }

    /// Fetch every record of a table in lexicographic base order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on engine failure.
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let conn = self.connect()?;
        fetch_all(&conn)
    }

    /// Insert or update one record inside its own transaction. Returns only
    /// after the row write and the commit have both succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on engine failure.
    pub fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        upsert(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete every row of the given tables inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on engine failure.
    pub fn clear(&self, tables: &[Table]) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for table in tables {
            tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Write one base's code, render and state rows in a single
    /// transaction. Either all three rows commit or none do.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on engine failure; nothing is persisted
    /// in that case.
    pub fn put_artifact_set(
        &self,
        code: &CodeRecord,
        render: &RenderRecord,
        state: &StateRecord,
    ) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        upsert(&tx, code)?;
        upsert(&tx, render)?;
        upsert(&tx, state)?;
        tx.commit()?;
        Ok(())
    }

    /// Join all tables into review records, sorted by base.
    ///
    /// The join is seeded from the code table. Render content is required:
    /// a base without it is dropped from the view. Missing state defaults
    /// to [`ComparisonStatus::NotCompared`] and missing comment to the
    /// empty string. One read transaction spans all four tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on engine failure.
    pub fn get_all_combined(&self) -> Result<Vec<CombinedRecord>, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let codes: Vec<CodeRecord> = fetch_all(&tx)?;
        let renders: Vec<RenderRecord> = fetch_all(&tx)?;
        let states: Vec<StateRecord> = fetch_all(&tx)?;
        let comments: Vec<CommentRecord> = fetch_all(&tx)?;
        tx.commit()?;

        let mut merged: BTreeMap<String, PartialCombined> = BTreeMap::new();
        for code in codes {
            merged.insert(
                code.base.clone(),
                PartialCombined {
                    base: code.base,
                    code: code.code,
                    language: code.language,
                    render: None,
                    state: ComparisonStatus::NotCompared,
                    comment: String::new(),
                },
            );
        }
        for render in renders {
            if let Some(partial) = merged.get_mut(&render.base) {
                partial.render = Some(render.content);
            }
        }
        for state in states {
            if let Some(partial) = merged.get_mut(&state.base) {
                partial.state = state.state;
            }
        }
        for comment in comments {
            if let Some(partial) = merged.get_mut(&comment.base) {
                partial.comment = comment.comment;
            }
        }

        Ok(merged
            .into_values()
            .filter_map(PartialCombined::complete)
            .collect())
    }

    /// Typed alias of [`Store::get`] for the code table.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub fn get_code(&self, base: &str) -> Result<Option<CodeRecord>, StoreError> {
        self.get(base)
    }

    /// Typed alias of [`Store::get_all`] for the code table.
    ///
    /// # Errors
    ///
    /// See [`Store::get_all`].
    pub fn get_all_codes(&self) -> Result<Vec<CodeRecord>, StoreError> {
        self.get_all()
    }

    /// Typed alias of [`Store::put`] for the code table.
    ///
    /// # Errors
    ///
    /// See [`Store::put`].
    pub fn put_code(&self, record: &CodeRecord) -> Result<(), StoreError> {
        self.put(record)
    }

    /// Typed alias of [`Store::get`] for the render table.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub fn get_render(&self, base: &str) -> Result<Option<RenderRecord>, StoreError> {
        self.get(base)
    }

    /// Typed alias of [`Store::get_all`] for the render table.
    ///
    /// # Errors
    ///
    /// See [`Store::get_all`].
    pub fn get_all_renders(&self) -> Result<Vec<RenderRecord>, StoreError> {
        self.get_all()
    }

    /// Typed alias of [`Store::put`] for the render table.
    ///
    /// # Errors
    ///
    /// See [`Store::put`].
    pub fn put_render(&self, record: &RenderRecord) -> Result<(), StoreError> {
        self.put(record)
    }

    /// Typed alias of [`Store::get`] for the state table.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub fn get_state(&self, base: &str) -> Result<Option<StateRecord>, StoreError> {
        self.get(base)
    }

    /// Typed alias of [`Store::get_all`] for the state table.
    ///
    /// # Errors
    ///
    /// See [`Store::get_all`].
    pub fn get_all_states(&self) -> Result<Vec<StateRecord>, StoreError> {
        self.get_all()
    }

    /// Typed alias of [`Store::put`] for the state table.
    ///
    /// # Errors
    ///
    /// See [`Store::put`].
    pub fn put_state(&self, record: &StateRecord) -> Result<(), StoreError> {
        self.put(record)
    }

    /// Typed alias of [`Store::get`] for the comment table.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub fn get_comment(&self, base: &str) -> Result<Option<CommentRecord>, StoreError> {
        self.get(base)
    }

    /// Typed alias of [`Store::get_all`] for the comment table.
    ///
    /// # Errors
    ///
    /// See [`Store::get_all`].
    pub fn get_all_comments(&self) -> Result<Vec<CommentRecord>, StoreError> {
        self.get_all()
    }

    /// Typed alias of [`Store::put`] for the comment table.
    ///
    /// # Errors
    ///
    /// See [`Store::put`].
    pub fn put_comment(&self, record: &CommentRecord) -> Result<(), StoreError> {
        self.put(record)
    }

    /// Overwrite the review status for one base.
    ///
    /// # Errors
    ///
    /// See [`Store::put`].
    pub fn update_state(&self, base: &str, state: ComparisonStatus) -> Result<(), StoreError> {
        self.put(&StateRecord {
            base: base.to_string(),
            state,
        })
    }

    /// Overwrite the reviewer comment for one base.
    ///
    /// # Errors
    ///
    /// See [`Store::put`].
    pub fn update_comment(&self, base: &str, comment: &str) -> Result<(), StoreError> {
        self.put(&CommentRecord {
            base: base.to_string(),
            comment: comment.to_string(),
        })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))?;
        migrate(&conn)?;
        Ok(conn)
    }
}

/// Join accumulator for one base; `render` stays `None` until the render
/// table contributes.
struct PartialCombined {
    base: String,
    code: String,
    language: String,
    render: Option<String>,
    state: ComparisonStatus,
    comment: String,
}

impl PartialCombined {
    fn complete(self) -> Option<CombinedRecord> {
        let render = self.render?;
        Some(CombinedRecord {
            base: self.base,
            code: self.code,
            language: self.language,
            render,
            state: self.state,
            comment: self.comment,
        })
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

fn busy_or_sql(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err
        && matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    {
        return StoreError::Busy;
    }
    StoreError::Sql(err)
}

fn upsert<R: Record>(conn: &Connection, record: &R) -> Result<(), StoreError> {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        R::TABLE.name(),
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(record.params()))?;
    Ok(())
}

fn fetch<R: Record>(conn: &Connection, base: &str) -> Result<Option<R>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE base = ?1",
        R::COLUMNS.join(", "),
        R::TABLE.name()
    );
    Ok(conn.query_row(&sql, params![base], R::from_row).optional()?)
}

fn fetch_all<R: Record>(conn: &Connection) -> Result<Vec<R>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY base",
        R::COLUMNS.join(", "),
        R::TABLE.name()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], R::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
