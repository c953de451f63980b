use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use nocturne_schemas::{Disclosure, MemoryRecord, NewRecord, RecordId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::paths::{self, PATH_SEPARATOR};

/// Append-only, path-addressed target store
#[async_trait]
pub trait HierarchicalStore: Send {
    /// Fails when the store cannot be reached
    async fn ping(&mut self) -> Result<()>;

    async fn init_schema(&mut self) -> Result<()>;

    /// Create one record under `parent_path`.
    ///
    /// Must fail when a non-empty `parent_path` does not already exist.
    async fn create_record(&mut self, record: NewRecord) -> Result<MemoryRecord>;

    async fn close(&mut self) -> Result<()>;
}

/// Rejections raised by [`SqliteStore`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store is not initialized; call init_schema first")]
    NotInitialized,

    #[error("parent path '{domain}://{parent_path}' does not exist")]
    ParentMissing { domain: String, parent_path: String },

    #[error("path '{domain}://{path}' already exists")]
    PathExists { domain: String, path: String },

    #[error("invalid title '{0}': must be non-empty and contain no '/'")]
    InvalidTitle(String),
}

/// SQLite-backed hierarchical store.
///
/// The connection is opened lazily by `init_schema`, so checking the store
/// never creates a database file.
pub struct SqliteStore {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: None,
        }
    }

    /// Open an existing database and make sure the schema is present
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut store = Self::new(path);
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&mut self) -> Result<()> {
        if self.conn.is_none() {
            let conn = Connection::open(&self.path)
                .with_context(|| format!("Failed to open SQLite database {}", self.path.display()))?;
            Self::create_tables(&conn)?;
            info!("SQLite store initialized at {}", self.path.display());
            self.conn = Some(conn);
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        Ok(self.conn.as_ref().ok_or(StoreError::NotInitialized)?)
    }

    fn create_tables(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL,
                path TEXT NOT NULL,
                parent_path TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                disclosure TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (domain, path)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_memories_parent ON memories(domain, parent_path)",
            [],
        )?;

        Ok(())
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<MemoryRecord> {
        let disclosure: Option<String> = row.get(7)?;
        Ok(MemoryRecord {
            id: RecordId(row.get(0)?),
            domain: row.get(1)?,
            path: row.get(2)?,
            parent_path: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            priority: row.get(6)?,
            disclosure: disclosure.as_deref().and_then(Disclosure::parse),
            created_at: row.get(8)?,
        })
    }

    /// Look up a record by its full path
    pub fn get_record(&self, domain: &str, path: &str) -> Result<Option<MemoryRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT id, domain, path, parent_path, title, content, priority, disclosure, created_at
                 FROM memories WHERE domain = ?1 AND path = ?2",
                params![domain, path],
                Self::row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    /// Direct children of a path, in creation order
    pub fn list_children(&self, domain: &str, parent_path: &str) -> Result<Vec<MemoryRecord>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT id, domain, path, parent_path, title, content, priority, disclosure, created_at
             FROM memories
             WHERE domain = ?1 AND parent_path = ?2
             ORDER BY id",
        )?;

        let records = stmt
            .query_map(params![domain, parent_path], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count records in a domain
    pub fn count_records(&self, domain: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM memories WHERE domain = ?1",
            params![domain],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert(conn: &mut Connection, record: &NewRecord) -> Result<MemoryRecord> {
        if record.title.is_empty() || record.title.contains(PATH_SEPARATOR) {
            return Err(StoreError::InvalidTitle(record.title.clone()).into());
        }

        let path = paths::join_path(&record.parent_path, &record.title);
        let created_at = Utc::now().to_rfc3339();

        let tx = conn.transaction()?;

        if !record.parent_path.is_empty() {
            let parent: Option<i64> = tx
                .query_row(
                    "SELECT id FROM memories WHERE domain = ?1 AND path = ?2",
                    params![record.domain, record.parent_path],
                    |row| row.get(0),
                )
                .optional()?;
            if parent.is_none() {
                return Err(StoreError::ParentMissing {
                    domain: record.domain.clone(),
                    parent_path: record.parent_path.clone(),
                }
                .into());
            }
        }

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM memories WHERE domain = ?1 AND path = ?2",
                params![record.domain, path],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::PathExists {
                domain: record.domain.clone(),
                path,
            }
            .into());
        }

        tx.execute(
            "INSERT INTO memories (domain, path, parent_path, title, content, priority, disclosure, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.domain,
                path,
                record.parent_path,
                record.title,
                record.content,
                record.priority,
                record.disclosure.map(|d| d.as_str()),
                created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!("Inserted memory {} at {}", id, paths::display_uri(&record.domain, &path));

        Ok(MemoryRecord {
            id: RecordId(id),
            domain: record.domain.clone(),
            path,
            parent_path: record.parent_path.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            priority: record.priority,
            disclosure: record.disclosure,
            created_at,
        })
    }
}

#[async_trait]
impl HierarchicalStore for SqliteStore {
    async fn ping(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                anyhow::bail!("database directory {} does not exist", dir.display())
            }
            _ => Ok(()),
        }
    }

    async fn init_schema(&mut self) -> Result<()> {
        self.connect()
    }

    async fn create_record(&mut self, record: NewRecord) -> Result<MemoryRecord> {
        let conn = self.conn.as_mut().ok_or(StoreError::NotInitialized)?;
        Self::insert(conn, &record)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err)?;
            debug!("SQLite store closed");
        }
        Ok(())
    }
}
