pub mod repository;

use std::path::{Path, PathBuf};

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;\
                       PRAGMA foreign_keys=ON;\
                       PRAGMA busy_timeout=5000;";

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}

/// The task store. Imports and config writes go through `writer`; summaries
/// and lookups read through `reader`, so a long import does not stall a
/// summary query.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// `~/.taskpulse/taskpulse.db`, creating the directory if needed.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".taskpulse");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Ok(dir.join("taskpulse.db"))
    }

    pub async fn open() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) a task store file and bring its schema up to date.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening task store at {}", path.display());

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::migrate(&writer).await?;
        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::configure(&reader).await?;
        Ok(Self { writer, reader })
    }

    /// A throwaway store. `:memory:` databases are private to a connection,
    /// so reads and writes share it.
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::migrate(&conn).await?;
        Ok(Self {
            reader: conn.clone(),
            writer: conn,
        })
    }

    async fn configure(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await?;
        Ok(())
    }

    async fn migrate(conn: &tokio_rusqlite::Connection) -> Result<()> {
        Self::configure(conn).await?;
        conn.call(|conn| migrations().to_latest(conn).map_err(|e| e.to_string()))
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        log::trace!("Task store schema is current");
        Ok(())
    }

    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}
