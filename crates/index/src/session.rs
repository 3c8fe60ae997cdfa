//! Named, persistent engine sessions.
//!
//! A session is a directory under `.simserver/sessions/<name>/` with the
//! engine config and a SQLite snapshot. Opening a session takes the
//! database's write lock and restores the engine; `persist` writes it back
//! and releases the lock. A session dropped without persisting discards its
//! changes. Two processes working on the same session therefore run one
//! after the other instead of overwriting each other's batches.

use rusqlite::Connection;
use simserver_core::AppResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, EngineConfig};
use crate::manager::IndexManager;
use crate::storage;

#[derive(Debug)]
pub struct Session {
    name: String,
    db_path: PathBuf,
    manager: Arc<IndexManager>,

    /// Connection holding the open write transaction
    conn: Connection,
}

impl Session {
    /// Open session `name` in `workspace`, restoring any saved state.
    ///
    /// A session without a config file uses the default engine config and
    /// writes it out so later runs see the same settings.
    pub fn open(workspace: &Path, name: &str) -> AppResult<Self> {
        let engine_config = config::load_config(workspace, name)?;
        let fresh = !config::get_config_path(workspace, name).exists();

        let session = Self::open_with_config(workspace, name, engine_config)?;
        if fresh {
            config::save_config(workspace, name, session.manager.config())?;
        }
        Ok(session)
    }

    /// Open session `name` with an explicit engine config.
    ///
    /// Blocks for up to [`storage::LOCK_TIMEOUT`] while another session on
    /// the same database is open.
    pub fn open_with_config(
        workspace: &Path,
        name: &str,
        engine_config: EngineConfig,
    ) -> AppResult<Self> {
        engine_config.validate()?;
        let db_path = config::get_index_path(workspace, name);

        let conn = storage::lock_store(&db_path)?;
        let snapshot = storage::load_snapshot(&conn)?;
        let manager = IndexManager::from_snapshot(engine_config, snapshot)?;

        tracing::debug!(
            "Opened session '{}' ({})",
            name,
            manager.status().state
        );

        Ok(Self {
            name: name.to_string(),
            db_path,
            manager: Arc::new(manager),
            conn,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The session's engine.
    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Write the engine state to the session database and release the lock.
    pub fn persist(self) -> AppResult<()> {
        storage::write_snapshot(&self.conn, &self.manager.snapshot())?;
        storage::commit(&self.conn)?;

        tracing::debug!("Persisted session '{}' to {:?}", self.name, self.db_path);
        Ok(())
    }
}
