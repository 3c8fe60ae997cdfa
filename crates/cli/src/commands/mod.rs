//! Command handlers for the simserver CLI.
//!
//! Every command opens the configured session on a blocking worker, runs
//! one engine operation and, for mutations, persists the session. The
//! session's database stays locked for the whole command, so concurrent
//! runs against one session are serialized.

pub mod buffer;
pub mod debug_model;
pub mod delete;
pub mod drop;
pub mod find;
pub mod index;
pub mod optimize;
pub mod status;
pub mod train;

// Re-export command types for convenience
pub use buffer::BufferCommand;
pub use debug_model::DebugModelCommand;
pub use delete::DeleteCommand;
pub use drop::DropCommand;
pub use find::FindCommand;
pub use index::IndexCommand;
pub use optimize::OptimizeCommand;
pub use status::StatusCommand;
pub use train::TrainCommand;

use anyhow::{Context, Result};
use serde_json::Value;
use simserver_core::{config::AppConfig, AppResult};
use simserver_index::{IndexManager, Session};

/// Whether a command writes the session back after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    Yes,
    No,
}

/// Open the configured session and run `op` against its engine.
pub async fn with_session<T, F>(config: &AppConfig, persist: Persist, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&IndexManager) -> AppResult<T> + Send + 'static,
{
    let workspace = config.workspace.clone();
    let name = config.session.clone();

    let result = tokio::task::spawn_blocking(move || -> Result<T> {
        let session = Session::open(&workspace, &name)
            .with_context(|| format!("Failed to open session '{}'", name))?;

        let value = op(session.manager().as_ref())?;

        if persist == Persist::Yes {
            session
                .persist()
                .with_context(|| format!("Failed to save session '{}'", name))?;
        }
        Ok(value)
    })
    .await
    .context("Session worker stopped unexpectedly")?;

    result
}

/// Print a JSON value the way every `--json` flag does.
pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
