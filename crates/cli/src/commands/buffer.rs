//! Buffer command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;

use super::{print_json, with_session, Persist};
use crate::documents::read_documents;

/// Add documents to the upload buffer
#[derive(Args, Debug)]
pub struct BufferCommand {
    /// JSON Lines file of documents (`-` for stdin)
    pub file: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BufferCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing buffer command for session '{}'", config.session);

        let documents = read_documents(&self.file)?;
        let added = documents.len();

        let waiting = with_session(config, Persist::Yes, move |manager| {
            manager.buffer(documents);
            Ok(manager.status().documents_buffered)
        })
        .await?;

        if self.json {
            print_json(&serde_json::json!({
                "added": added,
                "buffered": waiting,
            }))
        } else {
            println!("Buffered {} documents ({} waiting)", added, waiting);
            Ok(())
        }
    }
}
