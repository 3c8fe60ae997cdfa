//! Index command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;

use super::{print_json, with_session, Persist};
use crate::documents::read_documents;

/// Embed and index documents
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Index this JSON Lines file instead of the upload buffer
    #[arg(short, long)]
    pub file: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing index command for session '{}'", config.session);

        let documents = self.file.as_deref().map(read_documents).transpose()?;

        let (indexed, total) = with_session(config, Persist::Yes, move |manager| {
            let indexed = manager.index(documents)?;
            Ok((indexed, manager.status().documents_indexed))
        })
        .await?;

        if self.json {
            print_json(&serde_json::json!({
                "indexed": indexed,
                "documentsIndexed": total,
            }))
        } else {
            println!("Indexed {} documents ({} total)", indexed, total);
            Ok(())
        }
    }
}
