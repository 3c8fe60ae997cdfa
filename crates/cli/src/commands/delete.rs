//! Delete command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;

use super::{print_json, with_session, Persist};

/// Remove documents from the index
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Ids to remove; unknown ids are ignored
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing delete command for session '{}'", config.session);

        let ids = self.ids.clone();
        let removed = with_session(config, Persist::Yes, move |manager| Ok(manager.delete(&ids)))
            .await?;

        if self.json {
            print_json(&serde_json::json!({
                "requested": self.ids.len(),
                "removed": removed,
            }))
        } else {
            println!("Removed {} of {} documents", removed, self.ids.len());
            Ok(())
        }
    }
}
