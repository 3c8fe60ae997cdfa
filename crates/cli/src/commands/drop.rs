//! Drop command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;

use super::{with_session, Persist};

/// Remove all indexed documents
#[derive(Args, Debug)]
pub struct DropCommand {
    /// Keep the trained model
    #[arg(long)]
    pub keep_model: bool,
}

impl DropCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing drop command for session '{}'", config.session);

        let keep_model = self.keep_model;
        with_session(config, Persist::Yes, move |manager| {
            manager.drop_index(keep_model);
            Ok(())
        })
        .await?;

        if keep_model {
            println!("Dropped index of session '{}' (model kept)", config.session);
        } else {
            println!("Dropped index and model of session '{}'", config.session);
        }
        Ok(())
    }
}
