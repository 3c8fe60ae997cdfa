//! Status command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;

use super::{print_json, with_session, Persist};

/// Show the session's engine status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing status command for session '{}'", config.session);

        let status = with_session(config, Persist::No, |manager| Ok(manager.status())).await?;

        if self.json {
            let mut output = serde_json::to_value(&status)?;
            output["session"] = serde_json::json!(config.session);
            return print_json(&output);
        }

        println!("Session:   {}", config.session);
        println!("State:     {}", status.state);
        println!(
            "Model:     {}",
            match (&status.model_method, status.num_features) {
                (Some(method), Some(features)) => format!("{} ({} features)", method, features),
                _ => "none".to_string(),
            }
        );
        println!("Indexed:   {}", status.documents_indexed);
        println!("Buffered:  {}", status.documents_buffered);
        println!(
            "Cache:     {}",
            if status.cache_valid {
                format!("valid ({} lists)", status.cached_lists)
            } else {
                "not built".to_string()
            }
        );
        if let Some(at) = status.last_trained_at {
            println!("Trained:   {}", at.to_rfc3339());
        }
        if let Some(at) = status.last_optimized_at {
            println!("Optimized: {}", at.to_rfc3339());
        }

        Ok(())
    }
}
