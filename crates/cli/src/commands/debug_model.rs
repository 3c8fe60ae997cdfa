//! Debug-model command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;

use super::{print_json, with_session, Persist};

/// Describe the active model
#[derive(Args, Debug)]
pub struct DebugModelCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DebugModelCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing debug-model command for session '{}'", config.session);

        let summary = with_session(config, Persist::No, |manager| {
            Ok(manager.debug_model()?.summary())
        })
        .await?;

        if self.json {
            return print_json(&serde_json::to_value(&summary)?);
        }

        println!("Method:      {}", summary.method);
        println!("Features:    {}", summary.num_features);
        println!("Vocabulary:  {}", summary.vocabulary_size);
        println!("Trained on:  {} documents", summary.num_training_docs);
        println!("Trained at:  {}", summary.trained_at.to_rfc3339());
        if let Some(values) = &summary.singular_values {
            let shown: Vec<String> = values.iter().take(10).map(|v| format!("{:.4}", v)).collect();
            println!("Singular values (top {}): {}", shown.len(), shown.join(", "));
        }
        Ok(())
    }
}
