//! Train command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;
use std::time::Instant;

use super::{print_json, with_session, Persist};
use crate::documents::read_documents;

/// Train a model on the upload buffer or a corpus file
#[derive(Args, Debug)]
pub struct TrainCommand {
    /// Train on this JSON Lines file instead of the upload buffer
    #[arg(long)]
    pub corpus: Option<String>,

    /// Training method (lsi, tfidf, logentropy); defaults to the session config
    #[arg(short, long)]
    pub method: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TrainCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing train command for session '{}'", config.session);

        let corpus = self.corpus.as_deref().map(read_documents).transpose()?;
        let method = self.method.clone();
        let start = Instant::now();

        let summary = with_session(config, Persist::Yes, move |manager| {
            manager.train(corpus, method.as_deref())?;
            Ok(manager.debug_model()?.summary())
        })
        .await?;

        let duration_secs = start.elapsed().as_secs_f64();

        if self.json {
            let mut output = serde_json::to_value(&summary)?;
            output["durationSecs"] = serde_json::json!(duration_secs);
            print_json(&output)
        } else {
            println!(
                "Trained {} model on {} documents ({} terms, {} features) in {:.2}s",
                summary.method,
                summary.num_training_docs,
                summary.vocabulary_size,
                summary.num_features,
                duration_secs
            );
            Ok(())
        }
    }
}
