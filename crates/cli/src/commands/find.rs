//! Find command handler.

use anyhow::{bail, Result};
use clap::{ArgGroup, Args};
use simserver_core::config::AppConfig;
use simserver_index::{Document, FindOptions, Query};

use super::{print_json, with_session, Persist};
use crate::documents::read_documents;

/// Find documents similar to an indexed id or ad-hoc text
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("query").required(true).args(["id", "text", "doc"])))]
pub struct FindCommand {
    /// Id of an indexed document
    pub id: Option<String>,

    /// Query with ad-hoc text
    #[arg(long)]
    pub text: Option<String>,

    /// Query with the first document of a JSON Lines file (`-` for stdin)
    #[arg(long)]
    pub doc: Option<String>,

    /// Drop results scoring below this
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub min_score: f32,

    /// Return at most this many results
    #[arg(short = 'n', long)]
    pub max_results: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl FindCommand {
    fn query(&self) -> Result<Query> {
        if let Some(id) = &self.id {
            return Ok(Query::from(id.clone()));
        }
        if let Some(text) = &self.text {
            return Ok(Query::from(Document::anonymous(text.clone())));
        }
        if let Some(source) = &self.doc {
            return match read_documents(source)?.into_iter().next() {
                Some(doc) => Ok(Query::from(doc)),
                None => bail!("No document found in {}", source),
            };
        }
        bail!("Give an id, --text or --doc")
    }

    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing find command for session '{}'", config.session);

        let query = self.query()?;
        let mut options = FindOptions::default().with_min_score(self.min_score);
        if let Some(max) = self.max_results {
            options = options.with_max_results(max);
        }

        let results =
            with_session(config, Persist::No, move |manager| manager.find_similar(query, options))
                .await?;

        if self.json {
            return print_json(&serde_json::to_value(&results)?);
        }

        if results.is_empty() {
            println!("No similar documents found");
        } else {
            for neighbor in &results {
                println!("{:.6}  {}", neighbor.score, neighbor.id);
            }
        }
        Ok(())
    }
}
