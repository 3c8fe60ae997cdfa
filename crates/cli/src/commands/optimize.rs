//! Optimize command handler.

use anyhow::Result;
use clap::Args;
use simserver_core::config::AppConfig;
use std::time::Instant;

use super::{with_session, Persist};

/// Precompute neighbour lists for every indexed document
#[derive(Args, Debug)]
pub struct OptimizeCommand {}

impl OptimizeCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Executing optimize command for session '{}'", config.session);

        let start = Instant::now();
        let (lists, cap) = with_session(config, Persist::Yes, |manager| {
            manager.optimize();
            Ok((manager.status().cached_lists, manager.config().neighbor_cap))
        })
        .await?;

        println!(
            "Cached top-{} neighbours for {} documents in {:.2}s",
            cap,
            lists,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
