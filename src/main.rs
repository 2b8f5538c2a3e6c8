// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::info;

mod cli;
mod config;
mod core;
mod logging;

use crate::cli::Cli;
use crate::config::Config;
use crate::core::api::{ApiSource, CymulateClient};
use crate::core::collector::{environments, Collector};
use crate::core::storage::OutputLayout;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    // `.env` feeds both the log filter and the configuration.
    dotenvy::dotenv().ok();
    let log_path = logging::initialize_logging()?;

    // Configuration problems abort before any request is sent.
    let config = Config::load(&cli).wrap_err("configuration error")?;

    info!(client = %config.client, log = %log_path.display(), "Starting export.");
    info!(
        start = %config.range.start,
        end = %config.range.end,
        default_window = config.default_range,
        "Search window."
    );

    let api: Arc<dyn ApiSource> = Arc::new(CymulateClient::new(&config)?);
    let layout = OutputLayout::new(&config.output_dir, &config.client);

    for &module in &config.modules {
        info!(module = %module, "Extracting module reports...");
        let collector = Arc::new(Collector::new(
            Arc::clone(&api),
            layout.clone(),
            module,
            config.range,
            config.workers,
        ));
        let summary = collector
            .run()
            .await
            .wrap_err_with(|| format!("collection of module {module} failed"))?;
        info!(
            module = %summary.module,
            histories = summary.histories_written,
            unified = summary.unified_reports,
            "Module reports extracted."
        );
    }

    if !config.skip_inventory {
        info!("Collecting environment and agent lists...");
        environments::dump_inventory(api.as_ref(), &layout).await;
    }

    info!(path = %layout.root().join("unified_reports").display(), "Unified reports saved.");
    info!(path = %layout.root().join("history").display(), "Assessment histories saved.");
    Ok(())
}
