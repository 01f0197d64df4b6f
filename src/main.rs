//! # On This Day
//!
//! A scheduled job that asks an OpenAI chat model for an "on this day in
//! history" blog post and publishes it as a new page in a Notion database.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=... OPENAI_ORGANIZATION_ID=... NOTION_TOKEN=... DATABASE_ID=... on_this_day
//! ```
//!
//! ## Architecture
//!
//! Each run is one linear pipeline:
//! 1. **Prompt**: Build the request for today's date
//! 2. **Ask**: Call the model until its reply parses (at most 5 times)
//! 3. **Build**: Turn the post into Notion create/update payloads
//! 4. **Publish**: Create the page, then set its properties
//!
//! The process exits non-zero when no usable reply was obtained or a Notion
//! write failed.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod models;
mod notion;
mod parser;
mod pipeline;
mod prompt;
mod utils;

use api::OpenAiChat;
use cli::Cli;
use config::{Secrets, Settings};
use notion::NotionClient;
use utils::utc_timestamp;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // Loaded first so both RUST_LOG and clap's env fallbacks see `.env`.
    let dotenv_path = dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?dotenv_path, config = ?args.config, dry_run = args.dry_run, "Parsed CLI arguments");

    if let Some(notice) = args.trigger_notice() {
        info!("{notice}");
    }

    let start_time = std::time::Instant::now();
    info!("starting now");

    let settings = Settings::load(args.config.as_deref()).await?;
    let secrets = Secrets::from_cli(&args);
    debug!(?secrets, "Loaded secrets");

    let model = OpenAiChat::new(&settings, &secrets)?;
    let store = NotionClient::new(&settings, &secrets)?;
    let today = Local::now().date_naive();

    let outcome = pipeline::run(&settings, &secrets, model, store, today, args.dry_run).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        "timer trigger function ran at {}",
        utc_timestamp()
    );

    match outcome {
        Ok(outcome) if outcome.is_failure() => Ok(ExitCode::FAILURE),
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(error = %e, "Run failed");
            Err(e)
        }
    }
}
