//! Command-line interface definitions for On This Day.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The four secrets are normally supplied through environment variables (or a
//! `.env` file loaded at startup); flags exist so a run can be reproduced by hand.

use clap::Parser;

/// Logged at startup when the scheduler reports a late trigger.
pub const PAST_DUE_NOTICE: &str = "The timer is past due!";

/// Command-line arguments for the On This Day publisher.
///
/// Secrets are deliberately optional: a missing value is sent as an empty
/// credential and surfaces as an authentication failure from the remote API.
///
/// # Examples
///
/// ```sh
/// # Scheduled run, everything from the environment
/// on_this_day
///
/// # Scheduler fired late, custom settings file
/// on_this_day --past-due --config ./config.yaml
///
/// # Ask the model and show the Notion payloads without writing anything
/// on_this_day --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml settings file
    #[arg(short, long)]
    pub config: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI organization id
    #[arg(long, env = "OPENAI_ORGANIZATION_ID", hide_env_values = true)]
    pub openai_organization_id: Option<String>,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Notion database the page is created in
    #[arg(long, env = "DATABASE_ID", hide_env_values = true)]
    pub database_id: Option<String>,

    /// Set by the scheduler when the timer fired later than planned
    #[arg(long, env = "TIMER_PAST_DUE")]
    pub past_due: bool,

    /// Ask the model and log the page payloads without writing to Notion
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// The message to log about how this run was triggered, if any.
    ///
    /// # Returns
    ///
    /// [`PAST_DUE_NOTICE`] when `--past-due` (or `TIMER_PAST_DUE`) is set,
    /// otherwise `None`.
    pub fn trigger_notice(&self) -> Option<&'static str> {
        self.past_due.then_some(PAST_DUE_NOTICE)
    }
}
