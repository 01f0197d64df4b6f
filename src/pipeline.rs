//! One publishing run, start to finish.
//!
//! ```text
//! Start -> Configured -> Prompted -> ModelResult --ok--> PageCreated -> PropertiesUpdated -> Done
//!                                               \--none--> Aborted
//! ```
//!
//! Nothing is retried once the model result is in. A failed Notion write ends
//! the run with an error; a page that was already created is left as is.

use crate::api::{AskAsync, ParseRetry};
use crate::config::{Secrets, Settings};
use crate::notion::{PagePayload, PageStore};
use crate::prompt::build_prompt;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt;
use tracing::{debug, error, info, instrument};

/// Where a run currently is. Only used for logging transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Configured,
    Prompted,
    ModelResult,
    PageCreated,
    PropertiesUpdated,
    Done,
    Aborted,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Configured => "configured",
            RunStage::Prompted => "prompted",
            RunStage::ModelResult => "model_result",
            RunStage::PageCreated => "page_created",
            RunStage::PropertiesUpdated => "properties_updated",
            RunStage::Done => "done",
            RunStage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// How a run that did not error ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The page was created and its properties set.
    Published { page_id: String },
    /// Every model attempt failed; Notion was never contacted.
    NoModelResult,
    /// The post was generated but, as requested, not written.
    DryRun,
}

impl RunOutcome {
    /// Whether the process should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::NoModelResult)
    }
}

fn enter(stage: RunStage) {
    debug!(%stage, "Run stage");
}

/// Generate today's post and publish it.
///
/// `model` is asked up to `settings.retry_count` times. When `dry_run` is set
/// the payloads are logged instead of written.
#[instrument(level = "info", skip_all, fields(%today, dry_run))]
pub async fn run<M, S>(
    settings: &Settings,
    secrets: &Secrets,
    model: M,
    store: S,
    today: NaiveDate,
    dry_run: bool,
) -> Result<RunOutcome, Box<dyn Error>>
where
    M: AskAsync<Response = String>,
    S: PageStore,
{
    enter(RunStage::Configured);

    let prompt = build_prompt(today, settings.word_count);
    enter(RunStage::Prompted);

    let post = ParseRetry::new(model, settings.retry_count)
        .ask_for_post(&prompt)
        .await;
    enter(RunStage::ModelResult);

    let Some(post) = post else {
        info!("no resp from openai");
        enter(RunStage::Aborted);
        return Ok(RunOutcome::NoModelResult);
    };
    info!("openai success");

    let payload = PagePayload::build(&post, &settings.description, today);

    if dry_run {
        info!(
            title = %post.title,
            blocks = payload.children.len(),
            payload = %serde_json::to_string_pretty(&payload)?,
            "Dry run; skipping Notion writes"
        );
        enter(RunStage::Done);
        return Ok(RunOutcome::DryRun);
    }

    let page_id = store
        .create_page(&secrets.database_id, &payload.title, &payload.children)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to create Notion page"))?;
    enter(RunStage::PageCreated);
    info!("page created with ID {page_id}");

    store
        .update_page(&page_id, &payload.properties)
        .await
        .inspect_err(|e| {
            error!(
                %page_id,
                error = %e,
                "Failed to update page properties; page was created but is not published"
            )
        })?;
    enter(RunStage::PropertiesUpdated);
    info!("page updated");

    enter(RunStage::Done);
    info!("finished");
    Ok(RunOutcome::Published { page_id })
}
