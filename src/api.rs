//! LLM API interaction with a bounded parse-and-retry loop.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`OpenAiChat`]: Chat-completions client over `reqwest`
//! - [`ParseRetry`]: Asks through any `AskAsync` until the reply parses
//!
//! # Retry Strategy
//!
//! A fixed number of attempts (5 by default) with no delay between them.
//! Transport errors and unusable replies are not told apart: each one costs
//! exactly one attempt.

use crate::config::{Secrets, Settings};
use crate::models::{BlogPost, ChatMessage, ChatRequest, ChatResponse};
use crate::parser::try_parse_reply;
use crate::utils::endpoint;
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Trait for async LLM interaction.
///
/// Implementors send a prompt to a model and hand back its raw reply. The
/// retry wrapper and the tests only depend on this trait.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send `text` as a single user message and return the model's reply.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// OpenAI chat-completions client.
///
/// Sends one user message per call and returns the first choice's text. The
/// organization header is only sent when an organization id is configured.
pub struct OpenAiChat {
    client: Client,
    url: Url,
    model: String,
    api_key: String,
    organization_id: String,
}

impl OpenAiChat {
    /// Create a client for `settings.model` at `settings.openai_api_base`.
    ///
    /// # Arguments
    ///
    /// * `settings` - Model name and API base URL
    /// * `secrets` - API key and organization id (empty values are sent as-is)
    ///
    /// # Returns
    ///
    /// The client, or an error if the API base is not a valid URL.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let chat = OpenAiChat::new(&Settings::default(), &secrets)?;
    /// let reply = chat.ask("Tell me about Oct 17").await?;
    /// ```
    pub fn new(settings: &Settings, secrets: &Secrets) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            client: Client::new(),
            url: endpoint(&settings.openai_api_base, "chat/completions")?,
            model: settings.model.clone(),
            api_key: secrets.openai_api_key.clone(),
            organization_id: secrets.openai_organization_id.clone(),
        })
    }
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("url", &self.url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

impl AskAsync for OpenAiChat {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user(text)],
        };

        let mut request = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&body);
        if !self.organization_id.is_empty() {
            request = request.header("OpenAI-Organization", &self.organization_id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                status = status.as_u16(),
                "API call failed"
            );
            return Err(format!("OpenAI API {}: {}", status.as_u16(), body).into());
        }

        let reply = response.json::<ChatResponse>().await?.first_content();
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = reply.len(),
            "Model replied"
        );
        Ok(reply)
    }
}

/// Asks the model until a reply parses into a [`BlogPost`].
///
/// Unlike a transport-level retry, success here means "the reply contained all
/// four fields", so a well-formed HTTP response can still consume an attempt.
pub struct ParseRetry<T> {
    inner: T,
    max_attempts: usize,
}

impl<T> ParseRetry<T>
where
    T: AskAsync<Response = String>,
{
    /// Wrap an existing [`AskAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The model client to ask
    /// * `max_attempts` - Total number of calls allowed (5 in production);
    ///   zero means the model is never called
    ///
    /// # Example
    ///
    /// ```ignore
    /// let retry = ParseRetry::new(OpenAiChat::new(&settings, &secrets)?, 5);
    /// let post = retry.ask_for_post(&prompt).await;
    /// ```
    pub fn new(inner: T, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts,
        }
    }

    /// Return the first reply that parses, or `None` once every attempt failed.
    ///
    /// # Arguments
    ///
    /// * `prompt` - Sent unchanged on every attempt
    ///
    /// # Returns
    ///
    /// The first [`BlogPost`] parsed from a reply. A failed call and an
    /// unusable reply both use up one attempt; there is no delay between them.
    #[instrument(level = "info", skip_all, fields(max = self.max_attempts))]
    pub async fn ask_for_post(&self, prompt: &str) -> Option<BlogPost> {
        let total_t0 = Instant::now();

        for attempt in 1..=self.max_attempts {
            match self.inner.ask(prompt).await {
                Ok(reply) => {
                    if let Some(post) = try_parse_reply(&reply) {
                        info!(attempt, title = %post.title, "Model reply accepted");
                        return Some(post);
                    }
                    warn!(attempt, max = self.max_attempts, "Model reply unusable; asking again");
                }
                Err(e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "Model call failed; asking again");
                }
            }
        }

        error!(
            max = self.max_attempts,
            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
            "ask_for_post exhausted retries"
        );
        None
    }
}

impl<T> fmt::Debug for ParseRetry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseRetry")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned replies in order and counts calls.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedModel {
        replies: RefCell<VecDeque<Result<String, String>>>,
        pub(crate) calls: RefCell<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: RefCell::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl AskAsync for &ScriptedModel {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.calls.borrow_mut().push(text.to_string());
            match self.replies.borrow_mut().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(e.into()),
                None => Err("script exhausted".into()),
            }
        }
    }

    const GOOD: &str = r#"{"title": "Event X", "tags": ["history"], "slug": "event-x", "content": "short text"}"#;
    const NO_CONTENT: &str = r#"{"title": "Event X", "tags": ["history"], "slug": "event-x"}"#;

    #[tokio::test]
    async fn test_first_reply_accepted() {
        let model = ScriptedModel::new(vec![Ok(GOOD)]);
        let post = ParseRetry::new(&model, 5).ask_for_post("prompt").await.unwrap();

        assert_eq!(post.title, "Event X");
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.calls.borrow()[0], "prompt");
    }

    #[tokio::test]
    async fn test_retries_until_parse_succeeds() {
        let model = ScriptedModel::new(vec![
            Ok("not json"),
            Err("connection reset"),
            Ok(NO_CONTENT),
            Ok(GOOD),
            Ok(GOOD),
        ]);
        let post = ParseRetry::new(&model, 5).ask_for_post("prompt").await;

        assert!(post.is_some());
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none_after_exactly_max_attempts() {
        let model = ScriptedModel::new(vec![Ok(NO_CONTENT); 6]);
        let post = ParseRetry::new(&model, 5).ask_for_post("prompt").await;

        assert!(post.is_none());
        assert_eq!(model.call_count(), 5);
    }

    #[tokio::test]
    async fn test_transport_errors_consume_attempts() {
        let model = ScriptedModel::new(vec![Err("timeout"), Err("401"), Err("500")]);
        let post = ParseRetry::new(&model, 3).ask_for_post("prompt").await;

        assert!(post.is_none());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_never_calls_model() {
        let model = ScriptedModel::new(vec![Ok(GOOD)]);
        assert!(ParseRetry::new(&model, 0).ask_for_post("prompt").await.is_none());
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_openai_chat_endpoint() {
        let chat = OpenAiChat::new(&Settings::default(), &Secrets::default()).unwrap();
        assert_eq!(chat.url.as_str(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(chat.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_openai_chat_bad_base_url() {
        let settings = Settings {
            openai_api_base: "::nonsense".to_string(),
            ..Settings::default()
        };
        assert!(OpenAiChat::new(&settings, &Secrets::default()).is_err());
    }
}
