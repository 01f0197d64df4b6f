//! Data models for the model exchange and the parsed blog post.
//!
//! This module defines the core data structures used throughout the application:
//! - [`BlogPost`]: The four fields extracted from the model's reply
//! - [`ChatRequest`] / [`ChatResponse`]: The chat-completions wire shapes
//! - [`CreatedPage`]: The part of a Notion page-creation response we keep

use serde::{Deserialize, Serialize};

/// A validated blog post, ready to be turned into Notion payloads.
///
/// Produced only when all four logical fields were found in the model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogPost {
    /// The post title, also used as the page's heading block.
    pub title: String,
    /// The post body. May exceed Notion's per-block text limit.
    pub content: String,
    /// SEO tags, normalized rather than passed through: trimmed, empty
    /// entries dropped and exact duplicates removed, keeping first-seen order.
    pub seo_tags: Vec<String>,
    /// SEO friendly URL slug.
    pub url_slug: String,
}

/// A single chat message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `POST /chat/completions` request.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
}

/// The subset of a chat-completions response we read.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatReplyMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, or an empty string when the model sent none.
    pub fn first_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

/// The part of Notion's page object returned from create/update that we use.
#[derive(Debug, Deserialize)]
pub struct CreatedPage {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}
