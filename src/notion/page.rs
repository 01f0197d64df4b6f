//! Conversion of a [`BlogPost`] into Notion request payloads.
//!
//! A page is written in two steps, so two payloads are built here:
//!
//! 1. Page creation: the `Name` title property plus the body blocks (a
//!    `heading_1` with the title, then one or more paragraphs).
//! 2. Property update: `Slug`, `Description`, `Published`, `Tags` and `Date`.
//!
//! Notion rejects rich text longer than [`BLOCK_TEXT_LIMIT`] characters in a
//! single block, so long bodies are spread over several paragraph blocks.

use crate::models::BlogPost;
use crate::utils::split_chars;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

/// Longest body that still fits in one paragraph block, in chars.
pub const BLOCK_TEXT_LIMIT: usize = 2000;
/// Size of each paragraph when a body has to be split, in chars.
pub const CHUNK_SIZE: usize = 1999;

/// Both payloads for one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePayload {
    /// `properties` for the create-page call.
    pub title: Value,
    /// `children` for the create-page call.
    pub children: Vec<Value>,
    /// `properties` for the follow-up update-page call.
    pub properties: Value,
}

impl PagePayload {
    pub fn build(post: &BlogPost, description: &str, today: NaiveDate) -> Self {
        Self {
            title: title_property(&post.title),
            children: page_children(&post.title, &post.content),
            properties: page_properties(&post.seo_tags, &post.url_slug, today, description),
        }
    }
}

/// `{"Name": {"title": [...]}}` for page creation.
pub fn title_property(title: &str) -> Value {
    json!({
        "Name": {
            "title": rich_text(title)
        }
    })
}

/// The heading block followed by the body paragraph(s).
pub fn page_children(title: &str, content: &str) -> Vec<Value> {
    let mut children = vec![block("heading_1", title)];

    if content.chars().count() > BLOCK_TEXT_LIMIT {
        info!("chunk triggered");
        children.extend(
            split_chars(content, CHUNK_SIZE)
                .into_iter()
                .map(|chunk| block("paragraph", chunk)),
        );
    } else {
        children.push(block("paragraph", content));
    }
    children
}

/// Properties written after the page exists. `Published` is always true.
pub fn page_properties(tags: &[String], slug: &str, date: NaiveDate, description: &str) -> Value {
    let tags: Vec<Value> = tags.iter().map(|tag| json!({ "name": tag })).collect();

    json!({
        "Slug": {
            "rich_text": rich_text(slug)
        },
        "Published": {
            "checkbox": true
        },
        "Description": {
            "rich_text": rich_text(description)
        },
        "Tags": {
            "multi_select": tags
        },
        "Date": {
            "date": {
                "start": date.format("%Y-%m-%d").to_string()
            }
        }
    })
}

fn rich_text(content: &str) -> Value {
    json!([
        {
            "text": {
                "content": content
            }
        }
    ])
}

fn block(kind: &str, content: &str) -> Value {
    json!({
        "object": "block",
        "type": kind,
        kind: {
            "rich_text": rich_text(content)
        }
    })
}

/// Text of a block built by this module.
#[cfg(test)]
pub(crate) fn block_text(block: &Value) -> &str {
    let kind = block["type"].as_str().unwrap();
    block[kind]["rich_text"][0]["text"]["content"].as_str().unwrap()
}
