//! Publishing to a Notion database.
//!
//! # Submodules
//!
//! - [`page`]: Builds the create-page and update-page payloads from a post
//! - [`client`]: The [`PageStore`] trait and its `reqwest` implementation

pub mod client;
pub mod page;

pub use client::{NotionClient, PageStore};
pub use page::PagePayload;
