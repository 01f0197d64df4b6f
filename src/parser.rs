//! Extraction of a [`BlogPost`] from the model's free-form reply.
//!
//! The model is asked for JSON but is not consistent about it: it renames keys
//! between runs, appends "Note: ..." commentary after the object, wraps the
//! object in code fences, and puts raw newlines inside string values. This
//! module cleans the reply up, decodes it into an untyped [`Value`], and then
//! looks each logical field up under an ordered list of known key names.

use crate::models::BlogPost;
use crate::utils::{looks_truncated, truncate_for_log};
use itertools::Itertools;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use tracing::{debug, error, instrument, warn};

/// Everything from the first occurrence of this phrase onward is commentary.
pub const COMMENTARY_MARKER: &str = "Note:";

const RAW_REPLY_LOG_LIMIT: usize = 1000;

/// The four logical fields of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Content,
    SeoTags,
    UrlSlug,
}

impl Field {
    /// Accepted key names, tried in order; the first one present wins.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Content => &["content", "blog_post", "post", "Blog_post", "blogPost"],
            Field::SeoTags => &["seo_tags", "tags", "SEO_tags", "seoTags"],
            Field::UrlSlug => &["url_slug", "slug", "URL_slug", "seoFriendlySlug"],
            Field::Title => &["title", "blog_post_title", "Title", "blogTitle"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Content => "content",
            Field::SeoTags => "seo_tags",
            Field::UrlSlug => "url_slug",
        }
    }
}

/// Why a reply could not be turned into a [`BlogPost`].
#[derive(Debug)]
pub enum ParseError {
    /// The cleaned reply is not valid JSON.
    Json(serde_json::Error),
    /// The reply decoded, but not to a JSON object.
    NotAnObject,
    /// None of the field's aliases is present (or all are `null`).
    MissingField(Field),
    /// The field was found but has an unusable shape.
    InvalidField(Field, &'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Json(e) => write!(f, "reply is not valid JSON: {e}"),
            ParseError::NotAnObject => write!(f, "reply JSON is not an object"),
            ParseError::MissingField(field) => write!(
                f,
                "couldn't find {} (tried {})",
                field.name(),
                field.aliases().join(", ")
            ),
            ParseError::InvalidField(field, expected) => {
                write!(f, "{} must be {}", field.name(), expected)
            }
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Json(e)
    }
}

/// Parse a reply, logging and swallowing any failure.
///
/// `None` means "try again"; the caller never sees why.
#[instrument(level = "debug", skip_all, fields(bytes = raw.len()))]
pub fn try_parse_reply(raw: &str) -> Option<BlogPost> {
    match parse_reply(raw) {
        Ok(post) => {
            debug!(title = %post.title, tags = post.seo_tags.len(), "Parsed model reply");
            Some(post)
        }
        Err(e) => {
            if let ParseError::Json(ref json_err) = e {
                if looks_truncated(json_err) {
                    warn!(error = %json_err, "Reply JSON ends early; model output was probably cut off");
                }
            }
            error!(error = %e, "Failed to parse response");
            error!(raw_reply = %truncate_for_log(raw, RAW_REPLY_LOG_LIMIT), "Offending model reply");
            None
        }
    }
}

/// Parse a reply into a [`BlogPost`], reporting why it failed.
pub fn parse_reply(raw: &str) -> Result<BlogPost, ParseError> {
    let object = decode_object(strip_commentary(raw))?;

    // All four are resolved before validating shapes so a reply missing
    // several fields reports the first missing one in field order.
    let content = lookup(&object, Field::Content)?;
    let tags = lookup(&object, Field::SeoTags)?;
    let slug = lookup(&object, Field::UrlSlug)?;
    let title = lookup(&object, Field::Title)?;

    Ok(BlogPost {
        title: as_text(title, Field::Title)?,
        content: as_text(content, Field::Content)?,
        seo_tags: as_tags(tags)?,
        url_slug: as_text(slug, Field::UrlSlug)?,
    })
}

/// Drop everything from the first [`COMMENTARY_MARKER`] onward.
pub fn strip_commentary(raw: &str) -> &str {
    match raw.find(COMMENTARY_MARKER) {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Decode `text` as a JSON object, leniently.
///
/// Raw control characters inside strings are escaped first. If the whole text
/// still does not decode, each balanced `{...}` span is tried in order, which
/// covers code fences and chatter before or after the object.
fn decode_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    let value = match serde_json::from_str::<Value>(&escape_control_chars_in_strings(text)) {
        Ok(value) => value,
        Err(whole_err) => embedded_object(text).ok_or(whole_err)?,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

/// The first balanced `{...}` span of `text` that decodes to a JSON object.
///
/// Spans are located in the raw text and escaped one at a time, so quotes in
/// surrounding chatter cannot shift the escaper's notion of what is a string.
fn embedded_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let span = balanced_object_span(&text[start..])?;
        serde_json::from_str::<Value>(&escape_control_chars_in_strings(span))
            .ok()
            .filter(Value::is_object)
    })
}

/// `text` up to the `}` that closes its leading `{`, skipping braces in strings.
fn balanced_object_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Escape control characters that appear inside JSON string literals.
///
/// Strict JSON forbids a literal newline inside a string; models emit them
/// anyway for multi-paragraph content. Whitespace between tokens is untouched.
pub fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn lookup(object: &Map<String, Value>, field: Field) -> Result<&Value, ParseError> {
    field
        .aliases()
        .iter()
        .find_map(|name| object.get(*name).filter(|v| !v.is_null()))
        .ok_or(ParseError::MissingField(field))
}

fn as_text(value: &Value, field: Field) -> Result<String, ParseError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ParseError::InvalidField(field, "a string"))
}

fn as_tags(value: &Value) -> Result<Vec<String>, ParseError> {
    const EXPECTED: &str = "a list of strings or a comma-separated string";

    let raw: Vec<&str> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or(ParseError::InvalidField(Field::SeoTags, EXPECTED)))
            .collect::<Result<_, _>>()?,
        Value::String(s) => s.split(',').collect(),
        _ => return Err(ParseError::InvalidField(Field::SeoTags, EXPECTED)),
    };

    Ok(raw
        .into_iter()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .unique()
        .map(str::to_string)
        .collect())
}
