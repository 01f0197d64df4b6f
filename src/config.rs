//! Run settings and secrets.
//!
//! Secrets come from the environment (via [`crate::cli::Cli`]); everything else
//! lives in an optional `config.yaml`. Every key in the file is optional and
//! falls back to the values below.
//!
//! ```yaml
//! model: gpt-3.5-turbo
//! word_count: 3000
//! retry_count: 5
//! description: On this day in history
//! openai_api_base: https://api.openai.com/v1
//! notion_api_base: https://api.notion.com/v1
//! notion_version: "2022-06-28"
//! ```

use crate::cli::Cli;
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use tracing::{info, instrument};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_WORD_COUNT: u32 = 3000;
pub const DEFAULT_RETRY_COUNT: usize = 5;
pub const DEFAULT_DESCRIPTION: &str = "On this day in history";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Non-secret knobs for a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Chat model identifier sent with every request.
    pub model: String,
    /// Target length of the generated post, interpolated into the prompt.
    pub word_count: u32,
    /// Maximum number of model calls before giving up.
    pub retry_count: usize,
    /// Fixed text written to the page's `Description` property.
    pub description: String,
    pub openai_api_base: String,
    pub notion_api_base: String,
    pub notion_version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            word_count: DEFAULT_WORD_COUNT,
            retry_count: DEFAULT_RETRY_COUNT,
            description: DEFAULT_DESCRIPTION.to_string(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            notion_api_base: DEFAULT_NOTION_API_BASE.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or return the defaults when no path is given.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to `config.yaml`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid settings YAML.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = tokio::fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&raw)?;
        info!(path, model = %settings.model, "Loaded settings");
        Ok(settings)
    }

    /// Parse settings from YAML text.
    ///
    /// # Arguments
    ///
    /// * `raw` - YAML mapping; every key is optional, unknown keys are rejected
    ///
    /// # Returns
    ///
    /// The parsed settings, with defaults for missing keys. Blank input gives
    /// [`Settings::default`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let settings = Settings::from_yaml("model: gpt-4o\nretry_count: 3\n")?;
    /// assert_eq!(settings.word_count, 3000);
    /// ```
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes to `()`, not an empty mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

/// The four credentials a run needs. Read once at startup, never validated.
#[derive(Clone, Default)]
pub struct Secrets {
    pub openai_api_key: String,
    pub openai_organization_id: String,
    pub notion_token: String,
    pub database_id: String,
}

impl Secrets {
    /// Copy the secrets out of the parsed CLI; unset values become empty strings.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            openai_api_key: cli.openai_api_key.clone().unwrap_or_default(),
            openai_organization_id: cli.openai_organization_id.clone().unwrap_or_default(),
            notion_token: cli.notion_token.clone().unwrap_or_default(),
            database_id: cli.database_id.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("openai_api_key", &redacted(&self.openai_api_key))
            .field("openai_organization_id", &redacted(&self.openai_organization_id))
            .field("notion_token", &redacted(&self.notion_token))
            .field("database_id", &self.database_id)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "<unset>" } else { "<redacted>" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults_match_constants() {
        let settings = Settings::default();
        assert_eq!(settings.model, "gpt-3.5-turbo");
        assert_eq!(settings.word_count, 3000);
        assert_eq!(settings.retry_count, 5);
        assert_eq!(settings.description, "On this day in history");
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let settings = Settings::from_yaml("model: gpt-4o\nword_count: 800\n").unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.word_count, 800);
        assert_eq!(settings.retry_count, DEFAULT_RETRY_COUNT);
        assert_eq!(settings.notion_api_base, DEFAULT_NOTION_API_BASE);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Settings::from_yaml("modle: gpt-4o\n").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retry_count: 2").unwrap();
        writeln!(file, "description: Today in history").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = Settings::load(Some(&path)).await.unwrap();
        assert_eq!(settings.retry_count, 2);
        assert_eq!(settings.description, "Today in history");
    }

    #[tokio::test]
    async fn test_load_without_path() {
        assert_eq!(Settings::load(None).await.unwrap(), Settings::default());
    }

    #[test]
    fn test_secrets_missing_values_become_empty() {
        let cli = Cli::parse_from(["on_this_day", "--database-id", "db-1"]);
        let secrets = Secrets {
            openai_api_key: String::new(),
            ..Secrets::from_cli(&cli)
        };
        assert_eq!(secrets.database_id, "db-1");
        assert_eq!(secrets.openai_api_key, "");
    }

    #[test]
    fn test_secrets_debug_is_redacted() {
        let secrets = Secrets {
            openai_api_key: "sk-live".to_string(),
            notion_token: "secret_x".to_string(),
            ..Secrets::default()
        };
        let shown = format!("{secrets:?}");
        assert!(!shown.contains("sk-live"));
        assert!(!shown.contains("secret_x"));
        assert!(shown.contains("<unset>"));
    }
}
