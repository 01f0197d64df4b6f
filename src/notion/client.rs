//! Notion pages API client.

use crate::config::{Secrets, Settings};
use crate::models::CreatedPage;
use crate::utils::{endpoint, truncate_for_log};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use std::error::Error;
use std::fmt;
use tracing::{debug, instrument, warn};
use url::Url;

/// The two document-store writes a run performs.
///
/// Implemented by [`NotionClient`] for real runs; tests substitute an
/// in-memory store to observe the calls.
pub trait PageStore {
    /// Create a page in `database_id` and return the new page's id.
    async fn create_page(
        &self,
        database_id: &str,
        properties: &Value,
        children: &[Value],
    ) -> Result<String, Box<dyn Error>>;

    /// Overwrite the given properties on an existing page.
    async fn update_page(&self, page_id: &str, properties: &Value) -> Result<(), Box<dyn Error>>;
}

/// Notion pages API client authenticated with an integration token.
pub struct NotionClient {
    client: Client,
    base: String,
    token: String,
    version: String,
}

impl NotionClient {
    /// Create a client for `settings.notion_api_base`.
    ///
    /// # Arguments
    ///
    /// * `settings` - API base URL and `Notion-Version` header value
    /// * `secrets` - Integration token (an empty token is sent as-is)
    ///
    /// # Returns
    ///
    /// The client, or an error if the API base is not a valid URL.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = NotionClient::new(&Settings::default(), &secrets)?;
    /// let page_id = store.create_page(&secrets.database_id, &title, &children).await?;
    /// ```
    pub fn new(settings: &Settings, secrets: &Secrets) -> Result<Self, Box<dyn Error>> {
        // Fail on a bad base URL at startup rather than on the first write.
        endpoint(&settings.notion_api_base, "pages")?;
        Ok(Self {
            client: Client::new(),
            base: settings.notion_api_base.clone(),
            token: secrets.notion_token.clone(),
            version: settings.notion_version.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, Box<dyn Error>> {
        Ok(endpoint(&self.base, path)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
    }
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base", &self.base)
            .field("version", &self.version)
            .finish()
    }
}

/// Turn a non-2xx response into an error carrying Notion's status and body.
async fn check_status(response: Response, what: &str) -> Result<Response, Box<dyn Error>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %truncate_for_log(&body, 500), "Notion {what} failed");
    Err(format!("Notion {} API {}: {}", what, status.as_u16(), body).into())
}

impl PageStore for NotionClient {
    #[instrument(level = "info", skip_all, fields(blocks = children.len()))]
    async fn create_page(
        &self,
        database_id: &str,
        properties: &Value,
        children: &[Value],
    ) -> Result<String, Box<dyn Error>> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
            "children": children,
        });
        let response = self
            .authorized(self.client.post(self.url("pages")?))
            .json(&body)
            .send()
            .await?;
        let page: CreatedPage = check_status(response, "create page").await?.json().await?;
        debug!(page_id = %page.id, url = ?page.url, "Notion page created");
        Ok(page.id)
    }

    #[instrument(level = "info", skip_all, fields(%page_id))]
    async fn update_page(&self, page_id: &str, properties: &Value) -> Result<(), Box<dyn Error>> {
        let response = self
            .authorized(self.client.patch(self.url(&format!("pages/{page_id}"))?))
            .json(&json!({ "properties": properties }))
            .send()
            .await?;
        check_status(response, "update page").await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// A recorded call against [`RecordingStore`].
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum StoreCall {
        Create {
            database_id: String,
            properties: Value,
            children: Vec<Value>,
        },
        Update {
            page_id: String,
            properties: Value,
        },
    }

    /// In-memory [`PageStore`] that records every call.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingStore {
        pub(crate) calls: RefCell<Vec<StoreCall>>,
        pub(crate) fail_create: bool,
        pub(crate) fail_update: bool,
    }

    pub(crate) const FAKE_PAGE_ID: &str = "59833787-2cf9-4fdf-8782-e53db20768a5";

    impl PageStore for &RecordingStore {
        async fn create_page(
            &self,
            database_id: &str,
            properties: &Value,
            children: &[Value],
        ) -> Result<String, Box<dyn Error>> {
            self.calls.borrow_mut().push(StoreCall::Create {
                database_id: database_id.to_string(),
                properties: properties.clone(),
                children: children.to_vec(),
            });
            if self.fail_create {
                return Err("Notion create page API 400: validation_error".into());
            }
            Ok(FAKE_PAGE_ID.to_string())
        }

        async fn update_page(&self, page_id: &str, properties: &Value) -> Result<(), Box<dyn Error>> {
            self.calls.borrow_mut().push(StoreCall::Update {
                page_id: page_id.to_string(),
                properties: properties.clone(),
            });
            if self.fail_update {
                return Err("Notion update page API 502: bad gateway".into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_client_urls() {
        let client = NotionClient::new(&Settings::default(), &Secrets::default()).unwrap();
        assert_eq!(client.url("pages").unwrap().as_str(), "https://api.notion.com/v1/pages");
        assert_eq!(
            client.url("pages/abc-123").unwrap().as_str(),
            "https://api.notion.com/v1/pages/abc-123"
        );
        assert_eq!(client.version, "2022-06-28");
    }

    #[test]
    fn test_client_rejects_bad_base() {
        let settings = Settings {
            notion_api_base: "notion".to_string(),
            ..Settings::default()
        };
        assert!(NotionClient::new(&settings, &Secrets::default()).is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let secrets = Secrets {
            notion_token: "secret_abc".to_string(),
            ..Secrets::default()
        };
        let client = NotionClient::new(&Settings::default(), &secrets).unwrap();
        assert!(!format!("{client:?}").contains("secret_abc"));
    }
}
