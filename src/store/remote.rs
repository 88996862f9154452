//! HTTP backend talking to the list server.
//!
//! - `GET  {base}/list/{listId}` -> `{ listId, todos }`
//! - `PUT  {base}/list/{listId}` with `{ todos }` -> `{ listId, todos }`
//! - `GET  {base}/lists` and `DELETE {base}/list/{listId}` for list management

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::config::ConfigError;
use crate::models::{ErrorBody, ListSummary, TodoList, TodoNode, UpdateListInput};

use super::{StoreError, TodoStore};

#[derive(Debug, Clone)]
pub struct RemoteStore {
    base_url: Url,
    client: Client,
}

impl RemoteStore {
    /// Create a store rooted at `base_url`, e.g. `http://localhost:3001`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRemoteUrl {
            url: base_url.to_string(),
            reason,
        };
        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https".to_string()));
        }
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_string()));
        }
        Ok(Self {
            base_url,
            client: Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn list_url(&self, list_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("list").push(list_id);
        }
        url
    }

    /// Decode a success body, or turn an error status into [`StoreError::Server`].
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        Err(StoreError::Server {
            status: status.as_u16(),
            message,
        })
    }

    /// Fetch the full stored record for a list.
    pub async fn get_list(&self, list_id: &str) -> Result<TodoList, StoreError> {
        let response = self.client.get(self.list_url(list_id)).send().await?;
        self.handle_response(response).await
    }

    /// Upsert a list and return what the server stored.
    pub async fn put_list(
        &self,
        list_id: &str,
        todos: &[TodoNode],
    ) -> Result<TodoList, StoreError> {
        let response = self
            .client
            .put(self.list_url(list_id))
            .json(&UpdateListInput {
                todos: todos.to_vec(),
            })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Every list on the server, most recently updated first.
    pub async fn list_summaries(&self) -> Result<Vec<ListSummary>, StoreError> {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("lists");
        }
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    pub async fn delete_list(&self, list_id: &str) -> Result<(), StoreError> {
        let response = self.client.delete(self.list_url(list_id)).send().await?;
        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TodoStore for RemoteStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn load(&self, list_id: &str) -> Result<Vec<TodoNode>, StoreError> {
        Ok(self.get_list(list_id).await?.todos)
    }

    async fn save(&self, list_id: &str, todos: &[TodoNode]) -> Result<(), StoreError> {
        self.put_list(list_id, todos).await?;
        Ok(())
    }
}
