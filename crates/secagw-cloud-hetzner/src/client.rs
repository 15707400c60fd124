//! Hetzner Cloud API client
//!
//! Thin typed wrapper over the REST API. One client is built per call from
//! the credential the caller passes in; clients share the underlying
//! connection pool.

use crate::error::api_error;
use secagw_cloud::{CloudError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const HETZNER_API_BASE: &str = "https://api.hetzner.cloud/v1";

const PER_PAGE: &str = "50";

/// Hetzner Cloud API client bound to one token
#[derive(Clone)]
pub struct HetznerClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HetznerClient {
    pub fn new(http: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        // 204 responses carry no body; let callers ask for `()` or `Option<_>`
        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|e| CloudError::InvalidResponse(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        tracing::debug!("GET {}", path);
        self.send(self.http.get(self.url(path)).query(query)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", path);
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    /// POST without a request body (action endpoints such as `poweron`)
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("POST {}", path);
        self.send(self.http.post(self.url(path))).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("PUT {}", path);
        self.send(self.http.put(self.url(path)).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("DELETE {}", path);
        self.send(self.http.delete(self.url(path))).await
    }

    /// Fetch every page of a list endpoint
    ///
    /// `key` is the name of the array field in the response body
    /// (e.g. "servers").
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u64;

        loop {
            let mut params: Vec<(&str, String)> = query.to_vec();
            params.push(("page", page.to_string()));
            params.push(("per_page", PER_PAGE.to_string()));

            let mut body: serde_json::Value = self.get(path, &params).await?;
            let list = body
                .get_mut(key)
                .map(serde_json::Value::take)
                .ok_or_else(|| {
                    CloudError::InvalidResponse(format!("missing '{}' in {} response", key, path))
                })?;
            let batch: Vec<T> = serde_json::from_value(list)?;
            items.extend(batch);

            match body
                .pointer("/meta/pagination/next_page")
                .and_then(serde_json::Value::as_u64)
            {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(items)
    }
}

impl std::fmt::Debug for HetznerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetznerClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HetznerClient::new(reqwest::Client::new(), "http://localhost:1/v1/", "t");
        assert_eq!(client.base_url(), "http://localhost:1/v1");
        assert_eq!(client.url("/servers"), "http://localhost:1/v1/servers");
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HetznerClient::new(reqwest::Client::new(), HETZNER_API_BASE, "secret");
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
