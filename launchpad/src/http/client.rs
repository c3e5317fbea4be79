//! HTTP client shared by the REST provider adapters

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::LaunchError;

/// JSON client for a bearer-token REST API
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, LaunchError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        self.client.request(method, &url).header(
            header::AUTHORIZATION,
            format!("Bearer {}", self.token.expose_secret()),
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        request: RequestBuilder,
    ) -> Result<T, LaunchError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            return Err(LaunchError::ServerError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LaunchError> {
        let request = self.request(Method::GET, path);
        self.send(Method::GET, request).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LaunchError> {
        let request = self.request(Method::POST, path).json(body);
        self.send(Method::POST, request).await
    }

    /// Make a DELETE request.
    ///
    /// Returns `false` when the resource did not exist.
    pub async fn delete(&self, path: &str) -> Result<bool, LaunchError> {
        let response = self.request(Method::DELETE, path).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("HTTP DELETE failed: {} - {}", status, body);
            return Err(LaunchError::ServerError(format!("{}: {}", status, body)));
        }

        Ok(true)
    }
}

/// `path` with `pairs` appended as a form-encoded query string
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{}?{}", path, query)
}
