//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::errors::DeployError;

/// Media type of the Heroku-compatible platform API
pub const PLATFORM_ACCEPT: &str = "application/vnd.heroku+json; version=3";

/// Media type of the GitHub REST API
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

pub const JSON_ACCEPT: &str = "application/json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON HTTP client bound to one API
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, accept: &str) -> Result<Self, DeployError> {
        let mut headers = header::HeaderMap::new();
        let accept = header::HeaderValue::from_str(accept)
            .map_err(|e| DeployError::ConfigError(format!("Invalid Accept header: {}", e)))?;
        headers.insert(header::ACCEPT, accept);

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("stagehand/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new HTTP client that sends a bearer token on every API request
    pub fn with_token(base_url: &str, accept: &str, token: SecretString) -> Result<Self, DeployError> {
        let mut client = Self::new(base_url, accept)?;
        client.token = Some(token);
        Ok(client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_status("GET", response).await?;

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.authorize(self.client.post(&url).json(body)).send().await?;
        let response = check_status("POST", response).await?;

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request, ignoring the response body
    pub async fn post_discard<B: Serialize>(&self, path: &str, body: &B) -> Result<(), DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.authorize(self.client.post(&url).json(body)).send().await?;
        check_status("POST", response).await?;
        Ok(())
    }

    /// PUT raw bytes to an absolute URL, without API credentials.
    ///
    /// Used for pre-signed upload URLs that reject extra auth headers.
    pub async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> Result<(), DeployError> {
        debug!("PUT {} ({} bytes)", redact_query(url), bytes.len());

        let response = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, "")
            .body(bytes)
            .send()
            .await?;
        check_status("PUT", response).await?;
        Ok(())
    }
}

async fn check_status(method: &str, response: Response) -> Result<Response, DeployError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("HTTP {} failed: {} - {}", method, status, body);
    Err(classify_status(status, body))
}

/// Map a non-success status to the error taxonomy
pub fn classify_status(status: StatusCode, body: String) -> DeployError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DeployError::Unauthorized(format!("{}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            DeployError::PlatformUnavailable(format!("{}: {}", status, body))
        }
        s if s.is_client_error() => DeployError::RequestRejected {
            status: s.as_u16(),
            body,
        },
        s => DeployError::PlatformUnavailable(format!("{}: {}", s, body)),
    }
}

/// Strip the query string, which carries the signature of pre-signed URLs
fn redact_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}
