//! HTTP page source backed by reqwest
//!
//! One shared [`reqwest::Client`] per run: connection pooling is sized to the
//! concurrency budget and the fixed locale/origin headers are installed as
//! client defaults.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::downloader::FetchConfig;
use crate::fetcher::{CatalogPage, FetcherError, FetcherResult, PageSource};
use crate::FetchRequest;

/// Catalog API client making single, unretried page requests.
#[derive(Debug, Clone)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: String,
}

impl CatalogHttpClient {
    /// Wrap an existing client.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build a client with the headers, timeouts and pool size from `config`.
    pub fn from_config(config: &FetchConfig) -> FetcherResult<Self> {
        let client = Client::builder()
            .default_headers(build_headers(config)?)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.concurrency)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| FetcherError::ClientBuild(e.to_string()))?;

        Ok(Self::new(client, config.base_url.clone()))
    }

    /// Endpoint this client queries.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PageSource for CatalogHttpClient {
    async fn fetch_page(&self, request: &FetchRequest) -> FetcherResult<CatalogPage> {
        debug!(page = request.page, url = %self.base_url, "GET catalog page");

        let response = self
            .client
            .get(&self.base_url)
            .query(&request.query_params())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetcherError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(map_transport_error)?;
        CatalogPage::from_body(&body)
    }
}

fn build_headers(config: &FetchConfig) -> FetcherResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in config.default_headers() {
        let value = HeaderValue::from_str(&value)
            .map_err(|e| FetcherError::ClientBuild(format!("invalid header {name}: {e}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

fn map_transport_error(err: reqwest::Error) -> FetcherError {
    if err.is_timeout() {
        FetcherError::Timeout
    } else {
        FetcherError::NetworkError(err.to_string())
    }
}
