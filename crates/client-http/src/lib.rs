//! reqwest-backed transport adapter for the FinchChat request core.
//!
//! Binds the core's [`ApiResponse`] contract to real HTTP: a configured
//! client with GET/POST helpers, and a response wrapper whose JSON body is
//! read from the wire at most once. Socket-level timeouts live here; the
//! core only reasons about wall-clock deadlines.

use std::time::Duration;

use async_trait::async_trait;
use client_core::{ApiResponse, BodyError};
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout, covering the full body read.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: format!("finchchat/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
        }
    }
}

/// Transport-level errors, distinct from body-decode failures.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The underlying client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

/// Build a configured reqwest client.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
        .map_err(HttpError::ClientBuild)
}

/// Shared HTTP client handed to the retry driver.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Create a client with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(config: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            inner: build_client(config)?,
        })
    }

    /// The underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Issue a GET request.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        debug!(url, "sending GET request");
        let response = self.inner.get(url).send().await.map_err(HttpError::Request)?;
        debug!(url, status = response.status().as_u16(), "received GET response");
        Ok(HttpResponse::new(response))
    }

    /// Issue a POST request with a JSON body.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<HttpResponse, HttpError> {
        debug!(url, "sending POST request");
        let response = self
            .inner
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(HttpError::Request)?;
        debug!(url, status = response.status().as_u16(), "received POST response");
        Ok(HttpResponse::new(response))
    }
}

/// One response attempt with single-read JSON body caching.
///
/// Status and headers are captured up front so they stay readable after the
/// body stream is consumed or the connection is released.
#[derive(Debug)]
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    raw: Option<reqwest::Response>,
    decoded: Option<Result<Value, BodyError>>,
}

impl HttpResponse {
    fn new(response: reqwest::Response) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            raw: Some(response),
            decoded: None,
        }
    }
}

#[async_trait]
impl ApiResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    async fn body_json(&mut self) -> Result<Value, BodyError> {
        if let Some(cached) = &self.decoded {
            return cached.clone();
        }

        let result = match self.raw.take() {
            Some(raw) => decode_json(raw).await,
            None => Err(BodyError::Read(
                "response body was already released".to_owned(),
            )),
        };
        self.decoded = Some(result.clone());
        result
    }

    fn release(&mut self) {
        // Dropping the inner response frees the connection; the cached body
        // (if any) stays readable.
        self.raw = None;
    }
}

async fn decode_json(raw: reqwest::Response) -> Result<Value, BodyError> {
    let bytes = raw
        .bytes()
        .await
        .map_err(|err| BodyError::Read(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| BodyError::Parse(err.to_string()))
}
