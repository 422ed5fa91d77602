// src/ingest/http.rs
//! Outbound HTTP capability used by the source adapters.
//!
//! Adapters describe a request with [`HttpRequest`] and hand it to an
//! [`HttpFetch`] implementation, which returns the parsed JSON body. The
//! production implementation wraps `reqwest`; tests swap in [`FixtureFetcher`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::ingest::types::DEFAULT_SOURCE_TIMEOUT;

pub const DEFAULT_USER_AGENT: &str = "arbitrage-engine/1.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        let mut req = Self::new(Method::Post, url);
        req.body = Some(body);
        req
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Perform the request and parse the body as JSON.
    async fn fetch_json(&self, req: HttpRequest) -> Result<Value, FetchError>;
}

/// Run `req`, giving up with [`FetchError::Timeout`] once `req.timeout` has
/// elapsed even when the fetcher does not enforce it itself.
pub async fn fetch_within(http: &dyn HttpFetch, req: HttpRequest) -> Result<Value, FetchError> {
    let bound = req.timeout;
    match tokio::time::timeout(bound, http.fetch_json(req)).await {
        Ok(res) => res,
        Err(_) => Err(FetchError::Timeout(format!(
            "no response within {}ms",
            bound.as_millis()
        ))),
    }
}

/// `reqwest`-backed fetcher. One client is shared by every adapter.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| FetchError::Network(format!("building http client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch_json(&self, req: HttpRequest) -> Result<Value, FetchError> {
        let mut builder = match req.method {
            Method::Get => self.client.get(&req.url),
            Method::Post => self.client.post(&req.url),
        };
        builder = builder.timeout(req.timeout);
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > 200 {
                let cut = body
                    .char_indices()
                    .nth(200)
                    .map(|(i, _)| i)
                    .unwrap_or(body.len());
                body.truncate(cut);
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// --- Test helper ---

/// Serves canned responses keyed by URL and records every request it sees.
/// URLs without a route answer with a network error.
#[derive(Default)]
pub struct FixtureFetcher {
    routes: Mutex<HashMap<String, Result<Value, FetchError>>>,
    pub calls: Mutex<Vec<HttpRequest>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, url: &str, body: Value) -> Self {
        self.insert(url, Ok(body));
        self
    }

    pub fn with_json_str(self, url: &str, body: &str) -> Self {
        let parsed = serde_json::from_str(body).map_err(FetchError::from);
        self.insert(url, parsed);
        self
    }

    pub fn with_error(self, url: &str, err: FetchError) -> Self {
        self.insert(url, Err(err));
        self
    }

    fn insert(&self, url: &str, res: Result<Value, FetchError>) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), res);
        }
    }

    pub fn recorded(&self) -> Vec<HttpRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpFetch for FixtureFetcher {
    async fn fetch_json(&self, req: HttpRequest) -> Result<Value, FetchError> {
        let url = req.url.clone();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(req);
        }
        let routes = self
            .routes
            .lock()
            .map_err(|_| FetchError::Network("fixture routes poisoned".into()))?;
        match routes.get(&url) {
            Some(res) => res.clone(),
            None => Err(FetchError::Network(format!("no fixture for {url}"))),
        }
    }
}
