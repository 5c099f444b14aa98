use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use study_core::model::{Request, ResponseSnapshot};

use crate::error::NetworkError;

/// Source of live responses.
///
/// Non-2xx statuses are returned as responses, not errors; `Err` means the
/// request never produced a response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `request` from the network.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` when no response could be obtained.
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError>;
}

//
// ─── HTTP ──────────────────────────────────────────────────────────────────────
//

/// `reqwest`-backed fetcher used outside tests.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Transport` if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NetworkError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        let response = self
            .client
            .get(request.url().clone())
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    NetworkError::Offline
                } else {
                    NetworkError::Transport(err.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|err| NetworkError::Transport(err.to_string()))?;

        Ok(ResponseSnapshot::new(status, content_type, body.to_vec()))
    }
}

//
// ─── SCRIPTED ──────────────────────────────────────────────────────────────────
//

/// In-process fetcher serving fixed routes, with an online switch.
///
/// Unknown URLs answer 404. Every attempt is counted, including attempts
/// made while offline.
#[derive(Debug)]
pub struct StaticNetwork {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    calls: Mutex<HashMap<String, usize>>,
    online: AtomicBool,
}

impl Default for StaticNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn with_route(self, url: &str, response: ResponseSnapshot) -> Self {
        self.insert(url, response);
        self
    }

    /// Add or replace the response served for `url`.
    pub fn insert(&self, url: &str, response: ResponseSnapshot) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_owned(), response);
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of fetch attempts made for `url`.
    #[must_use]
    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        let url = request.url().as_str();
        {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| NetworkError::Transport("call log poisoned".into()))?;
            *calls.entry(url.to_owned()).or_insert(0) += 1;
        }

        if !self.is_online() {
            return Err(NetworkError::Offline);
        }

        let routes = self
            .routes
            .lock()
            .map_err(|_| NetworkError::Transport("route table poisoned".into()))?;
        Ok(routes
            .get(url)
            .cloned()
            .unwrap_or_else(ResponseSnapshot::not_found))
    }
}
