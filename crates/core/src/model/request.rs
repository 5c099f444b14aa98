use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    #[error("invalid request url {raw:?}: {reason}")]
    InvalidUrl { raw: String, reason: String },
}

//
// ─── CACHE VERSION ─────────────────────────────────────────────────────────────
//

/// Name of one generation of the offline cache, e.g. `quiz-files-v9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVersion {
    prefix: String,
    version: u32,
}

impl CacheVersion {
    pub const DEFAULT_PREFIX: &'static str = "quiz-files-";

    #[must_use]
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self {
            prefix: prefix.into(),
            version,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn name(&self) -> String {
        format!("{}v{}", self.prefix, self.version)
    }

    /// True for caches in this namespace that are not the current version.
    #[must_use]
    pub fn is_stale(&self, cache_name: &str) -> bool {
        cache_name.starts_with(&self.prefix) && cache_name != self.name()
    }
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX, 9)
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

//
// ─── REQUEST ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestMode {
    /// Top-level page load; eligible for the offline page fallback.
    Navigate,
    #[default]
    Subresource,
}

/// Outgoing GET request seen by the offline worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    mode: RequestMode,
}

impl Request {
    /// Create a request for an absolute URL, dropping any fragment.
    #[must_use]
    pub fn get(mut url: Url) -> Self {
        url.set_fragment(None);
        Self {
            url,
            mode: RequestMode::Subresource,
        }
    }

    /// Resolve `path` against `base` and build a request for it.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidUrl` if the path cannot be joined.
    pub fn resolve(base: &Url, path: &str) -> Result<Self, RequestError> {
        let url = base.join(path).map_err(|err| RequestError::InvalidUrl {
            raw: path.to_owned(),
            reason: err.to_string(),
        })?;
        Ok(Self::get(url))
    }

    #[must_use]
    pub fn navigate(mut self) -> Self {
        self.mode = RequestMode::Navigate;
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Data files that change server-side (`*.json`).
    #[must_use]
    pub fn is_json_like(&self) -> bool {
        self.url.path().ends_with(".json")
    }

    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::from_url(&self.url)
    }
}

/// Cache key for a request: method plus normalized absolute URL.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey(String);

impl RequestKey {
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("GET {url}"))
    }

    /// Rehydrate a key read back from storage.
    #[must_use]
    pub fn from_persisted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestKey({})", self.0)
    }
}

//
// ─── RESPONSE ──────────────────────────────────────────────────────────────────
//

/// Status, content type and body of a response, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    #[must_use]
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, Some(content_type.to_owned()), body)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404, Some("text/plain".to_owned()), b"not found".to_vec())
    }

    /// 2xx responses are the only ones worth caching or serving as content.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
