use url::Url;

use study_core::model::{CacheVersion, Request, RequestError};

use crate::config::StudyConfig;

/// App-shell assets fetched during install.
pub const SEED_PATHS: [&str; 10] = [
    "/",
    "/index.html",
    "/style.css",
    "/script.js",
    "/offline.html",
    "/study.html",
    "/subjects.html",
    "/topics.html",
    "/dashboard.html",
    "/deepstudy.html",
];

pub const OFFLINE_PAGE: &str = "/offline.html";

/// What the offline worker caches and under which cache name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineManifest {
    pub version: CacheVersion,
    pub origin: Url,
    pub seeds: Vec<String>,
    pub offline_page: String,
}

impl OfflineManifest {
    #[must_use]
    pub fn new(version: CacheVersion, origin: Url) -> Self {
        Self {
            version,
            origin,
            seeds: SEED_PATHS.iter().map(|p| (*p).to_owned()).collect(),
            offline_page: OFFLINE_PAGE.to_owned(),
        }
    }

    #[must_use]
    pub fn from_config(config: &StudyConfig) -> Self {
        Self::new(config.cache_version.clone(), config.origin.clone())
    }

    /// Replace the seed list, e.g. for a trimmed shell.
    #[must_use]
    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds = seeds.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve a shell path under `origin`, the same way content paths are.
    ///
    /// A leading `/` means "root of the app", not the host root, so an
    /// origin like `https://host/app/` keeps the shell under `/app/`.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if the joined URL is invalid.
    pub fn resolve(&self, path: &str) -> Result<Request, RequestError> {
        Request::resolve(&self.origin, path.trim_start_matches('/'))
    }
}
