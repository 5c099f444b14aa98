use std::env;
use std::time::Duration;

use url::Url;

use study_core::model::{CacheVersion, PageNumber, StudyTrack};

use crate::error::ConfigError;

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080/";
pub const DEFAULT_CONTENT_ROOT: &str = "subjects";
pub const DEFAULT_QUIZ_MINUTES: u64 = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Runtime settings shared by the offline worker, reader and quiz services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyConfig {
    pub origin: Url,
    pub content_root: String,
    pub quiz_time_budget: Duration,
    pub cache_version: CacheVersion,
    pub request_timeout: Duration,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            content_root: DEFAULT_CONTENT_ROOT.to_owned(),
            quiz_time_budget: Duration::from_secs(DEFAULT_QUIZ_MINUTES * 60),
            cache_version: CacheVersion::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl StudyConfig {
    /// Read `STUDY_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`StudyConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a provided value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("STUDY_ORIGIN") {
            config.origin = parse_origin(&raw)?;
        }
        if let Some(raw) = lookup("STUDY_CONTENT_ROOT") {
            let root = raw.trim().trim_matches('/');
            if root.is_empty() {
                return Err(invalid("STUDY_CONTENT_ROOT", "must not be empty"));
            }
            config.content_root = root.to_owned();
        }
        if let Some(raw) = lookup("STUDY_QUIZ_MINUTES") {
            let minutes: u64 = raw
                .trim()
                .parse()
                .map_err(|_| invalid("STUDY_QUIZ_MINUTES", format!("{raw:?} is not a number")))?;
            if minutes == 0 {
                return Err(invalid("STUDY_QUIZ_MINUTES", "must be at least 1"));
            }
            config.quiz_time_budget = Duration::from_secs(minutes * 60);
        }
        if let Some(raw) = lookup("STUDY_CACHE_VERSION") {
            let version: u32 = raw
                .trim()
                .parse()
                .map_err(|_| invalid("STUDY_CACHE_VERSION", format!("{raw:?} is not a number")))?;
            config.cache_version = CacheVersion::new(CacheVersion::DEFAULT_PREFIX, version);
        }

        Ok(config)
    }

    //
    // ─── CONTENT PATHS ─────────────────────────────────────────────────────────
    //

    /// `{root}/{subject}/{topic}.json`
    #[must_use]
    pub fn quiz_path(&self, track: &StudyTrack) -> String {
        format!(
            "{}/{}/{}.json",
            self.content_root,
            track.subject(),
            track.topic()
        )
    }

    /// `{root}/{subject}/{topic}/info.json`
    #[must_use]
    pub fn topic_info_path(&self, track: &StudyTrack) -> String {
        format!(
            "{}/{}/{}/info.json",
            self.content_root,
            track.subject(),
            track.topic()
        )
    }

    /// `{root}/{subject}/{topic}/{page}.html`
    #[must_use]
    pub fn page_path(&self, track: &StudyTrack, page: PageNumber) -> String {
        format!(
            "{}/{}/{}/{page}.html",
            self.content_root,
            track.subject(),
            track.topic()
        )
    }
}

fn default_origin() -> Url {
    Url::parse(DEFAULT_ORIGIN).unwrap_or_else(|_| unreachable!("default origin is valid"))
}

fn parse_origin(raw: &str) -> Result<Url, ConfigError> {
    let mut trimmed = raw.trim().to_owned();
    if !trimmed.ends_with('/') {
        trimmed.push('/');
    }
    let url = Url::parse(&trimmed).map_err(|err| invalid("STUDY_ORIGIN", err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("STUDY_ORIGIN", "must be an absolute base url"));
    }
    Ok(url)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
