//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::model::{CommentError, PageNumber, RequestError, TrackError};

/// Errors from fetching a resource over the network.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NetworkError {
    #[error("network unreachable")]
    Offline,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
}

/// Errors emitted by the offline worker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OfflineError {
    #[error("install failed while caching {url}: {reason}")]
    Install { url: String, reason: String },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("offline page is not cached; navigation failed: {source}")]
    OfflineFallbackMissing {
        #[source]
        source: NetworkError,
    },
    #[error("cannot activate: worker is {state}, not installed")]
    NotInstalled { state: String },
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReaderService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error(transparent)]
    MissingIdentifiers(#[from] TrackError),
    #[error("could not load topic info: {0}")]
    Info(#[source] NetworkError),
    #[error("topic info is malformed: {0}")]
    MalformedInfo(String),
    #[error("page {page} is outside 1..={total}")]
    PageOutOfRange { page: PageNumber, total: u32 },
    #[error("could not load page {page}: {source}")]
    Page {
        page: PageNumber,
        #[source]
        source: NetworkError,
    },
    #[error(transparent)]
    Comment(#[from] CommentError),
}

impl ContentError {
    /// Short message suitable for inline display in place of content.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ContentError::MissingIdentifiers(_) => {
                "Error: Subject or Topic not found in URL.".to_owned()
            }
            ContentError::Info(_) | ContentError::MalformedInfo(_) => {
                "Could not load content for this topic.".to_owned()
            }
            ContentError::PageOutOfRange { page, .. } | ContentError::Page { page, .. } => {
                format!("Could not load page {page}.")
            }
            ContentError::Comment(err) => err.to_string(),
        }
    }
}

/// Errors emitted by quiz sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    MissingIdentifiers(#[from] TrackError),
    #[error("could not load quiz: {0}")]
    Load(#[from] NetworkError),
    #[error("quiz data is malformed: {0}")]
    MalformedData(String),
    #[error("quiz has no valid questions ({rejected} rejected)")]
    NoValidQuestions { rejected: usize },
    #[error("session is not loading")]
    NotLoading,
    #[error("session is not in progress")]
    NotInProgress,
    #[error("session already completed")]
    Completed,
    #[error("question {requested} is locked; current question is {current}")]
    QuestionLocked { requested: usize, current: usize },
    #[error("{choice:?} is not an option for this question")]
    UnknownOption { choice: String },
}

impl SessionError {
    /// Short message suitable for inline display in place of the quiz.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SessionError::MissingIdentifiers(_) => {
                "Error: Subject or Topic not found in URL.".to_owned()
            }
            SessionError::Load(_)
            | SessionError::MalformedData(_)
            | SessionError::NoValidQuestions { .. } => {
                "The quiz for this topic has not been uploaded yet.".to_owned()
            }
            other => other.to_string(),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}
