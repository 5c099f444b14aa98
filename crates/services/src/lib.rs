#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod history_service;
pub mod offline;
pub mod preferences_service;
pub mod quiz;
pub mod reader_service;

pub use study_core::Clock;

pub use app_services::AppServices;
pub use config::StudyConfig;
pub use error::{
    AppServicesError, ConfigError, ContentError, NetworkError, OfflineError, SessionError,
};
pub use history_service::{HistoryService, HistorySummary};
pub use offline::{
    ActivationReport, FetchOutcome, Fetcher, HttpFetcher, InstallReport, OfflineManifest,
    OfflineWorker, ResponseSource, StaticNetwork, WorkerState,
};
pub use preferences_service::PreferencesService;
pub use quiz::{QuizLoopService, QuizPhase, QuizSession, QuizStep};
pub use reader_service::{CommentAdded, PageNavigation, PageSource, ReaderService, ReaderSession};
