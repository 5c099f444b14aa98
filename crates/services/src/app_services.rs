use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::StudyConfig;
use crate::error::AppServicesError;
use crate::history_service::HistoryService;
use crate::offline::{Fetcher, HttpFetcher, OfflineManifest, OfflineWorker};
use crate::preferences_service::PreferencesService;
use crate::quiz::QuizLoopService;
use crate::reader_service::ReaderService;

/// Assembles app-facing services around one storage backend.
///
/// Content and quiz loaders fetch through the offline worker, so every page
/// request goes through the cache strategies.
#[derive(Clone)]
pub struct AppServices {
    config: StudyConfig,
    offline: Arc<OfflineWorker>,
    reader: Arc<ReaderService>,
    quiz_loop: Arc<QuizLoopService>,
    preferences: Arc<PreferencesService>,
    history: Arc<HistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP network.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage or the HTTP client cannot be initialized.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: StudyConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let network = Arc::new(HttpFetcher::new(config.request_timeout)?);
        Ok(Self::new(storage, network, clock, config))
    }

    #[must_use]
    pub fn new(
        storage: Storage,
        network: Arc<dyn Fetcher>,
        clock: Clock,
        config: StudyConfig,
    ) -> Self {
        let offline = Arc::new(OfflineWorker::new(
            OfflineManifest::from_config(&config),
            Arc::clone(&storage.caches),
            network,
        ));
        let through_cache: Arc<dyn Fetcher> = offline.clone();
        let store = storage.persistence();

        let reader = Arc::new(ReaderService::new(
            clock,
            Arc::clone(&through_cache),
            store.clone(),
            config.clone(),
        ));
        let quiz_loop = Arc::new(QuizLoopService::new(
            clock,
            through_cache,
            store.clone(),
            config.clone(),
        ));
        let preferences = Arc::new(PreferencesService::new(store.clone()));
        let history = Arc::new(HistoryService::new(store));

        Self {
            config,
            offline,
            reader,
            quiz_loop,
            preferences,
            history,
        }
    }

    #[must_use]
    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    #[must_use]
    pub fn offline(&self) -> Arc<OfflineWorker> {
        Arc::clone(&self.offline)
    }

    #[must_use]
    pub fn reader(&self) -> Arc<ReaderService> {
        Arc::clone(&self.reader)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    #[must_use]
    pub fn preferences(&self) -> Arc<PreferencesService> {
        Arc::clone(&self.preferences)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }
}
