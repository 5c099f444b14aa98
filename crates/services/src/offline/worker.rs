use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use storage::repository::CacheStorage;
use study_core::model::{Request, RequestKey, ResponseSnapshot};

use crate::error::{NetworkError, OfflineError};
use crate::offline::manifest::OfflineManifest;
use crate::offline::network::Fetcher;

/// Lifecycle of the offline worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Installation failed; fetches bypass the cache entirely.
    Redundant,
}

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Serve the cached copy at once and refresh it in the background.
    StaleWhileRevalidate,
    /// Serve the cached copy if present, otherwise go to the network.
    CacheFirst,
}

impl FetchStrategy {
    #[must_use]
    pub fn for_request(request: &Request) -> Self {
        if request.is_json_like() {
            FetchStrategy::StaleWhileRevalidate
        } else {
            FetchStrategy::CacheFirst
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
}

impl FetchOutcome {
    fn new(response: ResponseSnapshot, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cache: String,
    pub stored: usize,
}

/// Result of stale-cache cleanup during activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Intercepts asset requests and answers them from a versioned cache.
///
/// Cache mutation is serialized through a lifecycle gate: activation takes it
/// exclusively while fetch handling and installation share it, so a fetch
/// never observes a half-deleted set of caches.
pub struct OfflineWorker {
    inner: Arc<WorkerInner>,
    revalidations: AsyncMutex<JoinSet<()>>,
}

struct WorkerInner {
    manifest: OfflineManifest,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Fetcher>,
    gate: RwLock<()>,
    state: Mutex<WorkerState>,
    clients_claimed: AtomicBool,
}

impl OfflineWorker {
    #[must_use]
    pub fn new(
        manifest: OfflineManifest,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                manifest,
                caches,
                network,
                gate: RwLock::new(()),
                state: Mutex::new(WorkerState::Parsed),
                clients_claimed: AtomicBool::new(false),
            }),
            revalidations: AsyncMutex::new(JoinSet::new()),
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &OfflineManifest {
        &self.inner.manifest
    }

    #[must_use]
    pub fn cache_name(&self) -> String {
        self.inner.manifest.version.name()
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.inner.state()
    }

    #[must_use]
    pub fn clients_claimed(&self) -> bool {
        self.inner.clients_claimed.load(Ordering::SeqCst)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Install then activate immediately (skip-waiting).
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if installation fails.
    pub async fn register(&self) -> Result<(InstallReport, ActivationReport), OfflineError> {
        let installed = self.install().await?;
        let activated = self.activate().await?;
        Ok((installed, activated))
    }

    /// Fetch every seed asset and store them in the current cache.
    ///
    /// Nothing is stored unless every seed fetched successfully.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError::Install` if any seed fails to fetch or returns a
    /// non-success status, or `OfflineError::Storage` if the cache cannot be
    /// written.
    pub async fn install(&self) -> Result<InstallReport, OfflineError> {
        self.inner.set_state(WorkerState::Installing);
        let cache = self.cache_name();

        let stored = match self.inner.install_entries(&cache).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(cache = %cache, error = %err, "offline install failed");
                self.inner.set_state(WorkerState::Redundant);
                return Err(err);
            }
        };

        self.inner.set_state(WorkerState::Installed);
        info!(cache = %cache, stored, "offline cache installed");
        Ok(InstallReport { cache, stored })
    }

    /// Delete stale cache versions, then claim clients.
    ///
    /// Cleanup failures are logged and reported but never block activation.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError::NotInstalled` unless the worker has just
    /// installed a complete cache.
    pub async fn activate(&self) -> Result<ActivationReport, OfflineError> {
        let state = self.state();
        if state != WorkerState::Installed {
            warn!(state = ?state, "refusing to activate an incomplete cache");
            return Err(OfflineError::NotInstalled {
                state: format!("{state:?}"),
            });
        }
        self.inner.set_state(WorkerState::Activating);

        let report = {
            let _exclusive = self.inner.gate.write().await;
            self.inner.delete_stale_caches().await
        };

        self.inner.clients_claimed.store(true, Ordering::SeqCst);
        self.inner.set_state(WorkerState::Activated);
        info!(
            cache = %self.cache_name(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "offline worker activated"
        );
        Ok(report)
    }

    //
    // ─── FETCH HANDLING ────────────────────────────────────────────────────────
    //

    /// Answer `request` using the strategy chosen by its path.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError::Network` when the response is not cached and the
    /// network fails, or `OfflineError::OfflineFallbackMissing` for a failed
    /// navigation with no cached offline page.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, OfflineError> {
        if self.state() == WorkerState::Redundant {
            let live = self.inner.network.fetch(request).await?;
            return Ok(FetchOutcome::new(live, ResponseSource::Network));
        }
        match FetchStrategy::for_request(request) {
            FetchStrategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            FetchStrategy::CacheFirst => self.cache_first(request).await,
        }
    }

    /// Wait until no background revalidation is running.
    ///
    /// The task set is taken out of the lock before joining, so fetches
    /// arriving meanwhile can still spawn revalidations without waiting.
    pub async fn wait_until_idle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.revalidations.lock().await);
            if tasks.is_empty() {
                return;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    warn!(error = %err, "revalidation task aborted");
                }
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &Request) -> Result<FetchOutcome, OfflineError> {
        let key = request.key();
        if let Some(cached) = self.inner.lookup_current(&key).await {
            debug!(key = ?key, "cache hit; revalidating in background");
            self.spawn_revalidation(request.clone()).await;
            return Ok(FetchOutcome::new(cached, ResponseSource::Cache));
        }

        debug!(key = ?key, "cache miss; waiting on network");
        let live = self.inner.network.fetch(request).await?;
        self.inner.store_if_success(&key, &live).await;
        Ok(FetchOutcome::new(live, ResponseSource::Network))
    }

    async fn cache_first(&self, request: &Request) -> Result<FetchOutcome, OfflineError> {
        let key = request.key();
        if let Some(cached) = self.inner.lookup_current(&key).await {
            debug!(key = ?key, "cache hit");
            return Ok(FetchOutcome::new(cached, ResponseSource::Cache));
        }

        match self.inner.network.fetch(request).await {
            Ok(live) => {
                self.inner.store_if_success(&key, &live).await;
                Ok(FetchOutcome::new(live, ResponseSource::Network))
            }
            Err(err) if request.is_navigation() => self.inner.offline_fallback(err).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn spawn_revalidation(&self, request: Request) {
        let inner = Arc::clone(&self.inner);
        let mut tasks = self.revalidations.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            if let Err(err) = joined {
                warn!(error = %err, "revalidation task aborted");
            }
        }
        tasks.spawn(async move { inner.revalidate(request).await });
    }
}

impl WorkerInner {
    fn state(&self) -> WorkerState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(WorkerState::Redundant)
    }

    fn set_state(&self, next: WorkerState) {
        if let Ok(mut state) = self.state.lock() {
            debug!(from = ?*state, to = ?next, "offline worker state");
            *state = next;
        }
    }

    fn cache_name(&self) -> String {
        self.manifest.version.name()
    }

    async fn install_entries(&self, cache: &str) -> Result<usize, OfflineError> {
        let mut fetched = Vec::with_capacity(self.manifest.seeds.len());
        for path in &self.manifest.seeds {
            let request = self.manifest.resolve(path)?;
            let url = request.url().to_string();
            let response =
                self.network
                    .fetch(&request)
                    .await
                    .map_err(|err| OfflineError::Install {
                        url: url.clone(),
                        reason: err.to_string(),
                    })?;
            if !response.is_success() {
                return Err(OfflineError::Install {
                    url,
                    reason: format!("status {}", response.status),
                });
            }
            fetched.push((request.key(), response));
        }

        let _shared = self.gate.read().await;
        self.caches.open_cache(cache).await?;
        for (key, response) in &fetched {
            self.caches.put(cache, key, response).await?;
        }
        Ok(fetched.len())
    }

    async fn delete_stale_caches(&self) -> ActivationReport {
        let mut report = ActivationReport::default();
        let names = match self.caches.cache_names().await {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "could not list caches for cleanup");
                return report;
            }
        };

        for name in names
            .into_iter()
            .filter(|name| self.manifest.version.is_stale(name))
        {
            match self.caches.delete_cache(&name).await {
                Ok(_) => {
                    info!(cache = %name, "deleted stale cache");
                    report.deleted.push(name);
                }
                Err(err) => {
                    warn!(cache = %name, error = %err, "stale cache cleanup failed");
                    report.failed.push(name);
                }
            }
        }
        report
    }

    async fn lookup_current(&self, key: &RequestKey) -> Option<ResponseSnapshot> {
        let _shared = self.gate.read().await;
        match self.caches.lookup(&self.cache_name(), key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(key = ?key, error = %err, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    /// Store `response` in the current cache if it is a 2xx. Returns whether it was stored.
    async fn store_if_success(&self, key: &RequestKey, response: &ResponseSnapshot) -> bool {
        if !response.is_success() {
            debug!(key = ?key, status = response.status, "not caching unsuccessful response");
            return false;
        }
        let _shared = self.gate.read().await;
        let cache = self.cache_name();
        let stored = async {
            self.caches.open_cache(&cache).await?;
            self.caches.put(&cache, key, response).await
        }
        .await;
        match stored {
            Ok(()) => true,
            Err(err) => {
                warn!(key = ?key, error = %err, "cache write dropped");
                false
            }
        }
    }

    async fn revalidate(&self, request: Request) {
        let key = request.key();
        match self.network.fetch(&request).await {
            Ok(live) => {
                if self.store_if_success(&key, &live).await {
                    debug!(key = ?key, "revalidated cache entry");
                }
            }
            Err(err) => debug!(key = ?key, error = %err, "revalidation failed; keeping cached copy"),
        }
    }

    async fn offline_fallback(&self, cause: NetworkError) -> Result<FetchOutcome, OfflineError> {
        let offline = self.manifest.resolve(&self.manifest.offline_page)?;
        let cached = {
            let _shared = self.gate.read().await;
            self.caches.lookup_any(&offline.key()).await
        };
        match cached {
            Ok(Some(page)) => {
                debug!(error = %cause, "navigation failed; serving offline page");
                Ok(FetchOutcome::new(page, ResponseSource::OfflineFallback))
            }
            Ok(None) => Err(OfflineError::OfflineFallbackMissing { source: cause }),
            Err(err) => {
                warn!(error = %err, "offline page lookup failed");
                Err(OfflineError::OfflineFallbackMissing { source: cause })
            }
        }
    }
}

/// Lets page loaders fetch through the worker as they would through the network.
#[async_trait]
impl Fetcher for OfflineWorker {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        match self.handle_fetch(request).await {
            Ok(outcome) => Ok(outcome.response),
            Err(OfflineError::Network(err)) => Err(err),
            Err(OfflineError::OfflineFallbackMissing { source }) => Err(source),
            Err(other) => Err(NetworkError::Transport(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::network::StaticNetwork;
    use storage::repository::InMemoryRepository;
    use url::Url;

    const ORIGIN: &str = "http://localhost:8080/";

    fn manifest(seeds: &[&str]) -> OfflineManifest {
        OfflineManifest::new(Default::default(), Url::parse(ORIGIN).unwrap())
            .with_seeds(seeds.iter().copied())
    }

    fn url(path: &str) -> String {
        format!("http://localhost:8080{path}")
    }

    fn request(path: &str) -> Request {
        Request::resolve(&Url::parse(ORIGIN).unwrap(), path).unwrap()
    }

    #[tokio::test]
    async fn failed_install_marks_worker_redundant() {
        let network = Arc::new(
            StaticNetwork::new().with_route(&url("/"), ResponseSnapshot::ok("text/html", "home")),
        );
        let repo = InMemoryRepository::new();
        let worker = OfflineWorker::new(
            manifest(&["/", "/missing.js"]),
            Arc::new(repo.clone()),
            network,
        );

        let err = worker.install().await.unwrap_err();
        assert!(matches!(err, OfflineError::Install { .. }));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(repo.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redundant_worker_refuses_activation_and_bypasses_cache() {
        let network = Arc::new(
            StaticNetwork::new()
                .with_route(&url("/"), ResponseSnapshot::ok("text/html", "home"))
                .with_route(&url("/x.css"), ResponseSnapshot::ok("text/css", "x{}")),
        );
        let repo = InMemoryRepository::new();
        let worker = OfflineWorker::new(
            manifest(&["/", "/missing.js"]),
            Arc::new(repo.clone()),
            network.clone(),
        );
        worker.install().await.unwrap_err();

        let outcome = worker.handle_fetch(&request("/x.css")).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert!(repo.cache_names().await.unwrap().is_empty());

        let again = worker.handle_fetch(&request("/x.css")).await.unwrap();
        assert_eq!(again.source, ResponseSource::Network);
        assert_eq!(network.calls(&url("/x.css")), 2);

        let err = worker.activate().await.unwrap_err();
        assert!(matches!(err, OfflineError::NotInstalled { .. }));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(!worker.clients_claimed());
    }

    #[tokio::test]
    async fn activation_requires_install() {
        let worker = OfflineWorker::new(
            manifest(&[]),
            Arc::new(InMemoryRepository::new()),
            Arc::new(StaticNetwork::new()),
        );
        assert!(matches!(
            worker.activate().await,
            Err(OfflineError::NotInstalled { .. })
        ));
        assert_eq!(worker.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn unsuccessful_responses_are_not_cached() {
        let network = Arc::new(StaticNetwork::new());
        let repo = InMemoryRepository::new();
        let worker = OfflineWorker::new(manifest(&[]), Arc::new(repo.clone()), network.clone());

        let outcome = worker.handle_fetch(&request("/nope.css")).await.unwrap();
        assert_eq!(outcome.response.status, 404);
        assert_eq!(outcome.source, ResponseSource::Network);
        assert!(
            repo.lookup_any(&request("/nope.css").key())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn subresource_failure_propagates_without_fallback() {
        let network = Arc::new(StaticNetwork::new());
        network.set_online(false);
        let worker = OfflineWorker::new(
            manifest(&[]),
            Arc::new(InMemoryRepository::new()),
            network,
        );
        let err = worker.handle_fetch(&request("/logo.png")).await.unwrap_err();
        assert!(matches!(err, OfflineError::Network(NetworkError::Offline)));
    }

    #[test]
    fn strategy_follows_path_suffix() {
        assert_eq!(
            FetchStrategy::for_request(&request("/subjects/geo/rivers.json")),
            FetchStrategy::StaleWhileRevalidate
        );
        assert_eq!(
            FetchStrategy::for_request(&request("/subjects/geo/rivers/1.html")),
            FetchStrategy::CacheFirst
        );
    }
}
