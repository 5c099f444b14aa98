//! Offline cache worker: versioned app-shell install, stale cache cleanup and
//! request routing between the cache and the network.

mod manifest;
mod network;
mod worker;

pub use crate::error::OfflineError;
pub use manifest::{OFFLINE_PAGE, OfflineManifest, SEED_PATHS};
pub use network::{Fetcher, HttpFetcher, StaticNetwork};
pub use worker::{
    ActivationReport, FetchOutcome, FetchStrategy, InstallReport, OfflineWorker, ResponseSource,
    WorkerState,
};
