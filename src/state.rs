use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};

use crate::config::Config;
use crate::jobs::JobEntry;
use crate::progress::ProgressUpdate;
use crate::storage::StoredUpload;
use crate::translate::{GoogleTranslator, Translator};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Upload registry, keyed by file identifier. Entries outlive the job so
    /// downloads can recover display names.
    pub uploads: Arc<DashMap<String, StoredUpload>>,
    /// Job table, keyed by file identifier. Guards duplicate submission and
    /// backs the status endpoint.
    pub jobs: Arc<DashMap<String, JobEntry>>,
    /// Every job publishes here; every WebSocket client subscribes.
    pub progress_tx: broadcast::Sender<ProgressUpdate>,
    /// Advisory lock serializing translation-provider calls only. Never held
    /// across disk I/O or progress emission.
    pub provider_lock: Arc<Mutex<()>>,
    pub translator: Arc<dyn Translator>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_translator(config, Arc::new(GoogleTranslator::new()))
    }

    pub fn with_translator(config: Config, translator: Arc<dyn Translator>) -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            config,
            uploads: Arc::new(DashMap::new()),
            jobs: Arc::new(DashMap::new()),
            progress_tx,
            provider_lock: Arc::new(Mutex::new(())),
            translator,
        }
    }
}
