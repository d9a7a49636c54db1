use std::sync::Arc;
use std::time::Duration;

use conduct_core::methodology::Methodology;
use tokio::sync::RwLock;

use crate::store::MemoryStore;

/// Client-side ceiling for one advisory attempt. Anything slower falls
/// back to the deterministic recommendation.
const DEFAULT_ADVISORY_TIMEOUT_SECS: u64 = 15;
const MAX_ADVISORY_TIMEOUT_SECS: u64 = 20;

/// Advisory collaborator settings, derived from the environment once at
/// startup. An unset URL disables the advisory path entirely.
#[derive(Clone)]
pub struct AdvisorySettings {
    pub url: Option<String>,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

impl AdvisorySettings {
    pub fn from_env() -> Self {
        let url = std::env::var("CONDUCT_ADVISORY_URL")
            .ok()
            .filter(|u| !u.is_empty());
        let timeout_secs = std::env::var("CONDUCT_ADVISORY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_ADVISORY_TIMEOUT_SECS)
            .clamp(1, MAX_ADVISORY_TIMEOUT_SECS);
        AdvisorySettings {
            url,
            timeout: Duration::from_secs(timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    /// Swapped atomically when a custom methodology config is applied.
    pub methodology: Arc<RwLock<Arc<Methodology>>>,
    pub advisory: AdvisorySettings,
}

impl AppState {
    pub fn new(advisory: AdvisorySettings) -> Self {
        AppState {
            store: Arc::new(MemoryStore::default()),
            methodology: Arc::new(RwLock::new(Arc::new(Methodology::built_in()))),
            advisory,
        }
    }

    /// Snapshot of the current methodology handle.
    pub async fn methodology(&self) -> Arc<Methodology> {
        self.methodology.read().await.clone()
    }
}
