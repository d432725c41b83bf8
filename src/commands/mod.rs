pub mod classifier;
pub mod history;

use crate::config::AppConfig;
use crate::services::classifier::model_manager::ModelCache;
use crate::services::session::ClassifierSession;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Managed Tauri state. The session mutex keeps interactions sequential.
pub struct AppState {
    pub session: Mutex<ClassifierSession>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let cache = Arc::new(ModelCache::new());
        Self {
            session: Mutex::new(ClassifierSession::from_config(config, cache)),
        }
    }
}
