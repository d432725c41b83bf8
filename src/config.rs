use crate::services::classifier::inference::TOP_K;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_BACKGROUND_MODEL_URL: &str =
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx";

/// Runtime settings for the classifier and its model downloads.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directory holding one sub-directory per downloaded model
    pub models_dir: PathBuf,
    /// Base URL of a Hugging Face compatible hub
    pub hub_endpoint: String,
    /// Number of predictions kept per classification, at most [`TOP_K`]
    pub top_k: usize,
    /// Upper bound on a single model load, unbounded when `None`
    pub load_timeout: Option<Duration>,
    pub use_gpu: bool,
    pub intra_threads: usize,
    /// Where the U2-Net segmentation weights are fetched from
    pub background_model_url: String,
}

impl AppConfig {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            models_dir: data_dir.join("models"),
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            top_k: TOP_K,
            load_timeout: None,
            use_gpu: false,
            intra_threads: 4,
            background_model_url: DEFAULT_BACKGROUND_MODEL_URL.to_string(),
        }
    }

    /// Defaults for `data_dir`, overridden by environment variables.
    pub fn from_env(data_dir: &Path) -> Self {
        Self::new(data_dir).with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("GARMENT_LENSE_MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = lookup("HF_ENDPOINT") {
            self.hub_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(top_k) = parse_var::<usize>(&lookup, "GARMENT_LENSE_TOP_K") {
            self.top_k = top_k.clamp(1, TOP_K);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GARMENT_LENSE_LOAD_TIMEOUT_SECS") {
            self.load_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(use_gpu) = parse_var::<bool>(&lookup, "GARMENT_LENSE_USE_GPU") {
            self.use_gpu = use_gpu;
        }
        if let Some(threads) = parse_var::<usize>(&lookup, "GARMENT_LENSE_INTRA_THREADS") {
            self.intra_threads = threads.max(1);
        }
        if let Some(url) = lookup("GARMENT_LENSE_BG_MODEL_URL") {
            self.background_model_url = url;
        }
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}
