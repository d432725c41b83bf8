use crate::error::AppError;
use crate::services::classifier::labels::LabelMap;
use crate::services::classifier::preprocess::Preprocessor;
use crate::services::classifier::registry::ModelRegistry;
use async_trait::async_trait;
use ndarray::Array4;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Forward pass of an image classifier plus its class labels.
pub trait Classifier: Send + Sync {
    /// Raw logits for a batch of one, one score per class.
    fn forward(&self, pixel_values: Array4<f32>) -> Result<Vec<f32>, AppError>;

    fn id2label(&self) -> &LabelMap;

    fn set_id2label(&mut self, labels: LabelMap);
}

/// Where preprocessors and classifiers come from.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn fetch_preprocessor(&self, model_id: &str) -> Result<Box<dyn Preprocessor>, AppError>;

    async fn fetch_classifier(&self, model_id: &str) -> Result<Box<dyn Classifier>, AppError>;
}

/// A preprocessor paired with the classifier it was trained for.
pub struct LoadedModel {
    pub model_id: String,
    pub preprocessor: Box<dyn Preprocessor>,
    pub classifier: Box<dyn Classifier>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model_id", &self.model_id)
            .field("labels", &self.classifier.id2label().len())
            .finish()
    }
}

/// Loaded models keyed by model identifier. Entries are never evicted.
#[derive(Default)]
pub struct ModelCache {
    entries: Mutex<HashMap<String, Arc<LoadedModel>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, model_id: &str) -> bool {
        self.entries.lock().await.contains_key(model_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

/// Resolves a model identifier to a ready-to-run [`LoadedModel`].
///
/// Results are cached per identifier in the injected [`ModelCache`]; the cache
/// lock is held for the whole load so two callers asking for the same model
/// never fetch it twice. Failures are logged and reported as `None`, and are
/// not cached.
pub struct ModelLoader {
    source: Arc<dyn ModelSource>,
    registry: Arc<ModelRegistry>,
    cache: Arc<ModelCache>,
    timeout: Option<Duration>,
}

impl ModelLoader {
    pub fn new(source: Arc<dyn ModelSource>, registry: Arc<ModelRegistry>, cache: Arc<ModelCache>) -> Self {
        Self {
            source,
            registry,
            cache,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub async fn is_loaded(&self, model_id: &str) -> bool {
        self.cache.contains(model_id).await
    }

    pub async fn load(&self, model_id: &str) -> Option<Arc<LoadedModel>> {
        let mut entries = self.cache.entries.lock().await;

        if let Some(model) = entries.get(model_id) {
            debug!("Model cache hit: {}", model_id);
            return Some(model.clone());
        }

        info!("Loading model {}", model_id);
        match self.fetch_with_timeout(model_id).await {
            Ok(model) => {
                info!(
                    "Loaded model {} ({} labels)",
                    model_id,
                    model.classifier.id2label().len()
                );
                let model = Arc::new(model);
                entries.insert(model_id.to_string(), model.clone());
                Some(model)
            }
            Err(e) => {
                error!(model_id = %model_id, error = ?e, "Failed to load model {}: {}", model_id, e);
                None
            }
        }
    }

    async fn fetch_with_timeout(&self, model_id: &str) -> Result<LoadedModel, AppError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch(model_id))
                .await
                .map_err(|_| {
                    AppError::unavailable(model_id, format!("load timed out after {:?}", limit))
                })?,
            None => self.fetch(model_id).await,
        }
    }

    async fn fetch(&self, model_id: &str) -> Result<LoadedModel, AppError> {
        let preprocessor = self.source.fetch_preprocessor(model_id).await?;
        let mut classifier = self.source.fetch_classifier(model_id).await?;

        if let Some(labels) = self.registry.label_override(model_id) {
            debug!("Applying {}-entry label override to {}", labels.len(), model_id);
            classifier.set_id2label(LabelMap::from_labels(labels));
        }

        Ok(LoadedModel {
            model_id: model_id.to_string(),
            preprocessor,
            classifier,
        })
    }
}
