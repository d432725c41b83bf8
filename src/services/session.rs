use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::classify_types::{
    ClassificationResult, ClassifyResponse, HistoryItemView, ModelOption, PredictionView,
};
use crate::services::background::{remove_background, BackgroundRemover, U2NetRemover};
use crate::services::classifier::hub::HubModelSource;
use crate::services::classifier::inference;
use crate::services::classifier::model_manager::{ModelCache, ModelLoader};
use crate::services::classifier::registry::ModelRegistry;
use crate::services::history::{HistoryEntry, HistoryStore};
use crate::services::image_service;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const GENERIC_ERROR_MESSAGE: &str =
    "We ran into an issue analyzing your image. Please try another image or model.";
pub const MODEL_UNAVAILABLE_MESSAGE: &str =
    "Model failed to load. Please try selecting a different model.";
pub const DEFAULT_FILE_NAME: &str = "unknown.jpg";

/// One upload as received from the page.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
    /// Registry display name
    pub model_name: String,
    pub remove_background: bool,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Classified {
        model_name: String,
        predictions: ClassificationResult,
        /// Cutout shown next to the upload when background removal ran
        processed_image: Option<DynamicImage>,
        /// Whether a history entry was added
        recorded: bool,
    },
    ModelUnavailable {
        model_name: String,
    },
    Failed {
        message: String,
        details: String,
    },
}

/// Page state for one user: the selected collaborators plus the history.
///
/// Every failure stops at [`ClassifierSession::handle_upload`]; the session
/// stays usable for the next upload.
pub struct ClassifierSession {
    registry: Arc<ModelRegistry>,
    loader: Arc<ModelLoader>,
    remover: Arc<dyn BackgroundRemover>,
    history: HistoryStore,
    top_k: usize,
}

impl ClassifierSession {
    pub fn new(
        registry: Arc<ModelRegistry>,
        loader: Arc<ModelLoader>,
        remover: Arc<dyn BackgroundRemover>,
    ) -> Self {
        Self {
            registry,
            loader,
            remover,
            history: HistoryStore::new(),
            top_k: inference::TOP_K,
        }
    }

    /// Hub-backed models and U2-Net background removal sharing `cache`.
    pub fn from_config(config: &AppConfig, cache: Arc<ModelCache>) -> Self {
        let registry = Arc::new(ModelRegistry::default());
        let source = Arc::new(HubModelSource::new(config, registry.clone()));
        let loader = ModelLoader::new(source, registry.clone(), cache).with_timeout(config.load_timeout);
        let remover = Arc::new(U2NetRemover::new(config));

        Self::new(registry, Arc::new(loader), remover).with_top_k(config.top_k)
    }

    /// Predictions kept per upload, between 1 and [`inference::TOP_K`].
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.clamp(1, inference::TOP_K);
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn clear_history(&mut self) {
        info!("Clearing {} history entries", self.history.len());
        self.history.clear();
    }

    pub async fn model_options(&self) -> Vec<ModelOption> {
        let default_id = self.registry.default_model().map(|s| s.model_id);
        let mut options = Vec::new();
        for spec in self.registry.specs() {
            options.push(ModelOption {
                display_name: spec.display_name.to_string(),
                model_id: spec.model_id.to_string(),
                is_default: Some(spec.model_id) == default_id,
                loaded: self.loader.is_loaded(spec.model_id).await,
            });
        }
        options
    }

    pub async fn is_model_loaded(&self, model_name: &str) -> Result<bool, AppError> {
        let spec = self
            .registry
            .resolve(model_name)
            .ok_or_else(|| AppError::UnknownModel(model_name.to_string()))?;
        Ok(self.loader.is_loaded(spec.model_id).await)
    }

    pub async fn handle_upload(&mut self, upload: Upload) -> UploadOutcome {
        let file_name = upload
            .file_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        match self.classify_upload(upload, &file_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(file_name = %file_name, error = ?e, "Error processing image: {}", e);
                UploadOutcome::Failed {
                    message: GENERIC_ERROR_MESSAGE.to_string(),
                    details: e.to_string(),
                }
            }
        }
    }

    async fn classify_upload(&mut self, upload: Upload, file_name: &str) -> Result<UploadOutcome, AppError> {
        let image = image_service::decode_upload(&upload.bytes)?;

        let processed_image = if upload.remove_background {
            Some(remove_background(self.remover.as_ref(), image.clone()).await?)
        } else {
            None
        };

        let spec = *self
            .registry
            .resolve(&upload.model_name)
            .ok_or_else(|| AppError::UnknownModel(upload.model_name.clone()))?;

        let Some(model) = self.loader.load(spec.model_id).await else {
            warn!("Model {} unavailable for {}", spec.model_id, file_name);
            return Ok(UploadOutcome::ModelUnavailable {
                model_name: upload.model_name,
            });
        };

        let to_classify = processed_image.clone().unwrap_or_else(|| image.clone());
        let top_k = self.top_k;
        let predictions = tokio::task::spawn_blocking(move || {
            inference::classify_top_k(&to_classify, &model, top_k)
        })
        .await
        .map_err(|e| AppError::Inference(format!("Classification task failed: {}", e)))??;

        let entry = HistoryEntry::new(
            self.history.next_id(),
            file_name,
            upload.model_name.clone(),
            predictions.clone(),
            image,
        )
        .ok_or_else(|| AppError::Inference("Model returned no predictions".to_string()))?;
        let recorded = self.history.append(entry);

        info!(
            "Classified {} with {}: {} ({:.1}%)",
            file_name,
            upload.model_name,
            predictions[0].label,
            predictions[0].percent()
        );

        Ok(UploadOutcome::Classified {
            model_name: upload.model_name,
            predictions,
            processed_image,
            recorded,
        })
    }

    /// History for rendering, newest first.
    pub fn history_views(&self) -> Vec<HistoryItemView> {
        self.history
            .latest_first()
            .map(|entry| HistoryItemView {
                id: entry.id,
                timestamp: entry.time_label(),
                file_name: entry.file_name.clone(),
                model_name: entry.model_name.clone(),
                top_prediction: PredictionView::from(&entry.top_prediction),
                all_predictions: entry.all_predictions.iter().map(PredictionView::from).collect(),
                thumbnail: image_service::thumbnail_data_uri(&entry.image).unwrap_or_else(|e| {
                    warn!("Failed to render thumbnail for {}: {}", entry.file_name, e);
                    String::new()
                }),
            })
            .collect()
    }
}

impl From<UploadOutcome> for ClassifyResponse {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Classified {
                model_name,
                predictions,
                processed_image,
                recorded,
            } => {
                let processed_image = processed_image.and_then(|img| {
                    image_service::png_data_uri(&img)
                        .map_err(|e| warn!("Failed to encode processed image: {}", e))
                        .ok()
                });
                ClassifyResponse::Classified {
                    model_name,
                    predictions: predictions.iter().map(PredictionView::from).collect(),
                    processed_image,
                    recorded,
                }
            }
            UploadOutcome::ModelUnavailable { .. } => ClassifyResponse::ModelUnavailable {
                message: MODEL_UNAVAILABLE_MESSAGE.to_string(),
            },
            UploadOutcome::Failed { message, details } => ClassifyResponse::Error { message, details },
        }
    }
}
