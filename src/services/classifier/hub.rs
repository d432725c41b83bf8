use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::classifier::labels::LabelMap;
use crate::services::classifier::model_manager::{Classifier, ModelSource};
use crate::services::classifier::preprocess::{ImageProcessor, Preprocessor};
use crate::services::classifier::registry::ModelRegistry;
use crate::services::download::download_file;
use crate::services::onnx::{load_session, SessionSettings};
use async_trait::async_trait;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const CONFIG_FILE: &str = "config.json";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
const MODEL_FILE: &str = "model.onnx";
const DEFAULT_ONNX_FILE: &str = "onnx/model.onnx";

/// Classifier backed by an ONNX Runtime session.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    labels: LabelMap,
}

impl OnnxClassifier {
    pub fn new(session: Session, labels: LabelMap) -> Result<Self, AppError> {
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| AppError::Inference("Model declares no inputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn forward(&self, pixel_values: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let input_tensor = Value::from_array(pixel_values)
            .map_err(|e| AppError::Inference(format!("Failed to create tensor value: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Inference("Model session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| AppError::Inference(format!("Inference failed: {}", e)))?;

        // Logits are the first output: [1, num_labels]
        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(data.to_vec())
    }

    fn id2label(&self) -> &LabelMap {
        &self.labels
    }

    fn set_id2label(&mut self, labels: LabelMap) {
        self.labels = labels;
    }
}

/// Fetches models from a Hugging Face compatible hub into a local directory.
///
/// Each model gets `<models_dir>/<org>--<name>/` holding `config.json`,
/// `preprocessor_config.json` and `model.onnx`. Files already present are used
/// as-is, which is also how a locally exported model is supplied.
#[derive(Clone)]
pub struct HubModelSource {
    models_dir: PathBuf,
    endpoint: String,
    registry: Arc<ModelRegistry>,
    settings: SessionSettings,
    client: reqwest::Client,
}

impl HubModelSource {
    pub fn new(config: &AppConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            models_dir: config.models_dir.clone(),
            endpoint: config.hub_endpoint.trim_end_matches('/').to_string(),
            registry,
            settings: SessionSettings {
                use_gpu: config.use_gpu,
                intra_threads: config.intra_threads,
            },
            client: reqwest::Client::new(),
        }
    }

    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(model_id.replace('/', "--"))
    }

    pub fn file_url(&self, repo: &str, file: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.endpoint, repo, file)
    }

    pub fn is_downloaded(&self, model_id: &str) -> bool {
        let dir = self.model_dir(model_id);
        [CONFIG_FILE, PREPROCESSOR_FILE, MODEL_FILE]
            .iter()
            .all(|f| dir.join(f).exists())
    }

    fn onnx_location(&self, model_id: &str) -> (String, String) {
        match self.registry.by_id(model_id) {
            Some(spec) => (spec.onnx_repo.to_string(), spec.onnx_file.to_string()),
            None => (model_id.to_string(), DEFAULT_ONNX_FILE.to_string()),
        }
    }

    async fn ensure_file(&self, model_id: &str, repo: &str, remote: &str, local: &str) -> Result<PathBuf, AppError> {
        let path = self.model_dir(model_id).join(local);
        if !path.exists() {
            download_file(&self.client, &self.file_url(repo, remote), &path).await?;
        }
        Ok(path)
    }
}

#[async_trait]
impl ModelSource for HubModelSource {
    async fn fetch_preprocessor(&self, model_id: &str) -> Result<Box<dyn Preprocessor>, AppError> {
        let path = self
            .ensure_file(model_id, model_id, PREPROCESSOR_FILE, PREPROCESSOR_FILE)
            .await?;
        Ok(Box::new(ImageProcessor::from_file(&path)?))
    }

    async fn fetch_classifier(&self, model_id: &str) -> Result<Box<dyn Classifier>, AppError> {
        let config_path = self
            .ensure_file(model_id, model_id, CONFIG_FILE, CONFIG_FILE)
            .await?;
        let config_content = tokio::fs::read_to_string(&config_path).await?;
        let config: serde_json::Value = serde_json::from_str(&config_content)?;
        let labels = LabelMap::from_config(&config);

        let (repo, remote) = self.onnx_location(model_id);
        let model_path = self.ensure_file(model_id, &repo, &remote, MODEL_FILE).await?;
        let session = load_session(model_path, self.settings).await?;

        Ok(Box::new(OnnxClassifier::new(session, labels)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::model_manager::{ModelCache, ModelLoader};
    use std::path::Path;

    fn source(data_dir: &Path) -> HubModelSource {
        let mut config = AppConfig::new(data_dir);
        config.hub_endpoint = "http://127.0.0.1:9/".to_string();
        HubModelSource::new(&config, Arc::new(ModelRegistry::default()))
    }

    #[test]
    fn test_model_dir_layout() {
        let src = source(Path::new("/data"));
        assert_eq!(
            src.model_dir("google/vit-base-patch16-224"),
            PathBuf::from("/data/models/google--vit-base-patch16-224")
        );
    }

    #[test]
    fn test_onnx_location_from_registry() {
        let src = source(Path::new("/data"));
        let (repo, file) = src.onnx_location("google/vit-base-patch16-224");
        assert_eq!(repo, "Xenova/vit-base-patch16-224");
        assert_eq!(
            src.file_url(&repo, &file),
            "http://127.0.0.1:9/Xenova/vit-base-patch16-224/resolve/main/onnx/model.onnx"
        );

        let (repo, file) = src.onnx_location("acme/shirts");
        assert_eq!((repo.as_str(), file.as_str()), ("acme/shirts", DEFAULT_ONNX_FILE));
    }

    #[tokio::test]
    async fn test_unreachable_hub_yields_no_model() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ModelRegistry::default());
        let hub = Arc::new(source(dir.path()));
        let loader = ModelLoader::new(hub.clone(), registry, Arc::new(ModelCache::new()));

        assert!(loader.load("google/vit-base-patch16-224").await.is_none());
        assert!(!hub.is_downloaded("google/vit-base-patch16-224"));
    }

    #[tokio::test]
    async fn test_local_preprocessor_config_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path());
        let model_dir = src.model_dir("acme/shirts");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join(PREPROCESSOR_FILE), r#"{"size": 32}"#).unwrap();

        let preprocessor = src.fetch_preprocessor("acme/shirts").await.unwrap();
        let img = image::DynamicImage::new_rgb8(50, 40);
        let tensor = preprocessor.preprocess(&img).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }
}
