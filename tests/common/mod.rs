#![allow(dead_code)]

use async_trait::async_trait;
use garment_lense_lib::error::AppError;
use garment_lense_lib::services::background::BackgroundRemover;
use garment_lense_lib::services::classifier::labels::LabelMap;
use garment_lense_lib::services::classifier::model_manager::{
    Classifier, ModelCache, ModelLoader, ModelSource,
};
use garment_lense_lib::services::classifier::preprocess::{
    ImageProcessor, ImageProcessorConfig, Preprocessor, SizeSpec,
};
use garment_lense_lib::services::classifier::registry::ModelRegistry;
use garment_lense_lib::services::session::ClassifierSession;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use ndarray::Array4;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const VIT_NAME: &str = "Google ViT Base (General)";
pub const WARGON_NAME: &str = "Wargon Clothing Classifier";
pub const INPUT_SIDE: u32 = 16;

/// Scores each class by how close its index is to the image brightness, so
/// different images rank classes differently.
pub struct BrightnessClassifier {
    labels: LabelMap,
}

impl Classifier for BrightnessClassifier {
    fn forward(&self, pixel_values: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let side = INPUT_SIDE as usize;
        if pixel_values.shape() != [1, 3, side, side] {
            return Err(AppError::Inference(format!(
                "expected [1, 3, {side}, {side}], got {:?}",
                pixel_values.shape()
            )));
        }
        let mean = pixel_values.mean().unwrap_or(0.0);
        let n = self.labels.len().max(1) as f32;
        let target = (mean + 1.0) / 2.0 * (n - 1.0);
        Ok((0..self.labels.len())
            .map(|i| -((i as f32 - target).abs()))
            .collect())
    }

    fn id2label(&self) -> &LabelMap {
        &self.labels
    }

    fn set_id2label(&mut self, labels: LabelMap) {
        self.labels = labels;
    }
}

/// In-memory model source. Upstream labels are 1000 placeholders, like an
/// ImageNet head; the Wargon head has 27 unnamed classes.
#[derive(Default)]
pub struct FakeSource {
    pub classifier_fetches: AtomicUsize,
    pub offline: bool,
}

impl FakeSource {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    pub fn fetches(&self) -> usize {
        self.classifier_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelSource for FakeSource {
    async fn fetch_preprocessor(&self, model_id: &str) -> Result<Box<dyn Preprocessor>, AppError> {
        if self.offline {
            return Err(AppError::Download(format!(
                "Failed to download {}: connection reset",
                model_id
            )));
        }
        Ok(Box::new(ImageProcessor::new(ImageProcessorConfig {
            size: SizeSpec::Square(INPUT_SIDE),
            ..ImageProcessorConfig::default()
        })))
    }

    async fn fetch_classifier(&self, model_id: &str) -> Result<Box<dyn Classifier>, AppError> {
        self.classifier_fetches.fetch_add(1, Ordering::SeqCst);
        let classes = if model_id.contains("wargon") { 27 } else { 1000 };
        let labels: Vec<String> = (0..classes).map(|i| format!("LABEL_{}", i)).collect();
        Ok(Box::new(BrightnessClassifier {
            labels: LabelMap::from_labels(&labels),
        }))
    }
}

/// Keeps the left half of the image, like a garment on the left of a photo.
pub struct HalfRemover;

#[async_trait]
impl BackgroundRemover for HalfRemover {
    async fn remove(&self, image: DynamicImage) -> Result<DynamicImage, AppError> {
        let rgba = image.to_rgba8();
        let half = rgba.width() / 2;
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_fn(
            rgba.width(),
            rgba.height(),
            |x, y| {
                if x < half {
                    *rgba.get_pixel(x, y)
                } else {
                    Rgba([0, 0, 0, 0])
                }
            },
        )))
    }
}

pub struct BrokenRemover;

#[async_trait]
impl BackgroundRemover for BrokenRemover {
    async fn remove(&self, _image: DynamicImage) -> Result<DynamicImage, AppError> {
        Err(AppError::BackgroundRemoval("onnx session crashed".to_string()))
    }
}

pub fn session_with(source: Arc<FakeSource>, remover: Arc<dyn BackgroundRemover>) -> ClassifierSession {
    let registry = Arc::new(ModelRegistry::default());
    let loader = ModelLoader::new(source, registry.clone(), Arc::new(ModelCache::new()));
    ClassifierSession::new(registry, Arc::new(loader), remover)
}

pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}
