//! Background removal with the U2-Net salient object segmentation model.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::download::download_file;
use crate::services::onnx::{load_session, SessionSettings};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{error, info};

pub const U2NET_INPUT_SIZE: u32 = 320;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Returns an RGBA image whose background pixels are transparent.
    async fn remove(&self, image: DynamicImage) -> Result<DynamicImage, AppError>;
}

/// Runs `remover`, logging any failure before handing it back to the caller.
pub async fn remove_background(
    remover: &dyn BackgroundRemover,
    image: DynamicImage,
) -> Result<DynamicImage, AppError> {
    remover.remove(image).await.map_err(|e| {
        error!(error = ?e, "Error in remove_background: {}", e);
        e
    })
}

/// U2-Net remover. The weights are downloaded on first use and the session is
/// kept for the lifetime of the remover.
pub struct U2NetRemover {
    model_path: PathBuf,
    url: String,
    settings: SessionSettings,
    client: reqwest::Client,
    session: OnceCell<Arc<Mutex<Session>>>,
}

impl U2NetRemover {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            model_path: config.models_dir.join("u2net.onnx"),
            url: config.background_model_url.clone(),
            settings: SessionSettings {
                use_gpu: config.use_gpu,
                intra_threads: config.intra_threads,
            },
            client: reqwest::Client::new(),
            session: OnceCell::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.session.initialized()
    }

    async fn session(&self) -> Result<Arc<Mutex<Session>>, AppError> {
        self.session
            .get_or_try_init(|| async {
                if !self.model_path.exists() {
                    download_file(&self.client, &self.url, &self.model_path).await?;
                }
                info!("Loading background removal model {}", self.model_path.display());
                let session = load_session(self.model_path.clone(), self.settings).await?;
                Ok::<_, AppError>(Arc::new(Mutex::new(session)))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl BackgroundRemover for U2NetRemover {
    async fn remove(&self, image: DynamicImage) -> Result<DynamicImage, AppError> {
        let session = self
            .session()
            .await
            .map_err(|e| AppError::BackgroundRemoval(e.to_string()))?;

        tokio::task::spawn_blocking(move || segment(&session, &image))
            .await
            .map_err(|e| AppError::BackgroundRemoval(format!("Segmentation task failed: {}", e)))?
    }
}

fn segment(session: &Mutex<Session>, image: &DynamicImage) -> Result<DynamicImage, AppError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(AppError::BackgroundRemoval(format!(
            "Cannot segment an image of size {}x{}",
            width, height
        )));
    }

    let rgb = image.to_rgb8();
    let input = Value::from_array(u2net_input(&rgb))
        .map_err(|e| AppError::BackgroundRemoval(format!("Failed to create tensor value: {}", e)))?;

    let mut session = session
        .lock()
        .map_err(|_| AppError::BackgroundRemoval("Segmentation session lock poisoned".to_string()))?;
    let input_name = session
        .inputs()
        .first()
        .map(|i| i.name().to_string())
        .ok_or_else(|| AppError::BackgroundRemoval("Model declares no inputs".to_string()))?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input])
        .map_err(|e| AppError::BackgroundRemoval(format!("Segmentation failed: {}", e)))?;

    // First output is the fused saliency map [1, 1, 320, 320]
    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| AppError::BackgroundRemoval("Model produced no outputs".to_string()))?;
    let (_, data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError::BackgroundRemoval(format!("Failed to extract mask: {}", e)))?;

    let side = U2NET_INPUT_SIZE;
    let plane = (side * side) as usize;
    if data.len() < plane {
        return Err(AppError::BackgroundRemoval(format!(
            "Mask has {} values, expected at least {}",
            data.len(),
            plane
        )));
    }

    let mask = mask_from_prediction(&data[..plane], side, side)?;
    let mask = image::imageops::resize(&mask, width, height, FilterType::Lanczos3);

    Ok(DynamicImage::ImageRgba8(cutout(&rgb, &mask)))
}

/// 320x320 NCHW input: pixels divided by the image maximum, then ImageNet
/// normalized.
pub fn u2net_input(rgb: &RgbImage) -> Array4<f32> {
    let resized = image::imageops::resize(rgb, U2NET_INPUT_SIZE, U2NET_INPUT_SIZE, FilterType::Lanczos3);
    let max = resized.as_raw().iter().copied().max().unwrap_or(0) as f32;
    let max = max.max(1e-6);

    let size = U2NET_INPUT_SIZE as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / max - MEAN[c]) / STD[c];
        }
    }
    tensor
}

/// Min-max normalizes a saliency map into an 8-bit mask. A flat map carries no
/// contrast to stretch and is clamped to [0, 1] instead.
pub fn mask_from_prediction(pred: &[f32], width: u32, height: u32) -> Result<GrayImage, AppError> {
    let (min, max) = pred
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    let pixels = pred
        .iter()
        .map(|&v| {
            let norm = if range > f32::EPSILON {
                (v - min) / range
            } else {
                v.clamp(0.0, 1.0)
            };
            (norm * 255.0).round() as u8
        })
        .collect();

    GrayImage::from_raw(width, height, pixels)
        .ok_or_else(|| AppError::BackgroundRemoval("Mask does not match its dimensions".to_string()))
}

/// Composites `rgb` over a transparent black background using `mask` as alpha.
pub fn cutout(rgb: &RgbImage, mask: &GrayImage) -> RgbaImage {
    let mut out = RgbaImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let alpha = mask.get_pixel_checked(x, y).map(|m| m[0]).unwrap_or(0);
        let scale = |v: u8| ((v as u32 * alpha as u32 + 127) / 255) as u8;
        out.put_pixel(
            x,
            y,
            image::Rgba([scale(pixel[0]), scale(pixel[1]), scale(pixel[2]), alpha]),
        );
    }
    out
}
