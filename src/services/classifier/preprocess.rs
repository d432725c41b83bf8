use crate::error::AppError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use serde::Deserialize;
use std::path::Path;

/// Turns a decoded RGB image into the NCHW tensor a classifier expects.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, image: &DynamicImage) -> Result<Array4<f32>, AppError>;
}

/// `size` / `crop_size` as written in `preprocessor_config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Square(u32),
    Exact { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
}

/// Subset of the Hugging Face image processor settings that affect the tensor.
/// Missing keys fall back to the ViT image processor defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageProcessorConfig {
    pub do_resize: bool,
    pub size: SizeSpec,
    pub resample: Option<u8>,
    pub crop_pct: Option<f32>,
    pub do_center_crop: bool,
    pub crop_size: Option<SizeSpec>,
    pub do_rescale: bool,
    pub rescale_factor: f32,
    pub do_normalize: bool,
    pub image_mean: [f32; 3],
    pub image_std: [f32; 3],
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: SizeSpec::Exact {
                height: 224,
                width: 224,
            },
            resample: Some(2),
            crop_pct: None,
            do_center_crop: false,
            crop_size: None,
            do_rescale: true,
            rescale_factor: 1.0 / 255.0,
            do_normalize: true,
            image_mean: [0.5, 0.5, 0.5],
            image_std: [0.5, 0.5, 0.5],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: ImageProcessorConfig,
}

impl ImageProcessor {
    pub fn new(config: ImageProcessorConfig) -> Self {
        Self { config }
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Inference(format!(
                "Failed to read preprocessor config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn config(&self) -> &ImageProcessorConfig {
        &self.config
    }

    /// PIL resampling codes as stored by transformers.
    fn filter(&self) -> FilterType {
        match self.config.resample {
            Some(0) => FilterType::Nearest,
            Some(1) => FilterType::Lanczos3,
            Some(3) => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        }
    }

    fn resize(&self, img: &DynamicImage) -> DynamicImage {
        let filter = self.filter();
        match self.config.size {
            SizeSpec::Square(side) => img.resize_exact(side, side, filter),
            SizeSpec::Exact { height, width } => img.resize_exact(width, height, filter),
            SizeSpec::ShortestEdge { shortest_edge } => match self.config.crop_pct {
                // Resize shortest edge to ceil(size / crop_pct), then center crop
                Some(crop_pct) if shortest_edge < 384 && crop_pct > 0.0 => {
                    let resize_size = (shortest_edge as f32 / crop_pct).ceil() as u32;
                    let resized = resize_shortest_edge(img, resize_size, filter);
                    center_crop(&resized, shortest_edge, shortest_edge)
                }
                Some(_) => img.resize_exact(shortest_edge, shortest_edge, filter),
                None => resize_shortest_edge(img, shortest_edge, filter),
            },
        }
    }
}

impl Preprocessor for ImageProcessor {
    fn preprocess(&self, image: &DynamicImage) -> Result<Array4<f32>, AppError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(AppError::Inference(format!(
                "Cannot preprocess an image of size {}x{}",
                w, h
            )));
        }

        let mut img = if self.config.do_resize {
            self.resize(image)
        } else {
            image.clone()
        };

        if self.config.do_center_crop {
            match self.config.crop_size {
                Some(SizeSpec::Square(side)) => img = center_crop(&img, side, side),
                Some(SizeSpec::Exact { height, width }) => img = center_crop(&img, width, height),
                Some(SizeSpec::ShortestEdge { shortest_edge }) => {
                    img = center_crop(&img, shortest_edge, shortest_edge)
                }
                None => {}
            }
        }

        to_tensor(&img, &self.config)
    }
}

fn resize_shortest_edge(img: &DynamicImage, target: u32, filter: FilterType) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let (new_w, new_h) = if w < h {
        (target, ((h as f32 / w as f32) * target as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * target as f32).round() as u32, target)
    };
    img.resize_exact(new_w.max(1), new_h.max(1), filter)
}

fn center_crop(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let crop_x = img.width().saturating_sub(width) / 2;
    let crop_y = img.height().saturating_sub(height) / 2;
    img.crop_imm(crop_x, crop_y, width, height)
}

fn to_tensor(img: &DynamicImage, config: &ImageProcessorConfig) -> Result<Array4<f32>, AppError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let scale = if config.do_rescale {
        config.rescale_factor
    } else {
        1.0
    };
    let (mean, std) = if config.do_normalize {
        (config.image_mean, config.image_std)
    } else {
        ([0.0; 3], [1.0; 3])
    };

    // Pass 1: scale and normalize in HWC order (contiguous reads and writes).
    let raw = rgb.into_raw();
    let hw = (width * height) as usize;
    let mut interleaved = vec![0f32; 3 * hw];
    for (i, pixel) in raw.chunks_exact(3).enumerate() {
        let off = i * 3;
        for c in 0..3 {
            interleaved[off + c] = (pixel[c] as f32 * scale - mean[c]) / std[c];
        }
    }

    // Pass 2: HWC -> CHW in tiles so the source and the three channel
    // write-heads stay in L1.
    let mut data = vec![0f32; 3 * hw];
    const TILE: usize = 1024;
    for base in (0..hw).step_by(TILE) {
        let end = (base + TILE).min(hw);
        for i in base..end {
            let src = i * 3;
            data[i] = interleaved[src];
            data[hw + i] = interleaved[src + 1];
            data[2 * hw + i] = interleaved[src + 2];
        }
    }

    Array4::from_shape_vec((1, 3, height as usize, width as usize), data)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}
