use crate::error::AppError;
use crate::models::classify_types::{ClassificationResult, Prediction};
use crate::services::classifier::model_manager::LoadedModel;
use image::DynamicImage;

pub const TOP_K: usize = 5;

/// Top five predictions for `image`.
pub fn classify(image: &DynamicImage, loaded: &LoadedModel) -> Result<ClassificationResult, AppError> {
    classify_top_k(image, loaded, TOP_K)
}

/// Runs the full pipeline: RGB conversion, preprocessing, forward pass,
/// softmax and top-k. Errors are returned to the caller untouched.
pub fn classify_top_k(
    image: &DynamicImage,
    loaded: &LoadedModel,
    top_k: usize,
) -> Result<ClassificationResult, AppError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(AppError::Inference(format!(
            "Cannot classify an image of size {}x{}",
            image.width(),
            image.height()
        )));
    }

    // Alpha and extra channels are dropped here.
    let converted;
    let rgb = match image {
        DynamicImage::ImageRgb8(_) => image,
        other => {
            converted = DynamicImage::ImageRgb8(other.to_rgb8());
            &converted
        }
    };

    let input = loaded.preprocessor.preprocess(rgb)?;
    let logits = loaded.classifier.forward(input)?;
    let labels = loaded.classifier.id2label();

    if logits.is_empty() {
        return Err(AppError::Inference("Model produced no scores".to_string()));
    }
    if logits.len() != labels.len() {
        return Err(AppError::Inference(format!(
            "Model produced {} scores for {} labels",
            logits.len(),
            labels.len()
        )));
    }

    let probabilities = softmax(&logits);

    top_indices(&probabilities, top_k)
        .into_iter()
        .map(|(idx, score)| {
            let label = labels.label(idx).ok_or_else(|| {
                AppError::Inference(format!("No label for class index {}", idx))
            })?;
            Ok(Prediction::new(label, score))
        })
        .collect()
}

/// Softmax with the max logit subtracted first.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let exp_sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / exp_sum).collect()
}

/// The `k` highest values with their indices, highest first. Equal values
/// keep index order.
pub fn top_indices(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}
