use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Model {model_id} is unavailable: {reason}")]
    ModelUnavailable { model_id: String, reason: String },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Background removal failed: {0}")]
    BackgroundRemoval(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn unavailable(model_id: &str, reason: impl Into<String>) -> Self {
        AppError::ModelUnavailable {
            model_id: model_id.to_string(),
            reason: reason.into(),
        }
    }
}

// Commands hand errors to the page as plain strings.
impl Serialize for AppError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::InvalidImage(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Download(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_display_string() {
        let err = AppError::unavailable("org/model", "offline");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Model org/model is unavailable: offline\"");
    }
}
