use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    pub fn percent(&self) -> f32 {
        self.score * 100.0
    }
}

/// Top predictions, highest score first.
pub type ClassificationResult = Vec<Prediction>;

/// Prediction as shown on the page: title-cased label, score in percent.
#[derive(Debug, Serialize, Clone)]
pub struct PredictionView {
    pub label: String,
    pub display_label: String,
    pub score: f32,
    pub percent: f32,
}

impl From<&Prediction> for PredictionView {
    fn from(p: &Prediction) -> Self {
        Self {
            label: p.label.clone(),
            display_label: title_case(&p.label),
            score: p.score,
            percent: p.percent(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelOption {
    pub display_name: String,
    pub model_id: String,
    pub is_default: bool,
    pub loaded: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub model_id: String,
    pub loaded: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct HistoryItemView {
    pub id: usize,
    pub timestamp: String,
    pub file_name: String,
    pub model_name: String,
    pub top_prediction: PredictionView,
    pub all_predictions: Vec<PredictionView>,
    pub thumbnail: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifyResponse {
    Classified {
        model_name: String,
        predictions: Vec<PredictionView>,
        processed_image: Option<String>,
        recorded: bool,
    },
    ModelUnavailable {
        message: String,
    },
    Error {
        message: String,
        details: String,
    },
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest,
/// so "t-shirt" becomes "T-Shirt".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
