use crate::models::classify_types::Prediction;
use chrono::{DateTime, Local};
use image::DynamicImage;

/// One completed classification.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: usize,
    pub timestamp: DateTime<Local>,
    pub file_name: String,
    pub model_name: String,
    pub top_prediction: Prediction,
    pub all_predictions: Vec<Prediction>,
    /// The upload as received, before any background removal
    pub image: DynamicImage,
}

impl HistoryEntry {
    /// `None` when `predictions` is empty: an entry always has a top prediction
    /// equal to the first of its predictions.
    pub fn new(
        id: usize,
        file_name: impl Into<String>,
        model_name: impl Into<String>,
        predictions: Vec<Prediction>,
        image: DynamicImage,
    ) -> Option<Self> {
        let top_prediction = predictions.first()?.clone();
        Some(Self {
            id,
            timestamp: Local::now(),
            file_name: file_name.into(),
            model_name: model_name.into(),
            top_prediction,
            all_predictions: predictions,
            image,
        })
    }

    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Past classifications of one session, oldest first.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends unless the previous entry has the same file name, so re-running
    /// the same upload does not record it twice. Returns whether it was added.
    pub fn append(&mut self, entry: HistoryEntry) -> bool {
        if let Some(last) = self.entries.last() {
            if last.file_name == entry.file_name {
                return false;
            }
        }
        self.entries.push(entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Id for the next entry.
    pub fn next_id(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
