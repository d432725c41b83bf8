use std::collections::{BTreeMap, HashMap};

/// Garment taxonomy of the Wargon clothing classifier, in class-index order.
/// The published model config does not carry these names.
pub const WARGON_LABELS: [&str; 27] = [
    "Blazer",
    "Blouse",
    "Cardigan",
    "Dress",
    "Hoodie",
    "Jacket",
    "Jeans",
    "Nightgown",
    "Outerwear",
    "Pajamas",
    "Rain jacket",
    "Rain trousers",
    "Robe",
    "Shirt",
    "Shorts",
    "Skirt",
    "Sweater",
    "T-shirt",
    "Tank top",
    "Tights",
    "Top",
    "Training top",
    "Trousers",
    "Tunic",
    "Vest",
    "Winter jacket",
    "Winter trousers",
];

/// Class index to label mapping with its inverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    id2label: BTreeMap<usize, String>,
    label2id: HashMap<String, usize>,
}

impl LabelMap {
    pub fn new(id2label: BTreeMap<usize, String>) -> Self {
        let label2id = id2label
            .iter()
            .map(|(idx, label)| (label.clone(), *idx))
            .collect();
        Self { id2label, label2id }
    }

    /// Labels given in index order.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self::new(
            labels
                .iter()
                .enumerate()
                .map(|(idx, label)| (idx, label.as_ref().to_string()))
                .collect(),
        )
    }

    /// Reads the `id2label` object of a model `config.json`.
    /// A config without one yields an empty map.
    pub fn from_config(config: &serde_json::Value) -> Self {
        let Some(id2label) = config["id2label"].as_object() else {
            return Self::default();
        };

        let labels = id2label
            .iter()
            .filter_map(|(k, v)| {
                let idx = k.parse::<usize>().ok()?;
                let label = v.as_str().unwrap_or("unknown").to_string();
                Some((idx, label))
            })
            .collect();
        Self::new(labels)
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.id2label.get(&idx).map(String::as_str)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.label2id.get(label).copied()
    }

    pub fn id2label(&self) -> &BTreeMap<usize, String> {
        &self.id2label
    }

    pub fn label2id(&self) -> &HashMap<String, usize> {
        &self.label2id
    }

    pub fn len(&self) -> usize {
        self.id2label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2label.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_labels_builds_inverse() {
        let map = LabelMap::from_labels(&WARGON_LABELS);
        assert_eq!(map.len(), 27);
        assert_eq!(map.label(0), Some("Blazer"));
        assert_eq!(map.label(26), Some("Winter trousers"));
        for (idx, label) in map.id2label() {
            assert_eq!(map.index_of(label), Some(*idx));
        }
        assert_eq!(map.label2id().len(), 27);
    }

    #[test]
    fn test_from_config_sorts_numeric_keys() {
        let config = json!({
            "id2label": { "10": "ten", "2": "two", "0": "zero" }
        });
        let map = LabelMap::from_config(&config);
        let keys: Vec<usize> = map.id2label().keys().copied().collect();
        assert_eq!(keys, vec![0, 2, 10]);
        assert_eq!(map.index_of("ten"), Some(10));
    }

    #[test]
    fn test_from_config_without_id2label() {
        let map = LabelMap::from_config(&json!({ "model_type": "vit" }));
        assert!(map.is_empty());
    }
}
