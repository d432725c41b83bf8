use crate::services::classifier::labels::WARGON_LABELS;

/// One selectable model and where its weights live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub display_name: &'static str,
    /// Hub repository with `config.json` and `preprocessor_config.json`
    pub model_id: &'static str,
    /// Hub repository holding the ONNX export
    pub onnx_repo: &'static str,
    pub onnx_file: &'static str,
    /// Replaces the classifier's `id2label` at load time
    pub label_override: Option<&'static [&'static str]>,
}

pub const DEFAULT_MODELS: &[ModelSpec] = &[
    ModelSpec {
        display_name: "Google ViT Base (General)",
        model_id: "google/vit-base-patch16-224",
        onnx_repo: "Xenova/vit-base-patch16-224",
        onnx_file: "onnx/model.onnx",
        label_override: None,
    },
    ModelSpec {
        display_name: "Wargon Clothing Classifier",
        model_id: "wargoninnovation/wargon-clothing-classifier",
        onnx_repo: "wargoninnovation/wargon-clothing-classifier",
        onnx_file: "onnx/model.onnx",
        label_override: Some(&WARGON_LABELS),
    },
];

/// Read-only table of selectable models, in display order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    specs: Vec<ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MODELS.to_vec())
    }
}

impl ModelRegistry {
    pub fn new(specs: Vec<ModelSpec>) -> Self {
        Self { specs }
    }

    pub fn resolve(&self, display_name: &str) -> Option<&ModelSpec> {
        self.specs.iter().find(|s| s.display_name == display_name)
    }

    pub fn by_id(&self, model_id: &str) -> Option<&ModelSpec> {
        self.specs.iter().find(|s| s.model_id == model_id)
    }

    /// First entry; `None` only for an empty registry.
    pub fn default_model(&self) -> Option<&ModelSpec> {
        self.specs.first()
    }

    pub fn display_names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.display_name).collect()
    }

    pub fn specs(&self) -> &[ModelSpec] {
        &self.specs
    }

    pub fn label_override(&self, model_id: &str) -> Option<&'static [&'static str]> {
        self.by_id(model_id).and_then(|s| s.label_override)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_configuration() {
        let registry = ModelRegistry::default();
        assert_eq!(
            registry.display_names(),
            vec!["Google ViT Base (General)", "Wargon Clothing Classifier"]
        );
        assert_eq!(
            registry.default_model().map(|s| s.model_id),
            Some("google/vit-base-patch16-224")
        );
    }

    #[test]
    fn test_resolve_by_display_name() {
        let registry = ModelRegistry::default();
        let spec = registry.resolve("Wargon Clothing Classifier").unwrap();
        assert_eq!(spec.model_id, "wargoninnovation/wargon-clothing-classifier");
        assert!(registry.resolve("wargon").is_none());
    }

    #[test]
    fn test_label_override_only_for_wargon() {
        let registry = ModelRegistry::default();
        assert!(registry.label_override("google/vit-base-patch16-224").is_none());
        assert_eq!(
            registry
                .label_override("wargoninnovation/wargon-clothing-classifier")
                .map(|l| l.len()),
            Some(27)
        );
        assert!(registry.label_override("someone/else").is_none());
    }
}
