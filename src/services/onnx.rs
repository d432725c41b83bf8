use crate::error::AppError;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::PathBuf;

/// How ONNX Runtime sessions are built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            use_gpu: false,
            intra_threads: 4,
        }
    }
}

/// Builds a session on tokio's blocking pool.
pub async fn load_session(path: PathBuf, settings: SessionSettings) -> Result<Session, AppError> {
    tokio::task::spawn_blocking(move || build_session(&path, settings))
        .await
        .map_err(|e| AppError::Inference(format!("Failed to spawn model loading task: {}", e)))?
}

pub fn build_session(path: &std::path::Path, settings: SessionSettings) -> Result<Session, AppError> {
    let _ = ort::init().with_name("garment-lense").commit();

    let fail = |what: &str, e: &dyn std::fmt::Display| {
        AppError::Inference(format!("Failed to {}: {}", what, e))
    };

    let mut builder = Session::builder()
        .map_err(|e| fail("create session builder", &e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| fail("set optimization level", &e))?
        .with_intra_threads(settings.intra_threads)
        .map_err(|e| fail("set intra threads", &e))?;

    if settings.use_gpu {
        builder = builder
            .with_execution_providers([
                ort::execution_providers::DirectMLExecutionProvider::default().build(),
                ort::execution_providers::CoreMLExecutionProvider::default().build(),
                ort::execution_providers::CUDAExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| fail("register GPU execution providers", &e))?;
    } else {
        builder = builder
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| fail("register CPU execution provider", &e))?;
    }

    builder
        .commit_from_file(path)
        .map_err(|e| fail(&format!("load ONNX model {}", path.display()), &e))
}
