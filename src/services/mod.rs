pub mod background;
pub mod classifier;
pub mod download;
pub mod history;
pub mod image_service;
pub mod onnx;
pub mod session;
