pub mod hub;
pub mod inference;
pub mod labels;
pub mod model_manager;
pub mod preprocess;
pub mod registry;
