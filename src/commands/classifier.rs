use crate::commands::AppState;
use crate::error::AppError;
use crate::models::classify_types::{ClassifyResponse, ModelOption, ModelStatus};
use crate::services::image_service;
use crate::services::session::Upload;
use tauri::State;

#[tauri::command]
pub async fn list_models(state: State<'_, AppState>) -> Result<Vec<ModelOption>, AppError> {
    Ok(state.session.lock().await.model_options().await)
}

#[tauri::command]
pub async fn get_model_status(state: State<'_, AppState>, model_name: String) -> Result<ModelStatus, AppError> {
    let session = state.session.lock().await;
    let loaded = session.is_model_loaded(&model_name).await?;
    let model_id = session
        .registry()
        .resolve(&model_name)
        .map(|s| s.model_id.to_string())
        .unwrap_or_default();
    Ok(ModelStatus { model_id, loaded })
}

#[tauri::command]
pub async fn classify_upload(
    state: State<'_, AppState>,
    file_name: Option<String>,
    data: String,
    model_name: String,
    remove_background: Option<bool>,
) -> Result<ClassifyResponse, AppError> {
    let bytes = image_service::decode_base64_payload(&data)?;
    let upload = Upload {
        file_name,
        bytes,
        model_name,
        remove_background: remove_background.unwrap_or(false),
    };

    let outcome = state.session.lock().await.handle_upload(upload).await;
    Ok(ClassifyResponse::from(outcome))
}
