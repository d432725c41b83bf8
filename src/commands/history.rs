use crate::commands::AppState;
use crate::error::AppError;
use crate::models::classify_types::HistoryItemView;
use tauri::State;

#[tauri::command]
pub async fn get_history(state: State<'_, AppState>) -> Result<Vec<HistoryItemView>, AppError> {
    Ok(state.session.lock().await.history_views())
}

#[tauri::command]
pub async fn clear_history(state: State<'_, AppState>) -> Result<(), AppError> {
    state.session.lock().await.clear_history();
    Ok(())
}
