#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

/// Installs the fmt subscriber. `RUST_LOG` selects the level, `info` when
/// unset. Safe to call more than once.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::AppState;
    use config::AppConfig;
    use tauri::Manager;

    init_logging();

    tauri::Builder::default()
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&app_data_dir)?;

            let config = AppConfig::from_env(&app_data_dir);
            tracing::info!("Models directory: {}", config.models_dir.display());
            app.manage(AppState::new(&config));

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::classifier::list_models,
            commands::classifier::get_model_status,
            commands::classifier::classify_upload,
            commands::history::get_history,
            commands::history::clear_history,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logging_is_idempotent() {
        super::init_logging();
        super::init_logging();
        tracing::info!("logging ready");
    }
}
