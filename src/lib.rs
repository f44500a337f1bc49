//! serp-visitor
//!
//! Verifies that target URLs appear in search results for configured
//! queries, driving antidetect browser profiles with humanized interaction.
//! Work is described by a `;`-delimited task file whose groups share a
//! request quota.

pub mod bot;
pub mod browser;
pub mod profiles;
pub mod scheduler;
pub mod stats;
pub mod tasks;
pub mod util;

use std::path::PathBuf;

use tracing::{error, info, warn};

/// Application configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Profile manager API base URL
    pub provider_url: String,
    /// Profile manager request timeout in seconds
    pub provider_timeout_secs: u64,

    /// Search engine start URL
    pub search_url: String,
    /// Task file path
    pub task_path: String,

    /// Delay after opening a tab before navigating (ms)
    pub settle_delay_ms: u64,
    /// Per-character typing delay (ms)
    pub typing_delay_ms: u64,
    /// Pause between typing the query and pressing Enter (ms)
    pub think_time_ms: u64,
    /// How long to wait for the results container (ms)
    pub results_timeout_ms: u64,
    /// Pause after the results container appears (ms)
    pub results_settle_ms: u64,
    /// How long to wait for the tab spawned by the result click (ms)
    pub page_spawn_timeout_ms: u64,
    /// How long to wait for the visited page to render (ms)
    pub render_timeout_ms: u64,
    /// Pause before closing the browser session (ms)
    pub close_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://127.0.0.1:25325".to_string(),
            provider_timeout_secs: 10,
            search_url: "https://ya.ru/".to_string(),
            task_path: "tasks/task.txt".to_string(),
            settle_delay_ms: 1000,
            typing_delay_ms: 100,
            think_time_ms: 2000,
            results_timeout_ms: 30000,
            results_settle_ms: 2000,
            page_spawn_timeout_ms: 10000,
            render_timeout_ms: 15000,
            close_delay_ms: 2000,
        }
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("serp-visitor").join("logs"))
}

impl AppConfig {
    /// Get config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("serp-visitor").join("config.json"))
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(config) => {
                            info!("Loaded config from {:?}", path);
                            return config;
                        }
                        Err(e) => {
                            warn!("Failed to parse config file: {}", e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read config file: {}", e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("Failed to create config directory: {}", e);
                    return;
                }
            }

            match serde_json::to_string_pretty(self) {
                Ok(content) => {
                    if let Err(e) = std::fs::write(&path, content) {
                        error!("Failed to save config: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize config: {}", e);
                }
            }
        }
    }
}

/// Initialize logging (console plus daily-rolling log file)
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "serp-visitor.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
