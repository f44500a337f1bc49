//! serp-visitor entry point
//!
//! Checks profile manager availability, loads the task file and runs the
//! scheduler over it. An unavailable manager logs an error and exits
//! cleanly without starting any task.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use serp_visitor::profiles::ProfileClient;
use serp_visitor::scheduler::TaskScheduler;
use serp_visitor::stats::RunStats;
use serp_visitor::tasks::parse_task_file;
use serp_visitor::{init_logging, log_dir, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging();

    info!("Starting serp-visitor");
    if let Some(dir) = log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config = AppConfig::load();
    config.save();

    let provider = ProfileClient::new(
        &config.provider_url,
        Duration::from_secs(config.provider_timeout_secs),
    )?;

    if !provider.is_available().await {
        error!("Profile manager is not available");
        return Ok(());
    }

    let task_text = match std::fs::read_to_string(&config.task_path) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read task file {}: {}", config.task_path, e);
            return Ok(());
        }
    };

    let groups = parse_task_file(&task_text);
    if groups.is_empty() {
        warn!("Task file {} contains no usable tasks", config.task_path);
        return Ok(());
    }

    info!("Loaded {} task groups from {}", groups.len(), config.task_path);

    let stats = Arc::new(RunStats::new());
    let scheduler = TaskScheduler::new(config, provider, stats.clone());
    scheduler.run(groups).await;

    let snapshot = stats.snapshot();
    info!(
        "Run complete: {} tasks executed ({} found, {} not found, {} challenges, {} failed)",
        snapshot.executed,
        snapshot.found,
        snapshot.not_found,
        snapshot.challenges,
        snapshot.failures
    );

    Ok(())
}
