pub mod types;
pub mod config;
pub mod error;
pub mod bracket;
pub mod ledger;
pub mod stats;
pub mod watcher;
pub mod coordinator;
pub mod server;

use types::*;
use config::*;
use coordinator::Coordinator;
use stats::StatsStore;
use watcher::LogWatcher;

use std::{
    fs,
    sync::{mpsc, Arc, Mutex},
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run() {
    load_env_file();

    // Initialize tracing with daily rolling file output
    let logs_dir = logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Arena bracket starting");

    let config = match load_config_inner() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}; falling back to defaults");
            apply_env_defaults(AppConfig::default())
        }
    };
    if !config_path().is_file() {
        match save_config_inner(config.clone()) {
            Ok(_) => info!("Wrote default config to {}", config_path().display()),
            Err(e) => warn!("{e}"),
        }
    }
    log_env_warnings(&config);

    let stats = StatsStore::load(&resolve_data_path(&config.stats_path));
    let (sender, receiver) = mpsc::channel();
    let watcher = LogWatcher::spawn(
        resolve_data_path(&config.watcher_log_path),
        Duration::from_millis(config.watcher_poll_ms.max(50)),
        Duration::from_secs(config.result_timeout_sec),
        sender,
    );
    let shared: SharedCoordinator = Arc::new(Mutex::new(Coordinator::new(&config, stats).with_watcher(watcher)));

    if !config.characters.is_empty() {
        let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
        match guard.random_tournament(None, now_ms()) {
            Ok(snapshot) => info!("Opening tournament with {} fighters", snapshot.participants.len()),
            Err(e) => warn!("No opening tournament: {e}"),
        }
    }

    coordinator::spawn_ingest_loop(shared.clone(), receiver);

    let overlay_dir = Some(config.overlay_dir.trim())
        .filter(|dir| !dir.is_empty())
        .map(resolve_data_path);
    server::serve(shared, overlay_dir, &config.listen_addr).await;
}
