//! Orbit Console - Entry Point
//!
//! Tracks service and project state for one Orbit environment, keeping a
//! local view reconciled against the environment's gateway and its
//! realtime event channel.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use orbit_console::app::options::AppOptions;
use orbit_console::app::run::run;
use orbit_console::logs::{init_logging, LogOptions};
use orbit_console::storage::layout::StorageLayout;
use orbit_console::storage::settings::Settings;
use orbit_console::utils::version_info;
use orbit_console::workers::{poller, realtime};

use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Retrieve the settings file; defaults cover a fresh install
    let layout = match cli_args.get("storage-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };
    let settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Unable to read settings file, using defaults: {}", e);
            Settings::default()
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // CLI overrides for one-off sessions against another environment
    let gateway_base_url = cli_args
        .get("gateway")
        .cloned()
        .unwrap_or_else(|| settings.gateway.base_url.clone());
    let environment_id = cli_args
        .get("environment")
        .cloned()
        .unwrap_or_else(|| settings.environment.clone());

    let options = AppOptions {
        gateway_base_url,
        gateway_api_token: settings.gateway.api_token.clone(),
        environment_id: environment_id.clone(),
        storage: orbit_console::app::options::StorageOptions { layout },
        enable_realtime_worker: settings.enable_realtime_worker,
        enable_poller: settings.enable_poller,
        realtime_worker: realtime::Options {
            url: settings.realtime.url.clone(),
            environment_id,
            ..Default::default()
        },
        poller: poller::Options {
            interval: Duration::from_secs(settings.polling_interval_secs),
            ..Default::default()
        },
        ..Default::default()
    };

    info!("Running Orbit console with options: {:?}", options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the console: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
