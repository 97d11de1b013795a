//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::ConsoleError;
use crate::gateway::client::GatewayApi;
use crate::workers::{poller, realtime};

/// Run the Orbit console
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ConsoleError> {
    info!("Initializing Orbit console...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(options.lifecycle.clone());

    // Initialize the app state and workers
    if let Err(e) = init(&options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start console: {}", e);
        shutdown_manager.shutdown(&shutdown_tx).await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    shutdown_manager.shutdown(&shutdown_tx).await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, ConsoleError> {
    let app_state = Arc::new(AppState::init(options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.enable_realtime_worker {
        init_realtime_worker(
            options.realtime_worker.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_poller {
        init_poller_worker(
            options.poller.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    Ok(app_state)
}

fn init_realtime_worker(
    options: realtime::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ConsoleError> {
    info!("Initializing realtime worker...");

    let registry = app_state.registry.clone();
    let tracker = app_state.tracker.clone();
    let monitor = app_state.connection.clone();
    let gateway: Arc<dyn GatewayApi> = app_state.gateway.clone();

    let realtime_handle = tokio::spawn(async move {
        realtime::run(
            &options,
            registry,
            tracker,
            monitor,
            gateway,
            |wait| tokio::time::sleep(wait),
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_realtime_worker_handle(realtime_handle)?;
    Ok(())
}

fn init_poller_worker(
    options: poller::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ConsoleError> {
    info!("Initializing poller worker...");

    let registry = app_state.registry.clone();
    let gateway: Arc<dyn GatewayApi> = app_state.gateway.clone();
    let state_file = app_state.state_file.clone();

    let poller_handle = tokio::spawn(async move {
        poller::run(
            &options,
            registry,
            gateway,
            state_file,
            |wait| tokio::time::sleep(wait),
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_poller_worker_handle(poller_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    realtime_worker_handle: Option<JoinHandle<()>>,
    poller_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(lifecycle_options: LifecycleOptions) -> Self {
        Self {
            lifecycle_options,
            app_state: None,
            realtime_worker_handle: None,
            poller_worker_handle: None,
        }
    }

    fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), ConsoleError> {
        if self.app_state.is_some() {
            return Err(ConsoleError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    fn with_realtime_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), ConsoleError> {
        if self.realtime_worker_handle.is_some() {
            return Err(ConsoleError::ShutdownError("realtime_handle already set".to_string()));
        }
        self.realtime_worker_handle = Some(handle);
        Ok(())
    }

    fn with_poller_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), ConsoleError> {
        if self.poller_worker_handle.is_some() {
            return Err(ConsoleError::ShutdownError("poller_handle already set".to_string()));
        }
        self.poller_worker_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self, shutdown_tx: &broadcast::Sender<()>) -> Result<(), ConsoleError> {
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), ConsoleError> {
        info!("Shutting down Orbit console...");

        // 1. Realtime worker
        if let Some(handle) = self.realtime_worker_handle.take() {
            handle.await.map_err(|e| ConsoleError::ShutdownError(e.to_string()))?;
        }

        // 2. Poller worker
        if let Some(handle) = self.poller_worker_handle.take() {
            handle.await.map_err(|e| ConsoleError::ShutdownError(e.to_string()))?;
        }

        // 3. App state (persists the environment snapshot)
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
