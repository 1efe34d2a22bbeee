//! Wiring of the `serve` command: config store, exporter pool, HTTP server and signals.

use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::api::rest_factory;
use crate::api::ApiError;
use crate::api::ApiServer;
use crate::api::AppState;
use crate::api::ExporterPool;
use crate::config::ConfigStore;
use crate::config::ServeArgs;

pub struct Application {
    state: Arc<AppState>,
    listen_addr: String,
    cancellation_token: CancellationToken,
}

impl Application {
    /// Load the device file and build the shared state.
    pub fn build(args: ServeArgs) -> Result<Self, Report<ApiError>> {
        let store = ConfigStore::load(&args.config_file).change_context(ApiError::ServerError {
            message: "failed to load config".to_string(),
        })?;

        let state = Arc::new(AppState {
            store: Arc::new(store),
            pool: ExporterPool::with_limits(
                rest_factory(),
                args.max_targets,
                Duration::from_secs(args.target_idle_timeout),
            ),
            namespace: args.namespace,
            metrics_path: args.metrics_path,
        });

        Ok(Self {
            state,
            listen_addr: args.listen_addr,
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Serve until SIGINT or SIGTERM. SIGHUP reloads the device file.
    pub async fn run(self) -> Result<(), Report<ApiError>> {
        let signals = spawn_signal_handler(self.state.clone(), self.cancellation_token.clone())?;

        let server = ApiServer::new(self.state, self.listen_addr);
        let result = server.run(self.cancellation_token.clone()).await;

        self.cancellation_token.cancel();
        if let Err(e) = signals.await {
            tracing::error!("Signal handler failed: {e}");
        }
        result
    }
}

#[cfg(unix)]
fn spawn_signal_handler(
    state: Arc<AppState>,
    cancellation_token: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>, Report<ApiError>> {
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let install_failed = || ApiError::ServerError {
        message: "failed to install signal handler".to_string(),
    };
    let mut sigterm = signal(SignalKind::terminate()).change_context_lazy(install_failed)?;
    let mut sigint = signal(SignalKind::interrupt()).change_context_lazy(install_failed)?;
    let mut sighup = signal(SignalKind::hangup()).change_context_lazy(install_failed)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    break;
                }
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading config");
                    if let Err(e) = state.reload() {
                        tracing::error!(error = ?e, "config reload failed, keeping previous config");
                    }
                }
                _ = cancellation_token.cancelled() => return,
            }
        }
        cancellation_token.cancel();
    }))
}

#[cfg(not(unix))]
fn spawn_signal_handler(
    _state: Arc<AppState>,
    cancellation_token: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>, Report<ApiError>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl+C: {e}");
                }
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = cancellation_token.cancelled() => return,
        }
        cancellation_token.cancel();
    }))
}
