//! Panel server with deferred startup.
//!
//! `new()` assembles state, `start()` binds the listener and `serve()`
//! accepts requests until the shutdown future resolves. Splitting bind
//! from serve lets callers learn an OS-assigned port before serving.

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::PanelConfig;
use super::handlers::{
    diagnostics_handler, diagnostics_text_handler, force_sync_handler, health_handler,
    sync_status_handler, PanelState,
};
use super::middleware::apply_http_layers;

/// Owns the panel's listener and shared state.
pub struct PanelModule {
    config: PanelConfig,
    listener: Option<TcpListener>,
    state: PanelState,
}

impl PanelModule {
    #[must_use]
    pub fn new(config: PanelConfig, state: PanelState) -> Self {
        Self {
            config,
            listener: None,
            state,
        }
    }

    /// Assembles the router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health/live` -- sync state and uptime
    /// - `GET /diagnostics` -- probe report (JSON)
    /// - `GET /diagnostics/text` -- probe report (plain text)
    /// - `GET /sync/status` -- sync-state snapshot
    /// - `POST /sync` -- force a migration sweep for the current user
    pub fn build_router(&self) -> Router {
        let routes = Router::new()
            .route("/health/live", get(health_handler))
            .route("/diagnostics", get(diagnostics_handler))
            .route("/diagnostics/text", get(diagnostics_text_handler))
            .route("/sync/status", get(sync_status_handler))
            .route("/sync", post(force_sync_handler));
        apply_http_layers(routes, &self.config).with_state(self.state.clone())
    }

    /// Binds the TCP listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "panel listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();

        info!("serving diagnostics panel");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("diagnostics panel stopped");
        Ok(())
    }
}
