//! Network module with deferred startup lifecycle.
//!
//! `new()` records the configuration, `start()` binds the TCP listener and
//! `serve()` accepts connections until the shutdown future resolves. Binding
//! early lets callers learn the OS-assigned port before serving.

use std::future::Future;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::liveness_handler;
use super::middleware::build_http_layers;

/// Manages the HTTP server lifecycle.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
        }
    }

    /// Assembles the full router around the `api` routes.
    ///
    /// Routes:
    /// - `GET /health/live` -- liveness probe
    /// - everything in `api`
    pub fn build_router(&self, api: Router) -> Router {
        Router::new()
            .route("/health/live", get(liveness_handler))
            .merge(api)
            .layer(build_http_layers(&self.config))
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves `api` until the shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// encounters a fatal I/O error.
    pub async fn serve(
        self,
        api: Router,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router(api);
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };

        info!("Serving HTTP connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> NetworkConfig {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = NetworkModule::new(NetworkConfig::default());
        assert!(module.listener.is_none());
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(local_config());
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_fails_without_start() {
        let module = NetworkModule::new(NetworkConfig::default());
        let err = module
            .serve(Router::new(), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "start() must be called before serve()");
    }

    #[tokio::test]
    async fn serves_liveness_until_shutdown() {
        let mut module = NetworkModule::new(local_config());
        let port = module.start().await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(Router::new(), async move {
            let _ = rx.await;
        }));

        let response = reqwest::get(format!("http://127.0.0.1:{port}/health/live"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
