//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, request context)
//! - Swap the engine when a reloaded configuration arrives
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::access::engine::AccessEngine;
use crate::casa::nonce::NonceStore;
use crate::config::EngineConfig;
use crate::http::handlers;
use crate::http::middleware::request_context_middleware;
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::subscription::repository::SubscriptionRepository;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<ArcSwap<AccessEngine>>,
    repository: Arc<dyn SubscriptionRepository>,
    nonces: Arc<dyn NonceStore>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn SubscriptionRepository>,
        nonces: Arc<dyn NonceStore>,
    ) -> Self {
        let engine = AccessEngine::new(config, repository.clone(), nonces.clone());
        Self {
            engine: Arc::new(ArcSwap::from_pointee(engine)),
            repository,
            nonces,
        }
    }

    /// The engine for the current configuration.
    pub fn engine(&self) -> Arc<AccessEngine> {
        self.engine.load_full()
    }

    /// Rebuild the engine from a new configuration; in-flight requests keep the old one.
    pub fn reload(&self, config: EngineConfig) {
        let engine = AccessEngine::new(config, self.repository.clone(), self.nonces.clone());
        self.engine.store(Arc::new(engine));
        tracing::info!("Access engine reloaded");
    }
}

/// HTTP server for the access engine.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: EngineConfig,
}

impl HttpServer {
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn SubscriptionRepository>,
        nonces: Arc<dyn NonceStore>,
    ) -> Self {
        let state = AppState::new(config.clone(), repository, nonces);
        let router = Self::build_router(&config, state.clone());
        Self { router, state, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EngineConfig, state: AppState) -> Router {
        let access = Router::new()
            .route("/access/issues/{localid}", get(handlers::issue_access))
            .route("/access/issues/{localid}/raw", get(handlers::raw_issue_access))
            .route("/access/articles/{localid}", get(handlers::article_access))
            .route("/webservices/casa", get(handlers::casa_verify))
            .route_layer(middleware::from_fn_with_state(state.clone(), request_context_middleware));

        Router::new()
            .route("/health", get(handlers::health))
            .route("/webservices/restrictions/{journal_code}", get(handlers::restrictions))
            .merge(access)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(set_request_id_layer())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<EngineConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let bind_address = self.config.listener.bind_address.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if new_config.listener.bind_address != bind_address {
                    tracing::warn!("Listener address changes need a restart, ignoring");
                }
                state.reload(new_config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casa::nonce::InMemoryNonceStore;
    use crate::http::request::X_REQUEST_ID;
    use crate::subscription::repository::InMemoryRepository;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new(
            EngineConfig::default(),
            Arc::new(InMemoryRepository::default()),
            Arc::new(InMemoryNonceStore::new()),
        )
    }

    #[tokio::test]
    async fn test_health_carries_request_id() {
        let response = server()
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_unknown_issue_without_peer_address() {
        let response = server()
            .router
            .oneshot(Request::get("/access/issues/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reload_swaps_engine() {
        let server = server();
        assert!(server.state().engine().casa().is_none());

        let mut config = EngineConfig::default();
        config.casa.enabled = true;
        config.casa.secret = "rotated".into();
        server.state().reload(config);
        assert!(server.state().engine().casa().is_some());
    }
}
