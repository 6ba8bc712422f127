use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use wecom_crypto::{CallbackCrypto, KeyMaterial, WeComCrypto};

use crate::ai::{AiClient, AiForwarder};
use crate::api::{self, AppState};
use crate::config::{GatewayConfig, ServerConfig};
use crate::dispatch::ForwardDispatcher;
use crate::metrics::GatewayMetrics;
use crate::protocol::CallbackHandler;

pub struct GatewayServer {
    config: GatewayConfig,
    shutdown_tx: watch::Sender<bool>,
}

/// Routes plus the request-level layers. Shared with the integration tests.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/callback", get(api::get_callback).post(api::post_callback))
        .route("/health", get(api::get_health))
        .route("/metrics", get(api::get_metrics))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self { config, shutdown_tx })
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let wework = &self.config.wework;
        let keys = KeyMaterial::from_encoding_aes_key(
            wework.token.as_str(),
            &wework.encoding_aes_key,
            wework.corp_id.as_str(),
        )?;
        let crypto: Arc<dyn CallbackCrypto> = Arc::new(WeComCrypto::new(keys));
        let metrics = Arc::new(GatewayMetrics::new()?);

        let forwarder: Arc<dyn AiForwarder> = Arc::new(AiClient::new(&self.config.ai)?);
        let (dispatcher, worker) = ForwardDispatcher::spawn(forwarder, &self.config.forward, Arc::clone(&metrics));

        let state = AppState {
            service: Arc::new(CallbackHandler::new(crypto, dispatcher)),
            metrics,
        };
        let app = build_router(state, &self.config.server);

        let listener = tokio::net::TcpListener::bind(self.config.server.bind_addr).await?;
        info!(
            bind_addr = %self.config.server.bind_addr,
            corp_id = %wework.corp_id,
            agent_id = wework.agent_id,
            ai_base_url = %self.config.ai.base_url,
            "wecom-gateway listening"
        );

        let shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(Self::shutdown_signal(shutdown_rx))
            .await?;

        info!("HTTP server stopped, draining pending forwards");
        if !worker.drain(self.config.server.shutdown_timeout()).await {
            warn!("pending forwards abandoned at shutdown");
        }

        Ok(())
    }

    async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).ok()
        };

        tokio::select! {
            _ = async {
                #[cfg(unix)]
                {
                    if let Some(ref mut sigterm) = sigterm {
                        sigterm.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, starting graceful shutdown");
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Shutdown requested");
            }
        }
    }

    /// Ask a running (or not yet started) server to stop.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
