use crate::config::AppConfig;
use crate::loader::WidgetLoader;
use crate::webhook::WebhookClient;
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub loader: Arc<WidgetLoader>,
    pub webhook: Arc<dyn WebhookClient>,
}

impl AppState {
    pub fn new(config: AppConfig, loader: WidgetLoader, webhook: Arc<dyn WebhookClient>) -> Self {
        Self {
            config: Arc::new(config),
            loader: Arc::new(loader),
            webhook,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/widget.js", get(crate::api::serve_loader))
        .route("/widget-bundle.js", get(crate::api::serve_bundle))
        .route("/api/config/default", get(crate::api::get_default_config))
        .route("/api/config/decode", post(crate::api::post_decode))
        .route("/api/embed", post(crate::api::post_embed))
        .route("/api/preview", post(crate::api::post_preview))
        .route("/api/webhook/test", post(crate::api::post_webhook_test))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http());
    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
