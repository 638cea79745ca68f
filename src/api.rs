use crate::embed::{decode_config, decode_snippet_or_payload, embed_snippet, encode_config};
use crate::runtime::{Popup, SubmitError, Widget};
use crate::server::AppState;
use crate::webhook::WebhookClient;
use crate::widget::{FormData, WidgetConfig};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, warn};

const DEFAULT_HOST_HTML: &str =
    "<!doctype html><html><head><title>Widget preview</title></head><body></body></html>";

pub async fn serve_loader(State(state): State<AppState>) -> impl IntoResponse {
    let fallback = || crate::loader::loader_script(state.config.bundle_url().as_str());
    javascript(asset_or(&state.config.assets_dir.join("widget.js"), fallback).await)
}

pub async fn serve_bundle(State(state): State<AppState>) -> impl IntoResponse {
    let path = state.config.assets_dir.join("widget-bundle.js");
    javascript(asset_or(&path, crate::bundle::runtime_bundle).await)
}

/// Prefers a file under the assets dir so a rebuilt bundle can be dropped in.
async fn asset_or(path: &Path, fallback: impl FnOnce() -> String) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(script) => script,
        Err(err) => {
            debug!(?path, %err, "asset override not found; serving built-in script");
            fallback()
        }
    }
}

fn javascript(script: String) -> Response {
    let mut resp = Response::new(script.into());
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    resp
}

pub async fn get_default_config() -> impl IntoResponse {
    Json(WidgetConfig::default())
}

pub async fn post_embed(
    State(state): State<AppState>,
    Json(config): Json<WidgetConfig>,
) -> impl IntoResponse {
    let loader_url = state.config.loader_url();
    match (
        encode_config(&config),
        embed_snippet(&config, loader_url.as_str()),
    ) {
        (Ok(encoded), Ok(snippet)) => Json(json!({
            "encoded": encoded,
            "snippet": snippet,
            "loaderUrl": loader_url.as_str(),
        }))
        .into_response(),
        (Err(err), _) | (_, Err(err)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    #[serde(default)]
    pub encoded: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

pub async fn post_decode(Json(body): Json<DecodeRequest>) -> impl IntoResponse {
    let decoded = match (body.encoded.as_deref(), body.snippet.as_deref()) {
        (Some(encoded), _) => decode_config(encoded),
        (None, Some(snippet)) => decode_snippet_or_payload(snippet),
        (None, None) => {
            return (StatusCode::BAD_REQUEST, "expected `encoded` or `snippet`").into_response();
        }
    };
    match decoded {
        Ok(config) => Json(config).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub config: WidgetConfig,
    #[serde(default)]
    pub host_html: Option<String>,
    #[serde(default)]
    pub open: bool,
}

/// Mounts the widget into a host page the way the loader would.
///
/// A load or mount failure leaves the page untouched, same as a host page
/// whose widget never appears.
pub async fn post_preview(
    State(state): State<AppState>,
    Json(body): Json<PreviewRequest>,
) -> impl IntoResponse {
    let host_html = body
        .host_html
        .unwrap_or_else(|| DEFAULT_HOST_HTML.to_string());
    match state.loader.init(&host_html, body.config, body.open).await {
        Ok(mounted) => Html(mounted.html),
        Err(err) => {
            warn!(%err, "preview rendered without widget");
            Html(host_html)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTestRequest {
    pub config: WidgetConfig,
    #[serde(default)]
    pub form_data: FormData,
}

/// Runs one popup submission against the configured webhook.
pub async fn post_webhook_test(
    State(state): State<AppState>,
    Json(body): Json<WebhookTestRequest>,
) -> impl IntoResponse {
    let mut widget = Widget::new(body.config);
    widget.open();
    let Some(popup) = widget.popup_mut() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "popup did not open").into_response();
    };
    match fill_and_submit(popup, &body.form_data, state.webhook.as_ref()).await {
        Ok(()) => {
            info!(popup = %popup.id(), "webhook test submission accepted");
            Json(json!({ "state": "submitted" })).into_response()
        }
        Err(err) => {
            let status = match err {
                SubmitError::Webhook(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (
                status,
                Json(json!({
                    "state": "filling",
                    "error": err.to_string(),
                    "alert": err.alert(),
                })),
            )
                .into_response()
        }
    }
}

async fn fill_and_submit(
    popup: &mut Popup,
    data: &FormData,
    webhook: &dyn WebhookClient,
) -> Result<(), SubmitError> {
    for (name, value) in data.iter() {
        popup.input(name, value)?;
    }
    popup.submit(webhook).await
}
