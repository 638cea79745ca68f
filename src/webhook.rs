use crate::widget::FormData;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook responded with status {0}")]
    Status(u16),
    #[error("webhook request failed: {0}")]
    Transport(String),
}

/// Delivers submitted form data to the configured webhook.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post_form(&self, url: &str, data: &FormData) -> Result<(), WebhookError>;
}

/// reqwest-backed client; a single POST per call, never retried.
#[derive(Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post_form(&self, url: &str, data: &FormData) -> Result<(), WebhookError> {
        let resp = self
            .client
            .post(url)
            .json(data)
            .send()
            .await
            .map_err(|err| {
                warn!(%url, %err, "webhook request failed");
                WebhookError::Transport(err.to_string())
            })?;
        let status = resp.status();
        if status.is_success() {
            debug!(%url, %status, fields = data.len(), "webhook accepted submission");
            Ok(())
        } else {
            warn!(%url, %status, "webhook rejected submission");
            Err(WebhookError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::routing::post;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct Captured {
        pub bodies: Arc<Mutex<Vec<serde_json::Value>>>,
        pub content_types: Arc<Mutex<Vec<String>>>,
    }

    async fn ok_hook(
        State(captured): State<Captured>,
        headers: HeaderMap,
        body: String,
    ) -> StatusCode {
        let ct = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        captured.content_types.lock().unwrap().push(ct);
        captured
            .bodies
            .lock()
            .unwrap()
            .push(serde_json::from_str(&body).unwrap());
        StatusCode::OK
    }

    async fn failing_hook() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn slow_hook() -> StatusCode {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StatusCode::OK
    }

    /// Local webhook with `/ok`, `/fail` and `/slow` endpoints.
    pub async fn spawn_webhook() -> (SocketAddr, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route("/ok", post(ok_hook))
            .route("/fail", post(failing_hook))
            .route("/slow", post(slow_hook))
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, captured)
    }

    fn sample_data() -> FormData {
        let mut data = FormData::new();
        data.set("name", "Alice");
        data
    }

    #[tokio::test]
    async fn posts_json_body() {
        let (addr, captured) = spawn_webhook().await;
        let client = HttpWebhookClient::new(Duration::from_secs(2)).unwrap();
        client
            .post_form(&format!("http://{addr}/ok"), &sample_data())
            .await
            .unwrap();
        assert_eq!(
            captured.bodies.lock().unwrap().as_slice(),
            &[serde_json::json!({ "name": "Alice" })]
        );
        assert!(captured.content_types.lock().unwrap()[0].starts_with("application/json"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (addr, _) = spawn_webhook().await;
        let client = HttpWebhookClient::new(Duration::from_secs(2)).unwrap();
        let err = client
            .post_form(&format!("http://{addr}/fail"), &sample_data())
            .await
            .unwrap_err();
        assert_eq!(err, WebhookError::Status(500));
    }

    #[tokio::test]
    async fn timeout_is_a_transport_error() {
        let (addr, _) = spawn_webhook().await;
        let client = HttpWebhookClient::new(Duration::from_millis(200)).unwrap();
        let err = client
            .post_form(&format!("http://{addr}/slow"), &sample_data())
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Transport(_)));
    }

    #[tokio::test]
    async fn malformed_url_is_a_transport_error() {
        let client = HttpWebhookClient::new(Duration::from_secs(1)).unwrap();
        let err = client.post_form("", &sample_data()).await.unwrap_err();
        assert!(matches!(err, WebhookError::Transport(_)));
    }
}
