/// Network-call connector
///
/// Sends one HTTP request per node execution. Every request carries the
/// configured timeout; a timeout, a transport error, or a non-2xx status is a
/// node failure, never a run failure.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{
        config::{HttpConfig, NodeConfig},
        types::Node,
    },
};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn send(&self, config: &HttpConfig) -> Result<Value> {
        let method = Method::from_bytes(config.method.as_bytes())
            .map_err(|_| anyhow::anyhow!("Unsupported HTTP method: {}", config.method))?;

        tracing::debug!("🌍 HTTP Request: {} {}", method, config.url);

        let mut request = self
            .client
            .request(method.clone(), &config.url)
            .timeout(self.timeout);

        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &config.body {
            if method != Method::GET && method != Method::HEAD {
                request = request.json(body);
            }
        }

        let response = request.send().await.map_err(|e| describe_error(e, self.timeout))?;
        let status = response.status();
        tracing::debug!("📡 Response status: {}", status);

        let text = response.text().await.map_err(|e| describe_error(e, self.timeout))?;
        if !status.is_success() {
            anyhow::bail!("HTTP request failed with status {}", status.as_u16());
        }

        // Prefer structured data, fall back to the raw body
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        tracing::info!("✅ HTTP request completed: {} {} (status: {})", method, config.url, status);

        Ok(json!({
            "success": true,
            "status": status.as_u16(),
            "data": data,
        }))
    }
}

/// Turn a reqwest error into a node failure message
pub(crate) fn describe_error(error: reqwest::Error, timeout: Duration) -> anyhow::Error {
    if error.is_timeout() {
        anyhow::anyhow!("HTTP request timed out after {}s", timeout.as_secs_f64())
    } else {
        anyhow::anyhow!("HTTP request failed: {}", error)
    }
}

#[async_trait]
impl NodeHandler for HttpConnector {
    async fn execute(&self, node: &Node, config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        tracing::debug!("🌐 Executing http action: {}", node.id);
        match config {
            NodeConfig::Http(http) => self.send(http).await,
            other => anyhow::bail!("http connector cannot run a {} configuration", other.variant_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::PreparedNode;
    use crate::workflow::types::NodeKind;
    use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
    use uuid::Uuid;

    /// Serve a tiny local API on an ephemeral port
    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/ok", get(|| async { Json(json!({ "pong": true })) }))
            .route("/text", get(|| async { "plain body" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn run(connector: &HttpConnector, config: Value) -> Result<Value> {
        let prepared = PreparedNode::prepare(&Node {
            id: "call".to_string(),
            kind: NodeKind::Action,
            subtype: "http".to_string(),
            label: "Call API".to_string(),
            config: config.as_object().cloned().unwrap(),
            position: None,
        });
        let config = prepared.config.as_ref().map_err(|e| anyhow::anyhow!(e.clone()))?;
        connector
            .execute(&prepared.node, config, &RunContext::new("wf", Uuid::new_v4()))
            .await
    }

    #[tokio::test]
    async fn json_and_text_bodies() {
        let base = spawn_server().await;
        let connector = HttpConnector::new(reqwest::Client::new(), Duration::from_secs(5));

        let out = run(&connector, json!({ "url": format!("{}/ok", base) })).await.unwrap();
        assert_eq!(out["status"], json!(200));
        assert_eq!(out["data"], json!({ "pong": true }));

        let out = run(&connector, json!({ "url": format!("{}/text", base) })).await.unwrap();
        assert_eq!(out["data"], json!("plain body"));
    }

    #[tokio::test]
    async fn posts_json_body() {
        let base = spawn_server().await;
        let connector = HttpConnector::new(reqwest::Client::new(), Duration::from_secs(5));

        let out = run(
            &connector,
            json!({ "url": format!("{}/echo", base), "method": "POST", "body": { "id": 9 } }),
        )
        .await
        .unwrap();
        assert_eq!(out["data"], json!({ "id": 9 }));
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let base = spawn_server().await;
        let connector = HttpConnector::new(reqwest::Client::new(), Duration::from_secs(5));

        let err = run(&connector, json!({ "url": format!("{}/missing", base) })).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP request failed with status 404");
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let base = spawn_server().await;
        let connector = HttpConnector::new(reqwest::Client::new(), Duration::from_millis(200));

        let err = run(&connector, json!({ "url": format!("{}/slow", base) })).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{}", err);
    }
}
