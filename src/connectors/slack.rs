/// Chat-notify connector
///
/// Posts `{channel, text}` to a Slack incoming-webhook URL when one is
/// configured. Without a URL the notification is simulated and only logged.

use crate::{
    connectors::http::describe_error,
    runtime::executor::{NodeHandler, RunContext},
    workflow::{
        config::{NodeConfig, SlackConfig},
        types::Node,
    },
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SlackConnector {
    client: reqwest::Client,
    timeout: Duration,
}

impl SlackConnector {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn notify(&self, config: &SlackConfig) -> Result<Value> {
        let delivered = match &config.webhook_url {
            Some(url) => {
                let response = self
                    .client
                    .post(url)
                    .timeout(self.timeout)
                    .json(&json!({ "channel": config.channel, "text": config.message }))
                    .send()
                    .await
                    .map_err(|e| describe_error(e, self.timeout))?;

                let status = response.status();
                if !status.is_success() {
                    anyhow::bail!("Slack notification failed with status {}", status.as_u16());
                }
                tracing::info!("💬 Slack message delivered to {}", config.channel);
                true
            }
            None => {
                tracing::info!("💬 Simulated Slack message to {}: {}", config.channel, config.message);
                false
            }
        };

        Ok(json!({
            "success": true,
            "channel": config.channel,
            "message": config.message,
            "delivered": delivered,
            "sentAt": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

#[async_trait]
impl NodeHandler for SlackConnector {
    async fn execute(&self, node: &Node, config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        tracing::debug!("💬 Executing slack action: {}", node.id);
        match config {
            NodeConfig::Slack(slack) => self.notify(slack).await,
            other => anyhow::bail!("slack connector cannot run a {} configuration", other.variant_name()),
        }
    }
}
