/// Delay logic node
///
/// Suspends the run for the configured time. The run keeps the single
/// execution slot for the whole delay.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{config::NodeConfig, types::Node},
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct DelayHandler;

#[async_trait]
impl NodeHandler for DelayHandler {
    async fn execute(&self, node: &Node, config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        let NodeConfig::Delay(delay) = config else {
            anyhow::bail!("delay node cannot run a {} configuration", config.variant_name());
        };

        let duration = delay.duration();
        tracing::info!("⏳ Node '{}' delaying for {:?}", node.id, duration);
        tokio::time::sleep(duration).await;

        Ok(json!({
            "success": true,
            "duration": delay.amount,
            "unit": delay.unit.as_str(),
            "delayedMs": duration.as_millis() as u64,
        }))
    }
}
