/// Pass-through handlers
///
/// Triggers do their real work upstream (the scheduler decides when a schedule
/// fires, the webhook receiver decides when a request matches), so inside a
/// run they only acknowledge. Action subtypes without a connector succeed with
/// a payload marked as simulated.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{config::NodeConfig, types::Node},
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Acknowledges any trigger node
#[derive(Debug, Clone, Copy)]
pub struct TriggerAcknowledgement;

#[async_trait]
impl NodeHandler for TriggerAcknowledgement {
    async fn execute(&self, node: &Node, config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        let mut payload = json!({
            "success": true,
            "trigger": node.subtype,
            "acknowledgedAt": chrono::Utc::now().to_rfc3339(),
        });

        match config {
            NodeConfig::Schedule(schedule) => {
                payload["interval"] = json!(schedule.interval.label());
            }
            NodeConfig::Webhook(webhook) => {
                payload["path"] = json!(webhook.path);
            }
            _ => {}
        }

        Ok(payload)
    }
}

/// Stand-in for action subtypes that have no connector
#[derive(Debug, Clone, Copy)]
pub struct SimulatedAction;

#[async_trait]
impl NodeHandler for SimulatedAction {
    async fn execute(&self, node: &Node, _config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        tracing::debug!("🎭 Simulating action '{}' ({})", node.id, node.subtype);
        Ok(json!({
            "success": true,
            "simulated": true,
            "subtype": node.subtype,
            "message": format!("Action '{}' simulated", node.subtype),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::PreparedNode;
    use crate::workflow::types::NodeKind;
    use serde_json::Map;
    use uuid::Uuid;

    fn prepared(kind: NodeKind, subtype: &str, config: Value) -> PreparedNode {
        PreparedNode::prepare(&Node {
            id: "n1".to_string(),
            kind,
            subtype: subtype.to_string(),
            label: String::new(),
            config: config.as_object().cloned().unwrap_or_else(Map::new),
            position: None,
        })
    }

    #[tokio::test]
    async fn schedule_trigger_echoes_interval() {
        let node = prepared(NodeKind::Trigger, "schedule", json!({ "interval": "Daily" }));
        let config = node.config.as_ref().unwrap();
        let context = RunContext::new("wf", Uuid::new_v4());

        let out = TriggerAcknowledgement.execute(&node.node, config, &context).await.unwrap();
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["interval"], json!("Daily"));
    }

    #[tokio::test]
    async fn unknown_action_is_simulated() {
        let node = prepared(NodeKind::Action, "sms", json!({}));
        let config = node.config.as_ref().unwrap();
        let context = RunContext::new("wf", Uuid::new_v4());

        let out = SimulatedAction.execute(&node.node, config, &context).await.unwrap();
        assert_eq!(out["simulated"], json!(true));
        assert_eq!(out["subtype"], json!("sms"));
    }
}
