/// Error-handler logic node
///
/// Records one bookkeeping action and always succeeds. None of the actions
/// changes the control flow of the surrounding run; "Stop Workflow" is logged
/// as requested and the run carries on.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{
        config::{ErrorAction, NodeConfig},
        types::Node,
    },
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct ErrorHandlerNode;

#[async_trait]
impl NodeHandler for ErrorHandlerNode {
    async fn execute(&self, node: &Node, config: &NodeConfig, context: &RunContext) -> Result<Value> {
        let NodeConfig::ErrorHandler(handler) = config else {
            anyhow::bail!("error-handler node cannot run a {} configuration", config.variant_name());
        };

        match handler.action {
            ErrorAction::LogError => {
                tracing::error!(run_id = %context.run_id, "🧯 [{}] {}", node.id, handler.message);
            }
            ErrorAction::SendNotification => {
                tracing::warn!(run_id = %context.run_id, "📣 [{}] notification: {}", node.id, handler.message);
            }
            ErrorAction::Retry => {
                tracing::info!(
                    run_id = %context.run_id,
                    "🔁 [{}] retry requested ({} attempts): {}",
                    node.id,
                    handler.retry_count,
                    handler.message
                );
            }
            ErrorAction::StopWorkflow => {
                tracing::warn!(
                    run_id = %context.run_id,
                    "🛑 [{}] stop requested, run continues: {}",
                    node.id,
                    handler.message
                );
            }
        }

        Ok(json!({
            "success": true,
            "action": handler.action.label(),
            "message": handler.message,
            "retryCount": handler.retry_count,
            "handledAt": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::PreparedNode;
    use crate::workflow::types::NodeKind;
    use uuid::Uuid;

    #[tokio::test]
    async fn stop_workflow_is_bookkeeping_only() {
        let prepared = PreparedNode::prepare(&Node {
            id: "on-error".to_string(),
            kind: NodeKind::Logic,
            subtype: "error-handler".to_string(),
            label: "On error".to_string(),
            config: json!({ "action": "Stop Workflow", "message": "upstream down", "retryCount": 1 })
                .as_object()
                .cloned()
                .unwrap(),
            position: None,
        });
        let config = prepared.config.as_ref().unwrap();

        let out = ErrorHandlerNode
            .execute(&prepared.node, config, &RunContext::new("wf", Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(out["success"], json!(true));
        assert_eq!(out["action"], json!("Stop Workflow"));
        assert_eq!(out["message"], json!("upstream down"));
        assert_eq!(out["retryCount"], json!(1));
        assert!(out["handledAt"].is_string());
    }
}
