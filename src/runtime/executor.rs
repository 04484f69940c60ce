/// Node execution dispatch
///
/// The executor looks up the handler registered for a node's `(kind, subtype)`
/// and runs it against the node's parsed configuration. A configuration that
/// failed to parse is reported here, when the node's turn comes, so the
/// failure shows up as that node's result rather than rejecting the workflow.

use crate::{
    runtime::registry::HandlerRegistry,
    workflow::{
        config::{ConfigError, NodeConfig},
        types::Node,
    },
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A single node capability: perform the node's work and return its payload
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(&self, node: &Node, config: &NodeConfig, context: &RunContext) -> Result<Value>;
}

/// Per-run data shared with handlers
///
/// Holds the payload of every node that succeeded so far, keyed by node id,
/// plus the most recent one.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub workflow_id: String,
    pub run_id: Uuid,
    outputs: HashMap<String, Value>,
    previous_output: Option<Value>,
}

impl RunContext {
    pub fn new(workflow_id: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id,
            outputs: HashMap::new(),
            previous_output: None,
        }
    }

    /// Payload of the most recent successful node
    pub fn previous_output(&self) -> Option<&Value> {
        self.previous_output.as_ref()
    }

    /// Payload of a specific earlier node
    pub fn output_of(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    pub fn record(&mut self, node_id: &str, output: Value) {
        self.outputs.insert(node_id.to_string(), output.clone());
        self.previous_output = Some(output);
    }
}

/// A node paired with its parsed configuration, ready to run
#[derive(Debug, Clone)]
pub struct PreparedNode {
    pub node: Node,
    pub config: Result<NodeConfig, ConfigError>,
}

impl PreparedNode {
    pub fn prepare(node: &Node) -> Self {
        Self {
            config: NodeConfig::parse(node.kind, &node.subtype, &node.config),
            node: node.clone(),
        }
    }
}

/// Dispatches prepared nodes to registered handlers
#[derive(Debug)]
pub struct NodeExecutor {
    registry: HandlerRegistry,
}

impl NodeExecutor {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Handler registry, for registering additional node types at runtime
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute one node
    pub async fn run(&self, prepared: &PreparedNode, context: &RunContext) -> Result<Value> {
        let node = &prepared.node;
        tracing::debug!("🚀 Dispatching node '{}' ({}/{})", node.id, node.kind, node.subtype);

        let config = match &prepared.config {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("⚠️ Node '{}' has invalid configuration: {}", node.id, e);
                return Err(e.clone().into());
            }
        };

        let handler = self.registry.resolve(node.kind, &node.subtype).ok_or_else(|| {
            anyhow::anyhow!("No handler registered for {} node subtype '{}'", node.kind, node.subtype)
        })?;

        handler.execute(node, config, context).await
    }
}
