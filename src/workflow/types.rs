/// Core workflow type definitions
///
/// Defines the structures for workflows, nodes, and connections as the editor
/// saves them. These types are serialized/deserialized from JSON for persistence.
/// Node configuration stays a free-form mapping here; it is parsed into typed
/// configuration only when a workflow is compiled for a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A complete workflow definition containing nodes and their connections
///
/// The node array order is the execution order. Connections are kept for the
/// editor but the engine never walks them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier (e.g., "wf-daily-report")
    pub id: String,
    /// Human-readable workflow name
    pub name: String,
    /// Disabled workflows are ignored by the scheduler
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordered list of nodes in this workflow
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Directed edges drawn in the editor
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Completion time of the most recent run, if any
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl Workflow {
    /// First trigger node of the given subtype, if any
    pub fn find_trigger(&self, subtype: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| node.kind == NodeKind::Trigger && node.subtype == subtype)
    }
}

/// A single step of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identifier, unique within the workflow (e.g., "n1", "notify-team")
    pub id: String,
    /// Broad node category; the editor saves it as `type`
    #[serde(alias = "type")]
    pub kind: NodeKind,
    /// Concrete node type within the kind (e.g., "http", "delay", "schedule")
    pub subtype: String,
    /// Display label shown in the editor and in run logs
    #[serde(default)]
    pub label: String,
    /// Subtype-specific configuration, validated at execution time
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Canvas position, irrelevant to execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    /// Label for log output, falling back to the node id
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Node category used for handler dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Entry point (schedule, webhook, mailbox poll, ...)
    Trigger,
    /// External side effect through a connector
    Action,
    /// In-process control or data step
    Logic,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Action => "action",
            NodeKind::Logic => "logic",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Directed edge between two nodes
///
/// Handles disambiguate multiple outputs, e.g. the "true"/"false" branches of
/// a conditional node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Source node ID
    pub source: String,
    /// Target node ID
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workflow_deserializes_editor_payload() {
        let workflow: Workflow = serde_json::from_value(json!({
            "id": "wf-1",
            "name": "Ping",
            "nodes": [
                {
                    "id": "t1",
                    "kind": "trigger",
                    "subtype": "schedule",
                    "label": "Every hour",
                    "config": { "interval": "Every hour" },
                    "position": { "x": 10.0, "y": 20.0 }
                },
                { "id": "a1", "kind": "action", "subtype": "http", "config": { "url": "http://x" } }
            ],
            "connections": [
                { "source": "t1", "target": "a1", "sourceHandle": "out" }
            ],
            "lastRunAt": null
        }))
        .unwrap();

        assert!(workflow.enabled);
        assert_eq!(workflow.nodes.len(), 2);
        assert_eq!(workflow.nodes[1].display_name(), "a1");
        assert_eq!(workflow.connections[0].source_handle.as_deref(), Some("out"));
        assert_eq!(workflow.find_trigger("schedule").map(|n| n.id.as_str()), Some("t1"));
        assert!(workflow.find_trigger("webhook").is_none());
    }
}
