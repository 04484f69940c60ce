/// Run state machine
///
/// Walks a workflow snapshot's node array in order and dispatches each node to
/// the executor. Connections are not traversed. A failing node becomes a failed
/// NodeResult and the run moves on; only malformed workflow data or a storage
/// failure while logging aborts the run.

use crate::{
    run::{logger::RunLogger, types::NodeResult},
    runtime::executor::{NodeExecutor, PreparedNode, RunContext},
    workflow::types::Workflow,
};
use anyhow::Result;
use serde_json::json;
use std::{collections::HashSet, sync::Arc, time::Instant};

#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    /// Node executor for handling individual node execution
    executor: Arc<NodeExecutor>,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<NodeExecutor>) -> Self {
        Self { executor }
    }

    /// Execute every node of the snapshot, returning one result per node in array order
    ///
    /// `Err` means the run as a whole failed; per-node failures are inside the
    /// returned results.
    pub async fn execute(&self, workflow: &Workflow, logger: &mut RunLogger) -> Result<Vec<NodeResult>> {
        let workflow_start_time = Instant::now();
        let nodes = prepare(workflow)?;

        tracing::info!(
            run_id = %logger.run_id(),
            "🚀 Starting workflow execution: {} ({} nodes)",
            workflow.id,
            nodes.len()
        );

        let mut context = RunContext::new(workflow.id.clone(), logger.run_id());
        let mut results = Vec::with_capacity(nodes.len());

        for prepared in &nodes {
            let node = &prepared.node;
            let label = node.display_name();

            logger
                .info(format!("Starting execution of node: {}", label), Some(&node.id), None)
                .await?;

            let node_start_time = Instant::now();
            let outcome = self.executor.run(prepared, &context).await;
            let duration = node_start_time.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    logger
                        .info(
                            format!("Node {} completed successfully", label),
                            Some(&node.id),
                            Some(json!({ "duration": duration, "result": result })),
                        )
                        .await?;
                    context.record(&node.id, result.clone());
                    results.push(NodeResult {
                        node_id: node.id.clone(),
                        label: label.to_string(),
                        kind: node.kind,
                        subtype: node.subtype.clone(),
                        duration,
                        success: true,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    logger
                        .error(
                            format!("Node {} failed: {}", label, message),
                            Some(&node.id),
                            Some(json!({ "duration": duration, "error": format!("{:#}", e) })),
                        )
                        .await?;
                    results.push(NodeResult {
                        node_id: node.id.clone(),
                        label: label.to_string(),
                        kind: node.kind,
                        subtype: node.subtype.clone(),
                        duration,
                        success: false,
                        result: None,
                        error: Some(message),
                    });
                }
            }
        }

        let failed = results.iter().filter(|r| !r.success).count();
        tracing::info!(
            run_id = %logger.run_id(),
            "🎉 Workflow '{}' finished in {:?}: {} nodes, {} failed",
            workflow.id,
            workflow_start_time.elapsed(),
            results.len(),
            failed
        );

        Ok(results)
    }
}

/// Parse every node's configuration up front; node ids must be unique
fn prepare(workflow: &Workflow) -> Result<Vec<PreparedNode>> {
    let mut seen = HashSet::with_capacity(workflow.nodes.len());
    for node in &workflow.nodes {
        if node.id.trim().is_empty() {
            anyhow::bail!("Workflow '{}' contains a node without an id", workflow.id);
        }
        if !seen.insert(node.id.as_str()) {
            anyhow::bail!("Workflow '{}' contains duplicate node id '{}'", workflow.id, node.id);
        }
    }
    Ok(workflow.nodes.iter().map(PreparedNode::prepare).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::Database,
        run::{storage::RunStorage, types::TriggerSource, LogLevel},
        runtime::registry::{ConnectorDeps, HandlerRegistry},
        workflow::types::{Node, NodeKind},
    };
    use chrono::Utc;
    use serde_json::Value;
    use std::time::Duration;
    use uuid::Uuid;

    fn node(id: &str, kind: NodeKind, subtype: &str, config: Value) -> Node {
        Node {
            id: id.to_string(),
            kind,
            subtype: subtype.to_string(),
            label: format!("{} node", id),
            config: config.as_object().cloned().unwrap_or_default(),
            position: None,
        }
    }

    fn workflow(nodes: Vec<Node>) -> Workflow {
        Workflow {
            id: "wf-engine".to_string(),
            name: "Engine".to_string(),
            enabled: true,
            nodes,
            connections: Vec::new(),
            last_run_at: None,
        }
    }

    async fn setup() -> (ExecutionEngine, RunStorage, RunLogger) {
        let db = Database::in_memory().await.unwrap();
        let registry = HandlerRegistry::with_builtins(ConnectorDeps {
            http: reqwest::Client::new(),
            http_timeout: Duration::from_secs(5),
            datastore: db.datastore.clone(),
        });
        let engine = ExecutionEngine::new(Arc::new(NodeExecutor::new(registry)));
        let runs = RunStorage::new(db.engine.clone());
        let run_id = Uuid::new_v4();
        runs.create_run(run_id, "wf-engine", TriggerSource::Manual, Utc::now()).await.unwrap();
        let logger = RunLogger::new(runs.clone(), run_id);
        (engine, runs, logger)
    }

    #[tokio::test]
    async fn failing_node_does_not_halt_the_run() {
        let (engine, runs, mut logger) = setup().await;
        let wf = workflow(vec![
            node("start", NodeKind::Trigger, "manual", json!({})),
            node("fetch", NodeKind::Action, "http", json!({})),
            node("check", NodeKind::Logic, "conditional", json!({ "operand1": 2, "operator": "less_than", "operand2": 3 })),
        ]);

        let results = engine.execute(&wf, &mut logger).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["start", "fetch", "check"]);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("required"));
        assert_eq!(results[2].result.as_ref().unwrap()["result"], json!(true));

        let run = runs.get_run(logger.run_id()).await.unwrap().unwrap();
        assert_eq!(run.logs.len(), 6);
        assert_eq!(run.logs[0].message, "Starting execution of node: start node");
        assert_eq!(run.logs[3].level, LogLevel::Error);
    }

    #[tokio::test]
    async fn outputs_flow_into_later_transforms() {
        let (engine, _runs, mut logger) = setup().await;
        let wf = workflow(vec![
            node("shape", NodeKind::Logic, "transform", json!({ "operation": "JSON Parse", "input": "{\"user\":\"ada\"}" })),
            node("greet", NodeKind::Logic, "transform", json!({ "operation": "Extract Field", "field": "result.user" })),
        ]);

        let results = engine.execute(&wf, &mut logger).await.unwrap();
        assert_eq!(results[1].result.as_ref().unwrap()["result"], json!("ada"));
    }

    #[tokio::test]
    async fn duplicate_node_ids_abort_the_run() {
        let (engine, _runs, mut logger) = setup().await;
        let wf = workflow(vec![
            node("same", NodeKind::Trigger, "manual", json!({})),
            node("same", NodeKind::Action, "email", json!({})),
        ]);

        let err = engine.execute(&wf, &mut logger).await.unwrap_err();
        assert!(err.to_string().contains("duplicate node id"));
    }

    #[tokio::test]
    async fn oversized_delay_fails_only_its_node() {
        let (engine, _runs, mut logger) = setup().await;
        let wf = workflow(vec![
            node("wait", NodeKind::Logic, "delay", json!({ "duration": 1e300, "unit": "hours" })),
            node("after", NodeKind::Action, "email", json!({})),
        ]);

        let results = engine.execute(&wf, &mut logger).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("duration"));
        assert!(results[1].success);
    }
}
