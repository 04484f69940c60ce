/// Conditional logic node
///
/// Evaluates `operand1 <operator> operand2`. Numeric comparators parse both
/// sides as floating point; every other operator compares the string forms.
/// An unrecognised operator is simply false. The outcome does not prune later
/// nodes: the run continues in node order either way.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{config::NodeConfig, types::Node},
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct ConditionalHandler;

#[async_trait]
impl NodeHandler for ConditionalHandler {
    async fn execute(&self, node: &Node, config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        let NodeConfig::Conditional(condition) = config else {
            anyhow::bail!("conditional node cannot run a {} configuration", config.variant_name());
        };

        let left = coerce(&condition.operand1);
        let right = coerce(&condition.operand2);
        let result = evaluate(&left, &condition.operator, &right);

        tracing::debug!("🔀 Condition on '{}': {} {} {} => {}", node.id, left, condition.operator, right, result);

        Ok(json!({
            "result": result,
            "condition": format!("{} {} {}", left, condition.operator, right),
        }))
    }
}

/// Pure condition evaluation
pub fn evaluate(operand1: &str, operator: &str, operand2: &str) -> bool {
    match operator {
        "equals" => operand1 == operand2,
        "not_equals" => operand1 != operand2,
        "greater_than" => numeric(operand1) > numeric(operand2),
        "less_than" => numeric(operand1) < numeric(operand2),
        "contains" => operand1.contains(operand2),
        "starts_with" => operand1.starts_with(operand2),
        "ends_with" => operand1.ends_with(operand2),
        _ => false,
    }
}

/// Unparseable numbers become NaN so every comparison with them is false
fn numeric(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(f64::NAN)
}

/// String coercion of a configured operand
fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::PreparedNode;
    use crate::workflow::types::NodeKind;
    use uuid::Uuid;

    #[test]
    fn evaluates_documented_cases() {
        assert!(evaluate("5", "greater_than", "3"));
        assert!(evaluate("abc", "equals", "abc"));
        assert!(!evaluate("x", "bogus_operator", "y"));
    }

    #[test]
    fn numeric_comparisons_are_not_lexical() {
        assert!(evaluate("10", "greater_than", "9"));
        assert!(evaluate("2.5", "less_than", "10"));
        assert!(!evaluate("ten", "greater_than", "9"));
        assert!(!evaluate("ten", "less_than", "9"));
    }

    #[test]
    fn string_operators() {
        assert!(evaluate("hello world", "contains", "lo w"));
        assert!(evaluate("hello", "starts_with", "he"));
        assert!(evaluate("hello", "ends_with", "llo"));
        assert!(evaluate("a", "not_equals", "b"));
        assert!(!evaluate("5", "equals", "5.0"));
    }

    #[tokio::test]
    async fn handler_coerces_operands_and_restates_condition() {
        let prepared = PreparedNode::prepare(&Node {
            id: "check".to_string(),
            kind: NodeKind::Logic,
            subtype: "conditional".to_string(),
            label: "Check".to_string(),
            config: json!({ "operand1": 5, "operator": "greater_than", "operand2": "3" })
                .as_object()
                .cloned()
                .unwrap(),
            position: None,
        });
        let config = prepared.config.as_ref().unwrap();

        let out = ConditionalHandler
            .execute(&prepared.node, config, &RunContext::new("wf", Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(out, json!({ "result": true, "condition": "5 greater_than 3" }));
    }
}
