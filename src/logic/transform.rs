/// Transform logic node
///
/// Reshapes data flowing through a run. The input is the node's explicit
/// `input` configuration when present, otherwise the payload of the most
/// recent successful node. Custom scripts run in a sandboxed Lua state on the
/// blocking pool.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{
        config::{NodeConfig, TransformOperation},
        types::Node,
    },
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use mlua::LuaSerdeExt;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Memory ceiling for a single script state
const SCRIPT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Wall-clock budget for a single script
const SCRIPT_TIME_LIMIT: Duration = Duration::from_secs(5);

/// Instructions between deadline checks
const SCRIPT_CHECK_INTERVAL: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct TransformHandler;

#[async_trait]
impl NodeHandler for TransformHandler {
    async fn execute(&self, node: &Node, config: &NodeConfig, context: &RunContext) -> Result<Value> {
        let NodeConfig::Transform(transform) = config else {
            anyhow::bail!("transform node cannot run a {} configuration", config.variant_name());
        };

        let input = transform
            .input
            .clone()
            .or_else(|| context.previous_output().cloned())
            .unwrap_or(Value::Null);

        tracing::debug!("🔧 Node '{}' applying {}", node.id, transform.operation.label());

        let value = match &transform.operation {
            TransformOperation::JsonParse => json_parse(&input)?,
            TransformOperation::JsonStringify => Value::String(serde_json::to_string(&input)?),
            TransformOperation::ExtractField { field } => extract_field(&input, field)?,
            TransformOperation::FormatString { template } => Value::String(format_template(template, &input)),
            TransformOperation::CustomScript { script } => {
                let script = script.clone();
                tokio::task::spawn_blocking(move || run_script(&script, &input, SCRIPT_TIME_LIMIT))
                    .await
                    .context("Script task aborted")??
            }
        };

        let mut out = serde_json::Map::new();
        out.insert(transform.output_field.clone(), value);
        out.insert("operation".to_string(), json!(transform.operation.label()));
        Ok(Value::Object(out))
    }
}

fn json_parse(input: &Value) -> Result<Value> {
    let Value::String(raw) = input else {
        anyhow::bail!("JSON Parse expects a string input");
    };
    serde_json::from_str(raw).context("Input is not valid JSON")
}

/// Dot path (`order.items.0.sku`) or JSONPath when the field starts with `$`
fn extract_field(input: &Value, field: &str) -> Result<Value> {
    if field.starts_with('$') {
        let matches = jsonpath_lib::select(input, field)
            .map_err(|e| anyhow::anyhow!("Invalid JSONPath '{}': {:?}", field, e))?;
        return Ok(match matches.as_slice() {
            [] => Value::Null,
            [single] => (*single).clone(),
            many => Value::Array(many.iter().map(|v| (*v).clone()).collect()),
        });
    }

    let mut current = input;
    for segment in field.split('.').filter(|s| !s.is_empty()) {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

/// Replace `{{name}}` with top-level input fields and `{{input}}` with the whole input
///
/// Unknown placeholders are left untouched.
fn format_template(template: &str, input: &Value) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        let name = rest[open + 2..open + 2 + close].trim();
        rendered.push_str(&rest[..open]);

        let replacement = if name == "input" {
            Some(input)
        } else {
            input.get(name)
        };
        match replacement {
            Some(value) => rendered.push_str(&display(value)),
            None => rendered.push_str(&rest[open..open + 4 + close]),
        }
        rest = &rest[open + 4 + close..];
    }

    rendered.push_str(rest);
    rendered
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluate a Lua chunk with `input` bound as a global
///
/// The chunk is aborted once it runs past `time_limit`.
fn run_script(script: &str, input: &Value, time_limit: Duration) -> Result<Value> {
    let lua = mlua::Lua::new();
    lua.set_memory_limit(SCRIPT_MEMORY_LIMIT)
        .map_err(|e| anyhow::anyhow!("Failed to limit script memory: {}", e))?;

    let deadline = Instant::now() + time_limit;
    lua.set_hook(
        mlua::HookTriggers::new().every_nth_instruction(SCRIPT_CHECK_INTERVAL),
        move |_lua, _debug| {
            if Instant::now() >= deadline {
                Err(mlua::Error::runtime(format!("time limit of {:?} exceeded", time_limit)))
            } else {
                Ok(mlua::VmState::Continue)
            }
        },
    )
    .map_err(|e| anyhow::anyhow!("Failed to limit script time: {}", e))?;

    let globals = lua.globals();
    for name in ["os", "io", "debug", "package", "require", "dofile", "loadfile", "load"] {
        globals
            .set(name, mlua::Nil)
            .map_err(|e| anyhow::anyhow!("Failed to sandbox script: {}", e))?;
    }

    let lua_input = lua
        .to_value(input)
        .map_err(|e| anyhow::anyhow!("Failed to pass input to script: {}", e))?;
    globals
        .set("input", lua_input)
        .map_err(|e| anyhow::anyhow!("Failed to pass input to script: {}", e))?;

    let result = lua
        .load(script)
        .set_name("transform")
        .eval::<mlua::Value>()
        .map_err(|e| anyhow::anyhow!("Script execution failed: {}", e))?;

    lua.from_value(result)
        .map_err(|e| anyhow::anyhow!("Script returned a value that is not JSON: {}", e))
}
