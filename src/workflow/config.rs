/// Typed node configuration
///
/// The editor saves node configuration as a free-form JSON mapping. Before a
/// run starts, every node's mapping is parsed into one [`NodeConfig`] variant
/// keyed by its kind and subtype. A parse failure does not reject the
/// workflow: it is kept next to the node and reported as that node's failure
/// when the run reaches it.

use crate::workflow::types::NodeKind;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Validation failure for a node's configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required key is absent, null, or blank
    #[error("{0} is required")]
    Missing(&'static str),
    /// A key is present but holds an unusable value
    #[error("{key} must be {expected}")]
    Invalid { key: &'static str, expected: String },
}

/// Parsed configuration for one node, tagged by subtype
#[derive(Debug, Clone)]
pub enum NodeConfig {
    Http(HttpConfig),
    Slack(SlackConfig),
    DataStore(DataStoreConfig),
    Conditional(ConditionalConfig),
    Delay(DelayConfig),
    ErrorHandler(ErrorHandlerConfig),
    Transform(TransformConfig),
    Schedule(ScheduleConfig),
    Webhook(WebhookConfig),
    /// Subtypes without a built-in schema keep their raw mapping
    Passthrough(Map<String, Value>),
}

impl NodeConfig {
    /// Parse a raw configuration mapping for the given node kind and subtype
    pub fn parse(kind: NodeKind, subtype: &str, raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let config = match (kind, subtype) {
            (NodeKind::Action, "http") => NodeConfig::Http(HttpConfig::parse(raw)?),
            (NodeKind::Action, "slack") => NodeConfig::Slack(SlackConfig::parse(raw)?),
            (NodeKind::Action, "database") => NodeConfig::DataStore(DataStoreConfig::parse(raw)?),
            (NodeKind::Logic, "conditional") => NodeConfig::Conditional(ConditionalConfig::parse(raw)?),
            (NodeKind::Logic, "delay") => NodeConfig::Delay(DelayConfig::parse(raw)?),
            (NodeKind::Logic, "error-handler") => NodeConfig::ErrorHandler(ErrorHandlerConfig::parse(raw)?),
            (NodeKind::Logic, "transform") => NodeConfig::Transform(TransformConfig::parse(raw)?),
            (NodeKind::Trigger, "schedule") => NodeConfig::Schedule(ScheduleConfig::parse(raw)),
            (NodeKind::Trigger, "webhook") => NodeConfig::Webhook(WebhookConfig::parse(raw)),
            _ => NodeConfig::Passthrough(raw.clone()),
        };
        Ok(config)
    }

    /// Short variant name used in mismatch errors
    pub fn variant_name(&self) -> &'static str {
        match self {
            NodeConfig::Http(_) => "http",
            NodeConfig::Slack(_) => "slack",
            NodeConfig::DataStore(_) => "database",
            NodeConfig::Conditional(_) => "conditional",
            NodeConfig::Delay(_) => "delay",
            NodeConfig::ErrorHandler(_) => "error-handler",
            NodeConfig::Transform(_) => "transform",
            NodeConfig::Schedule(_) => "schedule",
            NodeConfig::Webhook(_) => "webhook",
            NodeConfig::Passthrough(_) => "passthrough",
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Network call
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub url: String,
    /// Upper-case HTTP method
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

const HTTP_METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"];

impl HttpConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let url = require_text(raw, "url")?;
        let method = text(raw, "method")
            .map(|m| m.trim().to_uppercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "GET".to_string());
        if !HTTP_METHODS.contains(&method.as_str()) {
            return Err(ConfigError::Invalid {
                key: "method",
                expected: format!("one of {}", HTTP_METHODS.join(", ")),
            });
        }

        Ok(Self {
            url,
            method,
            headers: string_pairs(raw, "headers")?,
            body: raw.get("body").filter(|b| !b.is_null()).cloned(),
        })
    }
}

/// Chat notification
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub channel: String,
    pub message: String,
    /// Incoming-webhook URL; without it the send is simulated
    pub webhook_url: Option<String>,
}

impl SlackConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            channel: require_text(raw, "channel")?,
            message: require_text(raw, "message")?,
            webhook_url: text_any(raw, &["webhookUrl", "webhook_url"]).filter(|u| !u.trim().is_empty()),
        })
    }
}

/// Data-store operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOperation {
    Insert,
    Select,
    Update,
    Delete,
}

impl DataOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataOperation::Insert => "insert",
            DataOperation::Select => "select",
            DataOperation::Update => "update",
            DataOperation::Delete => "delete",
        }
    }
}

/// Data-store operation against a named document table
#[derive(Debug, Clone)]
pub struct DataStoreConfig {
    pub operation: DataOperation,
    pub table: String,
    /// Document body for insert/update
    pub data: Option<Map<String, Value>>,
    /// Top-level field equality filter for select
    pub filter: Map<String, Value>,
    pub limit: i64,
    /// Row id for update/delete
    pub id: Option<i64>,
}

impl DataStoreConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let operation = match require_text(raw, "operation")?.trim().to_lowercase().as_str() {
            "insert" => DataOperation::Insert,
            "select" | "query" => DataOperation::Select,
            "update" => DataOperation::Update,
            "delete" => DataOperation::Delete,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "operation",
                    expected: "one of insert, select, update, delete".to_string(),
                })
            }
        };

        let table = require_text(raw, "table")?;
        if table.len() > 64 || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Invalid {
                key: "table",
                expected: "letters, digits, or underscores".to_string(),
            });
        }

        let data = match raw.get("data") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => {
                return Err(ConfigError::Invalid { key: "data", expected: "an object".to_string() })
            }
        };

        let filter = match raw.get("where") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ConfigError::Invalid { key: "where", expected: "an object".to_string() })
            }
        };

        let limit = match raw.get("limit") {
            None | Some(Value::Null) => 100,
            Some(value) => number(value)
                .filter(|n| *n >= 1.0)
                .map(|n| n as i64)
                .ok_or(ConfigError::Invalid { key: "limit", expected: "a positive number".to_string() })?,
        };

        let id = match raw.get("id") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                number(value)
                    .filter(|n| n.fract() == 0.0)
                    .map(|n| n as i64)
                    .ok_or(ConfigError::Invalid { key: "id", expected: "an integer".to_string() })?,
            ),
        };

        match operation {
            DataOperation::Insert if data.is_none() => return Err(ConfigError::Missing("data")),
            DataOperation::Update if id.is_none() => return Err(ConfigError::Missing("id")),
            DataOperation::Update if data.is_none() => return Err(ConfigError::Missing("data")),
            DataOperation::Delete if id.is_none() => return Err(ConfigError::Missing("id")),
            _ => {}
        }

        Ok(Self { operation, table, data, filter, limit, id })
    }
}

// ---------------------------------------------------------------------------
// Logic
// ---------------------------------------------------------------------------

/// `operand1 <operator> operand2`
#[derive(Debug, Clone)]
pub struct ConditionalConfig {
    pub operand1: Value,
    /// Kept verbatim; unknown operators evaluate to false
    pub operator: String,
    pub operand2: Value,
}

impl ConditionalConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            operand1: require_present(raw, "operand1")?,
            operator: require_text(raw, "operator")?,
            operand2: require_present(raw, "operand2")?,
        })
    }
}

/// Unit for delay durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayUnit {
    Seconds,
    Minutes,
    Hours,
}

impl DelayUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayUnit::Seconds => "seconds",
            DelayUnit::Minutes => "minutes",
            DelayUnit::Hours => "hours",
        }
    }

    fn seconds(&self) -> f64 {
        match self {
            DelayUnit::Seconds => 1.0,
            DelayUnit::Minutes => 60.0,
            DelayUnit::Hours => 3600.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelayConfig {
    pub amount: f64,
    pub unit: DelayUnit,
    total: Duration,
}

impl DelayConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let amount = match raw.get("duration") {
            None | Some(Value::Null) => return Err(ConfigError::Missing("duration")),
            Some(value) => number(value)
                .filter(|n| n.is_finite() && *n >= 0.0)
                .ok_or(ConfigError::Invalid {
                    key: "duration",
                    expected: "a non-negative number".to_string(),
                })?,
        };

        let unit = match text(raw, "unit").map(|u| u.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("seconds") | Some("second") => DelayUnit::Seconds,
            Some("minutes") | Some("minute") => DelayUnit::Minutes,
            Some("hours") | Some("hour") => DelayUnit::Hours,
            Some(_) => {
                return Err(ConfigError::Invalid {
                    key: "unit",
                    expected: "one of seconds, minutes, hours".to_string(),
                })
            }
        };

        let total = Duration::try_from_secs_f64(amount * unit.seconds()).map_err(|_| ConfigError::Invalid {
            key: "duration",
            expected: "a delay that fits in a duration".to_string(),
        })?;

        Ok(Self { amount, unit, total })
    }

    /// Total suspension time
    pub fn duration(&self) -> Duration {
        self.total
    }
}

/// Bookkeeping action performed by an error-handler node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    LogError,
    SendNotification,
    Retry,
    StopWorkflow,
}

impl ErrorAction {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorAction::LogError => "Log Error",
            ErrorAction::SendNotification => "Send Notification",
            ErrorAction::Retry => "Retry",
            ErrorAction::StopWorkflow => "Stop Workflow",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorHandlerConfig {
    pub action: ErrorAction,
    pub message: String,
    pub retry_count: u32,
}

impl ErrorHandlerConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let action = match require_text(raw, "action")?.trim() {
            "Log Error" => ErrorAction::LogError,
            "Send Notification" => ErrorAction::SendNotification,
            "Retry" => ErrorAction::Retry,
            "Stop Workflow" => ErrorAction::StopWorkflow,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "action",
                    expected: "one of Log Error, Send Notification, Retry, Stop Workflow".to_string(),
                })
            }
        };

        let retry_count = match raw.get("retryCount").or_else(|| raw.get("retry_count")) {
            None | Some(Value::Null) => 3,
            Some(value) => number(value)
                .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                .map(|n| n as u32)
                .ok_or(ConfigError::Invalid {
                    key: "retryCount",
                    expected: "a non-negative integer".to_string(),
                })?,
        };

        Ok(Self {
            action,
            message: text(raw, "message")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "An error occurred".to_string()),
            retry_count,
        })
    }
}

/// Transformation applied by a transform node
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOperation {
    JsonParse,
    JsonStringify,
    ExtractField { field: String },
    FormatString { template: String },
    CustomScript { script: String },
}

impl TransformOperation {
    pub fn label(&self) -> &'static str {
        match self {
            TransformOperation::JsonParse => "JSON Parse",
            TransformOperation::JsonStringify => "JSON Stringify",
            TransformOperation::ExtractField { .. } => "Extract Field",
            TransformOperation::FormatString { .. } => "Format String",
            TransformOperation::CustomScript { .. } => "Custom Script",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub operation: TransformOperation,
    /// Name of the field the result is published under
    pub output_field: String,
    /// Explicit input; when absent the previous node's output is used
    pub input: Option<Value>,
}

impl TransformConfig {
    fn parse(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let operation = match require_text(raw, "operation")?.trim() {
            "JSON Parse" => TransformOperation::JsonParse,
            "JSON Stringify" => TransformOperation::JsonStringify,
            "Extract Field" => TransformOperation::ExtractField { field: require_text(raw, "field")? },
            "Format String" => TransformOperation::FormatString { template: require_text(raw, "template")? },
            "Custom Script" => TransformOperation::CustomScript { script: require_text(raw, "script")? },
            _ => {
                return Err(ConfigError::Invalid {
                    key: "operation",
                    expected: "one of JSON Parse, JSON Stringify, Extract Field, Format String, Custom Script"
                        .to_string(),
                })
            }
        };

        let output_field = text_any(raw, &["outputField", "output_field"])
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "result".to_string());
        // the operation label is published alongside the result
        if output_field == "operation" {
            return Err(ConfigError::Invalid {
                key: "outputField",
                expected: "a field name other than operation".to_string(),
            });
        }

        Ok(Self {
            operation,
            output_field,
            input: raw.get("input").filter(|v| !v.is_null()).cloned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Fixed schedule intervals offered by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleInterval {
    EveryFiveMinutes,
    Hourly,
    Daily,
    Weekly,
}

impl ScheduleInterval {
    /// Map an editor label to an interval; unknown labels mean hourly
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Every 5 minutes" => ScheduleInterval::EveryFiveMinutes,
            "Every hour" => ScheduleInterval::Hourly,
            "Daily" => ScheduleInterval::Daily,
            "Weekly" => ScheduleInterval::Weekly,
            _ => ScheduleInterval::Hourly,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScheduleInterval::EveryFiveMinutes => "Every 5 minutes",
            ScheduleInterval::Hourly => "Every hour",
            ScheduleInterval::Daily => "Daily",
            ScheduleInterval::Weekly => "Weekly",
        }
    }

    pub fn period(&self) -> chrono::Duration {
        match self {
            ScheduleInterval::EveryFiveMinutes => chrono::Duration::minutes(5),
            ScheduleInterval::Hourly => chrono::Duration::hours(1),
            ScheduleInterval::Daily => chrono::Duration::days(1),
            ScheduleInterval::Weekly => chrono::Duration::weeks(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval: ScheduleInterval,
}

impl ScheduleConfig {
    pub fn parse(raw: &Map<String, Value>) -> Self {
        let interval = text(raw, "interval")
            .map(|label| ScheduleInterval::from_label(&label))
            .unwrap_or(ScheduleInterval::Hourly);
        Self { interval }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Path segment the inbound receiver matches, normalised with a leading '/'
    pub path: Option<String>,
}

impl WebhookConfig {
    pub fn parse(raw: &Map<String, Value>) -> Self {
        let path = text(raw, "path")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(|p| if p.starts_with('/') { p } else { format!("/{}", p) });
        Self { path }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// String coercion of a configuration value; null and absent keys yield None
fn text(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text_any(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(raw, key))
}

fn require_text(raw: &Map<String, Value>, key: &'static str) -> Result<String, ConfigError> {
    text(raw, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn require_present(raw: &Map<String, Value>, key: &'static str) -> Result<Value, ConfigError> {
    raw.get(key)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or(ConfigError::Missing(key))
}

/// Numbers may arrive as JSON numbers or numeric strings from form inputs
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_pairs(raw: &Map<String, Value>, key: &'static str) -> Result<Vec<(String, String)>, ConfigError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect()),
        Some(_) => Err(ConfigError::Invalid { key, expected: "an object".to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn http_without_url_reports_required() {
        let err = NodeConfig::parse(NodeKind::Action, "http", &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "url is required");

        let blank = map(json!({ "url": "   " }));
        assert_eq!(HttpConfig::parse(&blank).unwrap_err(), ConfigError::Missing("url"));
    }

    #[test]
    fn http_defaults_to_get_and_collects_headers() {
        let cfg = HttpConfig::parse(&map(json!({
            "url": "http://example.test",
            "method": "post",
            "headers": { "X-Token": "abc", "X-Retry": 2 }
        })))
        .unwrap();
        assert_eq!(cfg.method, "POST");
        assert!(cfg.headers.contains(&("X-Retry".to_string(), "2".to_string())));

        let get = HttpConfig::parse(&map(json!({ "url": "http://example.test" }))).unwrap();
        assert_eq!(get.method, "GET");
        assert!(HttpConfig::parse(&map(json!({ "url": "http://x", "method": "BREW" }))).is_err());
    }

    #[test]
    fn data_store_checks_operation_specific_keys() {
        let err = DataStoreConfig::parse(&map(json!({ "operation": "insert", "table": "orders" }))).unwrap_err();
        assert_eq!(err.to_string(), "data is required");

        let err = DataStoreConfig::parse(&map(json!({ "operation": "delete", "table": "orders" }))).unwrap_err();
        assert_eq!(err.to_string(), "id is required");

        let err = DataStoreConfig::parse(&map(json!({ "operation": "select", "table": "orders; drop" }))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "table", .. }));

        let cfg = DataStoreConfig::parse(&map(json!({ "operation": "query", "table": "orders" }))).unwrap();
        assert_eq!(cfg.operation, DataOperation::Select);
        assert_eq!(cfg.limit, 100);
    }

    #[test]
    fn delay_units_and_validation() {
        let cfg = DelayConfig::parse(&map(json!({ "duration": 2 }))).unwrap();
        assert_eq!(cfg.duration(), Duration::from_secs(2));

        let cfg = DelayConfig::parse(&map(json!({ "duration": "1.5", "unit": "minutes" }))).unwrap();
        assert_eq!(cfg.duration(), Duration::from_secs(90));

        assert_eq!(DelayConfig::parse(&Map::new()).unwrap_err().to_string(), "duration is required");
        assert!(DelayConfig::parse(&map(json!({ "duration": -1 }))).is_err());
        assert!(DelayConfig::parse(&map(json!({ "duration": 1, "unit": "fortnights" }))).is_err());

        let err = DelayConfig::parse(&map(json!({ "duration": 1e300, "unit": "hours" }))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "duration", .. }));
    }

    #[test]
    fn error_handler_defaults() {
        let cfg = ErrorHandlerConfig::parse(&map(json!({ "action": "Retry" }))).unwrap();
        assert_eq!(cfg.action, ErrorAction::Retry);
        assert_eq!(cfg.retry_count, 3);
        assert_eq!(cfg.message, "An error occurred");

        let err = ErrorHandlerConfig::parse(&Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "action is required");
    }

    #[test]
    fn transform_requires_operation_specific_keys() {
        let err = TransformConfig::parse(&map(json!({ "operation": "Extract Field" }))).unwrap_err();
        assert_eq!(err.to_string(), "field is required");

        let cfg = TransformConfig::parse(&map(json!({
            "operation": "Format String",
            "template": "Hi {{name}}",
            "outputField": "greeting"
        })))
        .unwrap();
        assert_eq!(cfg.output_field, "greeting");
        assert_eq!(cfg.operation.label(), "Format String");
    }

    #[test]
    fn schedule_labels_default_to_hourly() {
        assert_eq!(ScheduleInterval::from_label("Every 5 minutes").period(), chrono::Duration::minutes(5));
        assert_eq!(ScheduleInterval::from_label("Weekly"), ScheduleInterval::Weekly);
        assert_eq!(ScheduleInterval::from_label("every fortnight"), ScheduleInterval::Hourly);
        assert_eq!(ScheduleConfig::parse(&Map::new()).interval, ScheduleInterval::Hourly);
    }

    #[test]
    fn unknown_subtypes_pass_through() {
        let raw = map(json!({ "to": "ops@example.test" }));
        match NodeConfig::parse(NodeKind::Trigger, "gmail", &raw).unwrap() {
            NodeConfig::Passthrough(kept) => assert_eq!(kept, raw),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn webhook_path_is_normalised() {
        let cfg = WebhookConfig::parse(&map(json!({ "path": "orders" })));
        assert_eq!(cfg.path.as_deref(), Some("/orders"));
    }
}
