/// Lock-free node handler registry using ArcSwap
///
/// Maps `(kind, subtype)` to the handler that executes it, with a per-kind
/// fallback for subtypes nobody registered. Each registration swaps the whole
/// map pointer, so runs that are already dispatching keep reading the map they
/// loaded while new handlers become visible to the next lookup.

use crate::{
    connectors::{
        database::DataStoreConnector,
        http::HttpConnector,
        passthrough::{SimulatedAction, TriggerAcknowledgement},
        slack::SlackConnector,
    },
    logic::{
        conditional::ConditionalHandler, delay::DelayHandler, error_handler::ErrorHandlerNode,
        transform::TransformHandler,
    },
    runtime::executor::NodeHandler,
    workflow::types::NodeKind,
};
use arc_swap::ArcSwap;
use sqlx::sqlite::SqlitePool;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

type HandlerKey = (NodeKind, String);

/// Shared clients the built-in connectors are constructed with
#[derive(Debug, Clone)]
pub struct ConnectorDeps {
    /// Shared HTTP client for network connectors
    pub http: reqwest::Client,
    /// Bound on every outbound network call
    pub http_timeout: Duration,
    /// Pool for the data-store connector
    pub datastore: SqlitePool,
}

pub struct HandlerRegistry {
    /// Exact `(kind, subtype)` handlers
    handlers: ArcSwap<HashMap<HandlerKey, Arc<dyn NodeHandler>>>,
    /// Handlers used when no exact match exists
    fallbacks: ArcSwap<HashMap<NodeKind, Arc<dyn NodeHandler>>>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::new(Arc::new(HashMap::new())),
            fallbacks: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Registry with every built-in connector, logic handler, and trigger
    pub fn with_builtins(deps: ConnectorDeps) -> Self {
        let registry = Self::new();

        registry.register(
            NodeKind::Action,
            "http",
            Arc::new(HttpConnector::new(deps.http.clone(), deps.http_timeout)),
        );
        registry.register(
            NodeKind::Action,
            "slack",
            Arc::new(SlackConnector::new(deps.http.clone(), deps.http_timeout)),
        );
        registry.register(
            NodeKind::Action,
            "database",
            Arc::new(DataStoreConnector::new(deps.datastore.clone())),
        );

        registry.register(NodeKind::Logic, "conditional", Arc::new(ConditionalHandler));
        registry.register(NodeKind::Logic, "delay", Arc::new(DelayHandler));
        registry.register(NodeKind::Logic, "error-handler", Arc::new(ErrorHandlerNode));
        registry.register(NodeKind::Logic, "transform", Arc::new(TransformHandler));

        registry.register_fallback(NodeKind::Trigger, Arc::new(TriggerAcknowledgement));
        registry.register_fallback(NodeKind::Action, Arc::new(SimulatedAction));

        tracing::debug!("📦 Registered {} built-in node handlers", registry.handlers.load().len());
        registry
    }

    /// Register (or replace) the handler for one subtype
    pub fn register(&self, kind: NodeKind, subtype: &str, handler: Arc<dyn NodeHandler>) {
        let key = (kind, subtype.to_string());
        self.handlers.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(key.clone(), Arc::clone(&handler));
            next
        });
    }

    /// Register the handler used for unmatched subtypes of a kind
    pub fn register_fallback(&self, kind: NodeKind, handler: Arc<dyn NodeHandler>) {
        self.fallbacks.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(kind, Arc::clone(&handler));
            next
        });
    }

    /// Find the handler for a node, falling back per kind
    pub fn resolve(&self, kind: NodeKind, subtype: &str) -> Option<Arc<dyn NodeHandler>> {
        if let Some(handler) = self.handlers.load().get(&(kind, subtype.to_string())) {
            return Some(Arc::clone(handler));
        }
        self.fallbacks.load().get(&kind).cloned()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.load();
        let mut keys: Vec<String> = handlers
            .keys()
            .map(|(kind, subtype)| format!("{}/{}", kind, subtype))
            .collect();
        keys.sort();
        let fallbacks: Vec<NodeKind> = self.fallbacks.load().keys().copied().collect();

        f.debug_struct("HandlerRegistry")
            .field("handlers", &keys)
            .field("fallbacks", &fallbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn builtin_registry() -> HandlerRegistry {
        let db = Database::in_memory().await.unwrap();
        HandlerRegistry::with_builtins(ConnectorDeps {
            http: reqwest::Client::new(),
            http_timeout: Duration::from_secs(30),
            datastore: db.datastore.clone(),
        })
    }

    #[tokio::test]
    async fn builtins_cover_the_dispatch_table() {
        let registry = builtin_registry().await;

        for subtype in ["http", "slack", "database"] {
            assert!(registry.resolve(NodeKind::Action, subtype).is_some(), "action {}", subtype);
        }
        for subtype in ["conditional", "delay", "error-handler", "transform"] {
            assert!(registry.resolve(NodeKind::Logic, subtype).is_some(), "logic {}", subtype);
        }

        // fallbacks
        assert!(registry.resolve(NodeKind::Trigger, "gmail").is_some());
        assert!(registry.resolve(NodeKind::Action, "sms").is_some());
        assert!(registry.resolve(NodeKind::Logic, "loop").is_none());
    }

    #[tokio::test]
    async fn debug_lists_registered_keys() {
        let registry = builtin_registry().await;
        let rendered = format!("{:?}", registry);
        assert!(rendered.contains("action/http"));
        assert!(rendered.contains("logic/transform"));
    }
}
