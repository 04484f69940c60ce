/// Action connectors and trigger handlers
///
/// - http: outbound HTTP requests
/// - slack: chat notifications through an incoming webhook
/// - database: JSON document collections in the data-store database
/// - passthrough: trigger acknowledgement and simulated actions

pub mod database;
pub mod http;
pub mod passthrough;
pub mod slack;
