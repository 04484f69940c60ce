/// Data-store connector
///
/// Stores JSON documents in per-table collections inside the data-store
/// SQLite database. Each configured table maps to a `ds_<table>` SQL table
/// created on first use.

use crate::{
    runtime::executor::{NodeHandler, RunContext},
    workflow::{
        config::{DataOperation, DataStoreConfig, NodeConfig},
        types::Node,
    },
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::{sqlite::SqlitePool, Row};

#[derive(Debug, Clone)]
pub struct DataStoreConnector {
    pool: SqlitePool,
}

/// A value bound into a field filter
enum FilterValue {
    Text(String),
    Integer(i64),
    Real(f64),
    /// Nested objects/arrays, compared as normalised JSON text
    Json(String),
}

impl DataStoreConnector {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn apply(&self, config: &DataStoreConfig) -> Result<Value> {
        let table = self.ensure_table_exists(&config.table).await?;

        let mut payload = match config.operation {
            DataOperation::Insert => self.insert(&table, config).await?,
            DataOperation::Select => self.select(&table, config).await?,
            DataOperation::Update => self.update(&table, config).await?,
            DataOperation::Delete => self.delete(&table, config).await?,
        };

        payload["success"] = json!(true);
        payload["operation"] = json!(config.operation.as_str());
        payload["table"] = json!(config.table);
        Ok(payload)
    }

    /// Ensure the backing table exists; returns its SQL name
    ///
    /// The table name was restricted to letters, digits, and underscores when
    /// the configuration was parsed.
    async fn ensure_table_exists(&self, table: &str) -> Result<String> {
        let sql_table = format!("ds_{}", table);
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            sql_table
        );

        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to prepare table '{}'", table))?;
        Ok(sql_table)
    }

    async fn insert(&self, sql_table: &str, config: &DataStoreConfig) -> Result<Value> {
        let data = config.data.as_ref().context("data is required")?;
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(&format!(
            "INSERT INTO {} (data, created_at, updated_at) VALUES (?, ?, ?)",
            sql_table
        ))
        .bind(serde_json::to_string(data)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Data store insert failed")?;

        tracing::info!("✅ Data store insert into {}: id {}", config.table, result.last_insert_rowid());
        Ok(json!({ "id": result.last_insert_rowid() }))
    }

    async fn select(&self, sql_table: &str, config: &DataStoreConfig) -> Result<Value> {
        let mut sql = format!("SELECT id, data FROM {}", sql_table);
        // (json path, comparison value); None means an IS NULL check
        let mut binds: Vec<(String, Option<FilterValue>)> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        // Filter keys are bound as JSON paths, never interpolated
        for (field, value) in &config.filter {
            let path = format!("$.{}", field);
            let bound = match value {
                Value::Null => None,
                Value::Bool(b) => Some(FilterValue::Integer(i64::from(*b))),
                Value::Number(n) => Some(match n.as_i64() {
                    Some(i) => FilterValue::Integer(i),
                    None => FilterValue::Real(n.as_f64().unwrap_or(f64::NAN)),
                }),
                Value::String(s) => Some(FilterValue::Text(s.clone())),
                other => Some(FilterValue::Json(other.to_string())),
            };
            clauses.push(match &bound {
                None => "json_extract(data, ?) IS NULL".to_string(),
                Some(FilterValue::Json(_)) => "json_extract(data, ?) = json(?)".to_string(),
                Some(_) => "json_extract(data, ?) = ?".to_string(),
            });
            binds.push((path, bound));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id LIMIT ?");

        let mut query = sqlx::query(&sql);
        for (path, value) in &binds {
            query = query.bind(path.as_str());
            query = match value {
                None => query,
                Some(FilterValue::Text(s)) | Some(FilterValue::Json(s)) => query.bind(s.as_str()),
                Some(FilterValue::Integer(i)) => query.bind(*i),
                Some(FilterValue::Real(f)) => query.bind(*f),
            };
        }
        query = query.bind(config.limit);

        let rows = query.fetch_all(&self.pool).await.context("Data store query failed")?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let data: String = row.try_get("data")?;
            documents.push(json!({ "id": id, "data": serde_json::from_str::<Value>(&data)? }));
        }

        tracing::info!("✅ Data store query on {}: {} rows returned", config.table, documents.len());
        Ok(json!({ "count": documents.len(), "rows": documents }))
    }

    async fn update(&self, sql_table: &str, config: &DataStoreConfig) -> Result<Value> {
        let id = config.id.context("id is required")?;
        let data: &Map<String, Value> = config.data.as_ref().context("data is required")?;

        let result = sqlx::query(&format!(
            "UPDATE {} SET data = json_patch(data, ?), updated_at = ? WHERE id = ?",
            sql_table
        ))
        .bind(serde_json::to_string(data)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Data store update failed")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("No row with id {} in table '{}'", id, config.table);
        }
        Ok(json!({ "id": id, "affected": result.rows_affected() }))
    }

    async fn delete(&self, sql_table: &str, config: &DataStoreConfig) -> Result<Value> {
        let id = config.id.context("id is required")?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", sql_table))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Data store delete failed")?;

        Ok(json!({ "id": id, "affected": result.rows_affected() }))
    }
}

#[async_trait]
impl NodeHandler for DataStoreConnector {
    async fn execute(&self, node: &Node, config: &NodeConfig, _context: &RunContext) -> Result<Value> {
        tracing::debug!("💾 Executing database action: {}", node.id);
        match config {
            NodeConfig::DataStore(store) => self.apply(store).await,
            other => anyhow::bail!("database connector cannot run a {} configuration", other.variant_name()),
        }
    }
}
