//! Pool-source adapters.

use anyhow::{Context, Result};
use strategy::ports::{PoolSource, RawPoolRecord};
use tracing::info;

/// In-memory records, for tests and embedding.
#[derive(Default)]
pub struct StaticPoolSource {
    records: Vec<RawPoolRecord>,
}

impl StaticPoolSource {
    pub fn new(records: Vec<RawPoolRecord>) -> Self {
        Self { records }
    }
}

#[async_trait::async_trait]
impl PoolSource for StaticPoolSource {
    async fn load(&self) -> Result<Vec<RawPoolRecord>> {
        Ok(self.records.clone())
    }
}

/// Reads a cache file holding either a JSON array of raw records or an
/// object with a `pools` array (both shapes exist in the wild).
pub struct JsonFilePoolSource {
    path: String,
}

impl JsonFilePoolSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl PoolSource for JsonFilePoolSource {
    async fn load(&self) -> Result<Vec<RawPoolRecord>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading pool cache {}", self.path))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", self.path))?;
        let records = match value {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(mut map) => match map.remove("pools") {
                Some(serde_json::Value::Array(items)) => items,
                _ => anyhow::bail!("{} holds neither an array nor a pools array", self.path),
            },
            _ => anyhow::bail!("{} holds neither an array nor a pools array", self.path),
        };
        info!(count = records.len(), path = %self.path, "loaded pool cache");
        Ok(records)
    }
}
