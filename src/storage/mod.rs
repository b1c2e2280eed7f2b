// src/storage/mod.rs
use crate::error::StoreError;
use crate::types::TradeRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Audit trail of executed trades. The engine never reads it back to make decisions.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn save_trade(&self, record: &TradeRecord) -> Result<(), StoreError>;

    /// Up to `limit` records, newest first.
    async fn get_trade_history(&self, limit: usize) -> Result<Vec<TradeRecord>, StoreError>;
}

/// One JSON document per line, appended as trades happen.
pub struct JsonlTradeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTradeStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TradeStore for JsonlTradeStore {
    async fn save_trade(&self, record: &TradeRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn get_trade_history(&self, limit: usize) -> Result<Vec<TradeRecord>, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in data.lines().rev().filter(|l| !l.trim().is_empty()) {
            if records.len() >= limit {
                break;
            }
            match serde_json::from_str::<TradeRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable trade record in {:?}: {}", self.path, e),
            }
        }
        Ok(records)
    }
}

/// Keeps trades in memory only; for dry runs and tests.
#[derive(Default)]
pub struct MemoryTradeStore {
    records: Mutex<Vec<TradeRecord>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn save_trade(&self, record: &TradeRecord) -> Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn get_trade_history(&self, limit: usize) -> Result<Vec<TradeRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}
