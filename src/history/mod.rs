//! In-memory history store for replayed exchanges.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::GatecheckError;
use crate::scanner::{HistoryHandle, HistorySink, ReplayedExchange};

/// Keeps every recorded exchange in memory, with sequential handles.
#[derive(Default)]
pub struct InMemoryHistory {
    records: RwLock<Vec<ReplayedExchange>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistorySink for InMemoryHistory {
    async fn record(&self, exchange: &ReplayedExchange) -> Result<HistoryHandle, GatecheckError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| GatecheckError::Storage("history store poisoned".into()))?;
        records.push(exchange.clone());
        Ok(HistoryHandle(records.len() as u64 - 1))
    }

    async fn load(&self, handle: HistoryHandle) -> Result<ReplayedExchange, GatecheckError> {
        let records = self
            .records
            .read()
            .map_err(|_| GatecheckError::Storage("history store poisoned".into()))?;
        records
            .get(handle.0 as usize)
            .cloned()
            .ok_or_else(|| GatecheckError::Storage(format!("no history record {}", handle.0)))
    }
}
