//! Notification-state table shared by the poll task and the shutdown path.
//!
//! A key is present iff an alert for that slot is currently showing. Every
//! read-modify-write goes through the one mutex, and the guard is held from
//! the decision until the table is updated.

use slot_types::{MessageHandle, SlotKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub type SlotMap = HashMap<SlotKey, MessageHandle>;

#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    inner: Arc<Mutex<SlotMap>>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scoped access; the guard is released when dropped on any exit path
    pub async fn lock(&self) -> MutexGuard<'_, SlotMap> {
        self.inner.lock().await
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Sorted copy of the current entries
    pub async fn snapshot(&self) -> Vec<(SlotKey, MessageHandle)> {
        let guard = self.inner.lock().await;
        let mut entries: Vec<_> = guard
            .iter()
            .map(|(key, handle)| (key.clone(), handle.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
