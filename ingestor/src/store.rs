use crate::model::Reading;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory latest-reading-per-device table.
///
/// Cloning yields another handle to the same table. Each entry is replaced
/// whole under the write lock, so readers never observe a partial reading.
#[derive(Debug, Clone, Default)]
pub struct ReadingStore {
    inner: Arc<RwLock<HashMap<String, Reading>>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any previous reading for `device_id`.
    ///
    /// Returns the number of devices stored, counted under the same lock.
    pub async fn put(&self, device_id: &str, reading: Reading) -> usize {
        let mut readings = self.inner.write().await;
        readings.insert(device_id.to_string(), reading);
        readings.len()
    }

    pub async fn get(&self, device_id: &str) -> Option<Reading> {
        self.inner.read().await.get(device_id).cloned()
    }

    /// Devices with a stored reading, sorted.
    pub async fn list_device_ids(&self) -> Vec<String> {
        let readings = self.inner.read().await;
        let mut ids: Vec<String> = readings.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}
