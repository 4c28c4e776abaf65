//! In-process device registry

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::DeviceRegistry;
use crate::error::RegistryError;
use crate::models::{DeviceDescriptor, LogicalDevice};

/// Registry keeping devices in memory, ordered by id
pub struct MemoryRegistry {
    devices: RwLock<BTreeMap<String, LogicalDevice>>,
    /// Total mutating calls, for status reporting
    writes: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn register_devices(&self, devices: &[DeviceDescriptor]) -> Result<(), RegistryError> {
        let mut map = self.devices.write().await;
        for descriptor in devices {
            map.insert(descriptor.id.clone(), LogicalDevice::from_descriptor(descriptor));
        }
        self.writes.fetch_add(devices.len() as u64, Ordering::Relaxed);

        tracing::info!(
            "[Registry] Devices changed: {} registered, {} total",
            devices.len(),
            map.len()
        );
        Ok(())
    }

    async fn get_device(&self, id: &str) -> Result<Option<LogicalDevice>, RegistryError> {
        Ok(self.devices.read().await.get(id).cloned())
    }

    async fn set_moisture(&self, id: &str, moisture_percent: i64) -> Result<(), RegistryError> {
        let mut map = self.devices.write().await;
        let device = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownDevice(id.to_string()))?;

        device.moisture_percent = moisture_percent;
        device.updated_at = Utc::now();
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<LogicalDevice>, RegistryError> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn remove_devices(&self, ids: &[String]) -> Result<(), RegistryError> {
        let mut map = self.devices.write().await;
        for id in ids {
            if map.remove(id).is_some() {
                self.writes.fetch_add(1, Ordering::Relaxed);
                tracing::info!("[Registry] Device removed {}", id);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
