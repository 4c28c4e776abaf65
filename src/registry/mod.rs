//! Host device registry interface
//!
//! The reconciler only talks to [`DeviceRegistry`]; `memory` holds the
//! in-process adapter the binary serves over the admin API.

mod memory;

pub use self::memory::MemoryRegistry;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::models::{DeviceDescriptor, LogicalDevice};

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Create or replace the given devices
    async fn register_devices(&self, devices: &[DeviceDescriptor]) -> Result<(), RegistryError>;

    async fn get_device(&self, id: &str) -> Result<Option<LogicalDevice>, RegistryError>;

    /// Commit a new moisture value for an existing device
    async fn set_moisture(&self, id: &str, moisture_percent: i64) -> Result<(), RegistryError>;

    async fn list_devices(&self) -> Result<Vec<LogicalDevice>, RegistryError>;

    async fn remove_devices(&self, ids: &[String]) -> Result<(), RegistryError>;

    /// Get the registry name
    fn name(&self) -> &'static str;
}
