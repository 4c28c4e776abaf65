//! Data models for the soil-moisture bridge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Gateway Models
// ============================================================================

/// Connection settings for the gateway, snapshotted from the settings store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
}

impl GatewayConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

/// One poll's moisture value for one soil channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReading {
    pub channel_id: String,
    pub display_name: String,
    pub moisture_percent: i64,
}

impl ChannelReading {
    pub fn new(channel_id: impl Into<String>, display_name: impl Into<String>, moisture_percent: i64) -> Self {
        Self {
            channel_id: channel_id.into(),
            display_name: display_name.into(),
            moisture_percent,
        }
    }

    /// Stable device id for a gateway channel index
    pub fn channel_id_for(index: u32) -> String {
        format!("soil_{}", index)
    }

    pub fn to_descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            id: self.channel_id.clone(),
            name: self.display_name.clone(),
            moisture_percent: self.moisture_percent,
            kind: DeviceKind::Sensor,
            capabilities: vec![Capability::HumiditySensor],
        }
    }
}

// ============================================================================
// Device Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Sensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    HumiditySensor,
}

/// Device as handed to the registry for creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub moisture_percent: i64,
    pub kind: DeviceKind,
    pub capabilities: Vec<Capability>,
}

/// Registry-owned representation of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalDevice {
    pub id: String,
    pub display_name: String,
    pub moisture_percent: i64,
    pub kind: DeviceKind,
    pub capabilities: Vec<Capability>,
    pub updated_at: DateTime<Utc>,
}

impl LogicalDevice {
    pub fn from_descriptor(descriptor: &DeviceDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            display_name: descriptor.name.clone(),
            moisture_percent: descriptor.moisture_percent,
            kind: descriptor.kind,
            capabilities: descriptor.capabilities.clone(),
            updated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Reconciliation Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueChange {
    pub id: String,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDevice {
    pub id: String,
    pub reason: String,
}

/// Outcome of applying one batch of readings to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub registered: Vec<String>,
    pub updated: Vec<ValueChange>,
    pub unchanged: usize,
    pub removed: Vec<String>,
    pub skipped: Vec<SkippedDevice>,
}

impl ReconcileReport {
    /// Number of registry writes performed
    pub fn writes(&self) -> usize {
        self.registered.len() + self.updated.len() + self.removed.len()
    }

    pub fn is_noop(&self) -> bool {
        self.writes() == 0
    }
}

// ============================================================================
// Settings Models
// ============================================================================

/// A user-editable plugin setting as shown by the admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub key: String,
    pub title: String,
    pub value: Option<String>,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_format() {
        assert_eq!(ChannelReading::channel_id_for(1), "soil_1");
        assert_eq!(ChannelReading::channel_id_for(16), "soil_16");
    }

    #[test]
    fn test_descriptor_declares_humidity_sensor() {
        let reading = ChannelReading::new("soil_1", "Garden", 35);
        let descriptor = reading.to_descriptor();

        assert_eq!(descriptor.id, "soil_1");
        assert_eq!(descriptor.name, "Garden");
        assert_eq!(descriptor.moisture_percent, 35);
        assert_eq!(descriptor.kind, DeviceKind::Sensor);
        assert_eq!(descriptor.capabilities, vec![Capability::HumiditySensor]);
    }

    #[test]
    fn test_gateway_config_blank_host_is_unconfigured() {
        assert!(!GatewayConfig::new("").is_configured());
        assert!(!GatewayConfig::new("   ").is_configured());
        assert!(GatewayConfig::new("http://192.168.0.137").is_configured());
    }

    #[test]
    fn test_report_write_count() {
        let report = ReconcileReport {
            registered: vec!["soil_1".to_string()],
            updated: vec![ValueChange {
                id: "soil_2".to_string(),
                from: 35,
                to: 40,
            }],
            unchanged: 3,
            removed: vec![],
            skipped: vec![],
        };
        assert_eq!(report.writes(), 2);
        assert!(!report.is_noop());
        assert!(ReconcileReport::default().is_noop());
    }
}
