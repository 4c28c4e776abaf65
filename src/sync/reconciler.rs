//! DeviceReconciler: apply a batch of channel readings to the device registry
//!
//! Unknown channels are registered in one batch, known channels get a single
//! moisture write only when the value moved. Devices whose channel is absent
//! from the batch are kept or removed according to `retain_stale`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::RegistryError;
use crate::models::{ChannelReading, DeviceDescriptor, ReconcileReport, SkippedDevice, ValueChange};
use crate::registry::DeviceRegistry;

pub struct DeviceReconciler {
    registry: Arc<dyn DeviceRegistry>,
    retain_stale: bool,
}

impl DeviceReconciler {
    pub fn new(registry: Arc<dyn DeviceRegistry>, retain_stale: bool) -> Self {
        Self {
            registry,
            retain_stale,
        }
    }

    pub fn retain_stale(&self) -> bool {
        self.retain_stale
    }

    /// Incremental pass used on every poll tick
    pub async fn reconcile(&self, readings: &[ChannelReading]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut new_devices: Vec<DeviceDescriptor> = Vec::new();

        for reading in latest_per_channel(readings) {
            let existing = match self.registry.get_device(&reading.channel_id).await {
                Ok(existing) => existing,
                Err(e) => {
                    skip(&mut report, &reading.channel_id, &e);
                    continue;
                }
            };

            match existing {
                None => new_devices.push(reading.to_descriptor()),
                Some(device) if device.moisture_percent != reading.moisture_percent => {
                    match self
                        .registry
                        .set_moisture(&reading.channel_id, reading.moisture_percent)
                        .await
                    {
                        Ok(()) => {
                            tracing::info!(
                                "[Reconciler] Updated {}'s humidity level to {}",
                                device.display_name,
                                reading.moisture_percent
                            );
                            report.updated.push(ValueChange {
                                id: reading.channel_id.clone(),
                                from: device.moisture_percent,
                                to: reading.moisture_percent,
                            });
                        }
                        Err(e) => skip(&mut report, &reading.channel_id, &e),
                    }
                }
                Some(_) => report.unchanged += 1,
            }
        }

        if !new_devices.is_empty() {
            self.register(&new_devices, &mut report).await;
        }

        self.apply_stale_policy(readings, &mut report).await;

        tracing::debug!(
            "[Reconciler] {} registered, {} updated, {} unchanged, {} removed, {} skipped",
            report.registered.len(),
            report.updated.len(),
            report.unchanged,
            report.removed.len(),
            report.skipped.len()
        );

        report
    }

    /// Full device-list pass: re-register every reported channel.
    ///
    /// Used at startup and after the gateway host changes so names and
    /// values reflect the new gateway without waiting for a tick.
    pub async fn resync(&self, readings: &[ChannelReading]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let descriptors: Vec<DeviceDescriptor> = latest_per_channel(readings)
            .into_iter()
            .map(ChannelReading::to_descriptor)
            .collect();

        if !descriptors.is_empty() {
            self.register(&descriptors, &mut report).await;
        }

        self.apply_stale_policy(readings, &mut report).await;

        tracing::info!(
            "[Reconciler] Resynced {} devices into {} registry ({} removed)",
            report.registered.len(),
            self.registry.name(),
            report.removed.len()
        );

        report
    }

    async fn register(&self, descriptors: &[DeviceDescriptor], report: &mut ReconcileReport) {
        match self.registry.register_devices(descriptors).await {
            Ok(()) => {
                for descriptor in descriptors {
                    tracing::info!(
                        "[Reconciler] Registered {} ({}) at {}%",
                        descriptor.id,
                        descriptor.name,
                        descriptor.moisture_percent
                    );
                    report.registered.push(descriptor.id.clone());
                }
            }
            Err(e) => {
                for descriptor in descriptors {
                    skip(report, &descriptor.id, &e);
                }
            }
        }
    }

    async fn apply_stale_policy(&self, readings: &[ChannelReading], report: &mut ReconcileReport) {
        if self.retain_stale {
            return;
        }

        let current: HashSet<&str> = readings.iter().map(|r| r.channel_id.as_str()).collect();

        let stale: Vec<String> = match self.registry.list_devices().await {
            Ok(devices) => devices
                .into_iter()
                .filter(|d| !current.contains(d.id.as_str()))
                .map(|d| d.id)
                .collect(),
            Err(e) => {
                tracing::warn!("[Reconciler] Could not list devices for stale check: {}", e);
                return;
            }
        };

        if stale.is_empty() {
            return;
        }

        match self.registry.remove_devices(&stale).await {
            Ok(()) => report.removed.extend(stale),
            Err(e) => {
                for id in &stale {
                    skip(report, id, &e);
                }
            }
        }
    }
}

/// One reading per channel id; a later duplicate replaces an earlier one
fn latest_per_channel(readings: &[ChannelReading]) -> Vec<&ChannelReading> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&ChannelReading> = Vec::with_capacity(readings.len());

    for reading in readings {
        match positions.get(reading.channel_id.as_str()) {
            Some(&index) => unique[index] = reading,
            None => {
                positions.insert(reading.channel_id.as_str(), unique.len());
                unique.push(reading);
            }
        }
    }

    unique
}

fn skip(report: &mut ReconcileReport, id: &str, error: &RegistryError) {
    tracing::warn!("[Reconciler] Failed to update device {}: {}", id, error);
    report.skipped.push(SkippedDevice {
        id: id.to_string(),
        reason: error.to_string(),
    });
}
