use crate::error::{bounded, Result};
use crate::snapshot::SnapshotCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::Device;
use tagwatch_storage::DeviceStore;

/// Devices indexed by id and by network address, built from one store read.
#[derive(Debug, Default)]
pub struct DeviceSnapshot {
    by_id: HashMap<i32, Arc<Device>>,
    by_address: HashMap<String, Arc<Device>>,
}

impl DeviceSnapshot {
    pub fn from_devices(devices: Vec<Device>) -> Self {
        let mut by_id = HashMap::with_capacity(devices.len());
        let mut by_address = HashMap::with_capacity(devices.len());
        for device in devices {
            let device = Arc::new(device);
            if let Some(previous) = by_address.insert(device.address.clone(), device.clone()) {
                tracing::warn!(
                    address = %device.address,
                    kept = device.id,
                    shadowed = previous.id,
                    "Duplicate device address in store"
                );
            }
            by_id.insert(device.id, device);
        }
        Self { by_id, by_address }
    }

    pub fn by_id(&self, id: i32) -> Option<&Arc<Device>> {
        self.by_id.get(&id)
    }

    pub fn by_address(&self, address: &str) -> Option<&Arc<Device>> {
        self.by_address.get(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.by_address.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Known devices, rebuilt wholesale from the device store.
pub struct DeviceDirectory {
    cell: SnapshotCell<DeviceSnapshot>,
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self {
            cell: SnapshotCell::new(DeviceSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.cell.load()
    }

    pub fn lookup(&self, id: i32) -> Option<Arc<Device>> {
        self.cell.load().by_id(id).cloned()
    }

    pub fn lookup_address(&self, address: &str) -> Option<Arc<Device>> {
        self.cell.load().by_address(address).cloned()
    }

    /// Resolves the network address of an inbound message to its device id.
    pub fn device_id_by_address(&self, address: &str) -> Option<i32> {
        self.cell.load().by_address(address).map(|d| d.id)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.cell.load().addresses()
    }

    pub fn generation(&self) -> u64 {
        self.cell.generation()
    }

    pub fn replace(&self, devices: Vec<Device>) -> usize {
        let ticket = self.cell.ticket();
        self.publish_devices(ticket, devices)
    }

    /// Reads every device from `store` and swaps the snapshot.
    ///
    /// On error, timeout or cancellation the previous snapshot stays in place.
    pub async fn refresh(&self, store: &dyn DeviceStore, timeout: Duration) -> Result<usize> {
        let ticket = self.cell.ticket();
        let devices = bounded("list_devices", timeout, store.list_devices()).await?;
        Ok(self.publish_devices(ticket, devices))
    }

    fn publish_devices(&self, ticket: u64, devices: Vec<Device>) -> usize {
        let snapshot = DeviceSnapshot::from_devices(devices);
        let count = snapshot.len();
        if self.cell.publish(ticket, snapshot) {
            tracing::info!(device_count = count, "Device directory reloaded");
        } else {
            tracing::debug!(ticket, "Discarded stale device snapshot");
        }
        count
    }
}
