//! Device Registry
//!
//! The single owner of all discovered device state. Every operation takes the
//! lock for its own duration only; readers always receive clones.
//!
//! Iteration order is ascending device id. Address lookups return the first
//! match in that order, so two devices that transiently share an address
//! resolve to the lower id.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::types::{Device, DeviceFields, Point};

/// Result of an upsert
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceUpdate {
    /// First announcement from this device
    Added(Device),
    /// Existing entry refreshed in place
    Refreshed(Device),
}

impl DeviceUpdate {
    pub fn device(&self) -> &Device {
        match self {
            DeviceUpdate::Added(device) | DeviceUpdate::Refreshed(device) => device,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, DeviceUpdate::Added(_))
    }
}

/// Result of attaching a point catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached { count: usize },
    /// The device left the registry while its read was in flight
    NotFound,
}

/// Registry of discovered devices keyed by device id
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<u32, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new device or merge an announcement into the existing entry
    pub fn upsert(&self, device_id: u32, fields: DeviceFields) -> DeviceUpdate {
        let mut devices = self.devices.write();

        match devices.get_mut(&device_id) {
            Some(device) => {
                device.address = fields.address;
                device.vendor_id = fields.vendor_id;
                if fields.max_apdu_length.is_some() {
                    device.max_apdu_length = fields.max_apdu_length;
                }
                if fields.segmentation_supported.is_some() {
                    device.segmentation_supported = fields.segmentation_supported;
                }
                device.last_seen = fields.seen_at;
                DeviceUpdate::Refreshed(device.clone())
            }
            None => {
                let device = Device {
                    device_id,
                    address: fields.address,
                    vendor_id: fields.vendor_id,
                    max_apdu_length: fields.max_apdu_length,
                    segmentation_supported: fields.segmentation_supported,
                    last_seen: fields.seen_at,
                    discovery_time: fields.seen_at,
                    points_read: false,
                    points: Vec::new(),
                };
                devices.insert(device_id, device.clone());
                DeviceUpdate::Added(device)
            }
        }
    }

    /// Replace a device's point catalog wholesale
    pub fn attach_points(&self, device_id: u32, points: Vec<Point>) -> AttachOutcome {
        let mut devices = self.devices.write();
        match devices.get_mut(&device_id) {
            Some(device) => {
                let count = points.len();
                device.points = points;
                device.points_read = true;
                AttachOutcome::Attached { count }
            }
            None => AttachOutcome::NotFound,
        }
    }

    /// First device (in ascending id order) last heard from `address`
    pub fn find_by_address(&self, address: &str) -> Option<Device> {
        self.devices
            .read()
            .values()
            .find(|device| device.address == address)
            .cloned()
    }

    pub fn get(&self, device_id: u32) -> Option<Device> {
        self.devices.read().get(&device_id).cloned()
    }

    pub fn contains(&self, device_id: u32) -> bool {
        self.devices.read().contains_key(&device_id)
    }

    /// Copy of every device, ordered by id
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Forget every device; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut devices = self.devices.write();
        let count = devices.len();
        devices.clear();
        count
    }
}
