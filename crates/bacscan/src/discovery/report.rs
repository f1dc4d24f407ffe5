//! Status Reporting
//!
//! The periodic status report is a snapshot summary handed to a
//! [`StatusSink`]. The default sink writes it through `tracing`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::types::Device;

/// Per-device line of a status report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device_id: u32,
    pub address: String,
    pub last_seen: DateTime<Utc>,
    pub points_read: bool,
    pub point_count: usize,
}

impl From<&Device> for DeviceStatus {
    fn from(device: &Device) -> Self {
        Self {
            device_id: device.device_id,
            address: device.address.clone(),
            last_seen: device.last_seen,
            points_read: device.points_read,
            point_count: device.points.len(),
        }
    }
}

/// Summary of the registry at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub devices: Vec<DeviceStatus>,
}

impl StatusReport {
    pub fn from_devices(devices: &[Device], generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            devices: devices.iter().map(DeviceStatus::from).collect(),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Devices whose catalog has been read
    pub fn cataloged_count(&self) -> usize {
        self.devices.iter().filter(|d| d.points_read).count()
    }
}

/// Receiver of periodic status reports
pub trait StatusSink: Send + Sync + 'static {
    fn report(&self, report: &StatusReport);
}

/// Logs each report at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&self, report: &StatusReport) {
        info!(
            devices = report.device_count(),
            cataloged = report.cataloged_count(),
            "Discovery status"
        );
        for device in &report.devices {
            info!(
                device_id = device.device_id,
                address = %device.address,
                last_seen = %device.last_seen.format("%H:%M:%S"),
                points = device.point_count,
                "  device"
            );
        }
    }
}
