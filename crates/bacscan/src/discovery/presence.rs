//! Presence Handling
//!
//! Every I-Am refreshes the registry and triggers an object-list read, even
//! for devices whose catalog is already known. Nothing here returns an error
//! to the delivery loop; every failure is logged and absorbed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::correlator::RequestCorrelator;
use super::registry::{DeviceRegistry, DeviceUpdate};
use super::types::DeviceFields;
use crate::bacnet::IAmAnnouncement;

/// What an announcement led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// The announcement was rejected before touching the registry
    Rejected,
    /// Our own device answered our Who-Is
    LocalDevice,
    /// Registry updated; `read_issued` tells whether the follow-up read went out
    Recorded { device_id: u32, new: bool, read_issued: bool },
}

pub struct PresenceHandler {
    registry: Arc<DeviceRegistry>,
    correlator: Arc<RequestCorrelator>,
    local_device_id: Option<u32>,
}

impl PresenceHandler {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        correlator: Arc<RequestCorrelator>,
        local_device_id: Option<u32>,
    ) -> Self {
        Self {
            registry,
            correlator,
            local_device_id,
        }
    }

    pub async fn on_presence_announcement(&self, announcement: IAmAnnouncement) -> PresenceOutcome {
        let (device_id, fields) = match DeviceFields::from_announcement(&announcement) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(address = %announcement.source_address, error = %e, "Ignoring I-Am");
                return PresenceOutcome::Rejected;
            }
        };

        if self.local_device_id == Some(device_id) {
            debug!(device_id, "Ignoring our own I-Am");
            return PresenceOutcome::LocalDevice;
        }

        let update = self.registry.upsert(device_id, fields);
        let new = update.is_new();
        match &update {
            DeviceUpdate::Added(device) => info!(
                device_id,
                address = %device.address,
                vendor_id = device.vendor_id,
                "Discovered device"
            ),
            DeviceUpdate::Refreshed(device) => debug!(
                device_id,
                address = %device.address,
                "Device re-announced"
            ),
        }

        let read_issued = match self.correlator.issue_read(device_id).await {
            Ok(_) => true,
            Err(e) => {
                warn!(device_id, error = %e, "Failed to request object list");
                false
            }
        };

        PresenceOutcome::Recorded {
            device_id,
            new,
            read_issued,
        }
    }
}
