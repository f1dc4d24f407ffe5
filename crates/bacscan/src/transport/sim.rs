//! Simulated BACnet network
//!
//! An in-memory [`Transport`] whose devices answer Who-Is with I-Am and
//! ReadProperty(object-list) with their catalog. Used by the CLI demo and by
//! end-to-end tests of the discovery engine.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Completion, Delivery, DeliverySender, RequestFailure, RequestToken, Transport};
use crate::bacnet::{
    IAmAnnouncement, ObjectIdentifier, ObjectType, OutgoingMessage, PropertyIdentifier, PropertyValue,
    ReadPropertyAck, ReadPropertyRequest, Segmentation, TaggedValue,
};
use crate::error::{DiscoveryError, DiscoveryResult};

/// How a simulated device encodes its object list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogEncoding {
    /// Generic application-tagged wrapper that the reader must cast
    #[default]
    Any,
    /// Already-typed array of object identifiers
    Array,
}

/// A device living on the simulated network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDevice {
    pub device_id: u32,
    pub address: String,
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_max_apdu")]
    pub max_apdu_length: u16,
    #[serde(default = "default_segmentation")]
    pub segmentation: Segmentation,
    /// Objects besides the device object itself
    #[serde(default)]
    pub objects: Vec<ObjectIdentifier>,
    #[serde(default)]
    pub encoding: CatalogEncoding,
    /// Interleave null slots into the encoded list
    #[serde(default)]
    pub null_padding: bool,
}

fn default_vendor_id() -> u16 {
    999
}

fn default_max_apdu() -> u16 {
    1476
}

fn default_segmentation() -> Segmentation {
    Segmentation::None
}

impl SimulatedDevice {
    pub fn new(device_id: u32, address: impl Into<String>) -> Self {
        Self {
            device_id,
            address: address.into(),
            vendor_id: default_vendor_id(),
            max_apdu_length: default_max_apdu(),
            segmentation: default_segmentation(),
            objects: Vec::new(),
            encoding: CatalogEncoding::default(),
            null_padding: false,
        }
    }

    pub fn with_objects(mut self, objects: Vec<ObjectIdentifier>) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_encoding(mut self, encoding: CatalogEncoding, null_padding: bool) -> Self {
        self.encoding = encoding;
        self.null_padding = null_padding;
        self
    }

    /// A small mixed fleet for demos
    pub fn demo_fleet(count: usize) -> Vec<Self> {
        (0..count)
            .map(|i| {
                let device_id = 1001 + i as u32;
                let mut objects = Vec::new();
                for instance in 1..=3 {
                    objects.push(ObjectIdentifier {
                        object_type: ObjectType::AnalogInput,
                        instance,
                    });
                }
                for instance in 1..=2 {
                    objects.push(ObjectIdentifier {
                        object_type: ObjectType::BinaryOutput,
                        instance,
                    });
                }
                objects.push(ObjectIdentifier {
                    object_type: ObjectType::AnalogValue,
                    instance: i as u32,
                });

                let encoding = if i % 2 == 0 {
                    CatalogEncoding::Any
                } else {
                    CatalogEncoding::Array
                };

                Self::new(device_id, format!("192.168.1.{}:47808", 20 + i))
                    .with_objects(objects)
                    .with_encoding(encoding, i % 3 == 1)
            })
            .collect()
    }

    fn identifier(&self) -> ObjectIdentifier {
        ObjectIdentifier::device(self.device_id)
    }

    fn announcement(&self) -> IAmAnnouncement {
        IAmAnnouncement {
            device_identifier: self.identifier(),
            source_address: self.address.clone(),
            max_apdu_length: self.max_apdu_length,
            segmentation: self.segmentation,
            vendor_id: self.vendor_id,
            received_at: Utc::now(),
        }
    }

    /// The full object list: device object first, then the configured objects
    fn object_list(&self) -> Vec<ObjectIdentifier> {
        std::iter::once(self.identifier())
            .chain(self.objects.iter().copied())
            .collect()
    }

    fn encode_catalog(&self) -> PropertyValue {
        let objects = self.object_list();
        match self.encoding {
            CatalogEncoding::Any => {
                let mut tagged = Vec::with_capacity(objects.len() * 2);
                for (i, oid) in objects.iter().enumerate() {
                    if self.null_padding && i % 2 == 1 {
                        tagged.push(TaggedValue::null());
                    }
                    tagged.push(TaggedValue::object_identifier(oid));
                }
                PropertyValue::Any(tagged)
            }
            CatalogEncoding::Array => {
                let mut items = Vec::with_capacity(objects.len() * 2);
                for (i, oid) in objects.iter().enumerate() {
                    if self.null_padding && i % 2 == 1 {
                        items.push(PropertyValue::Null);
                    }
                    items.push(PropertyValue::ObjectIdentifier(*oid));
                }
                PropertyValue::Array(items)
            }
        }
    }

    fn read_property(&self, request: &ReadPropertyRequest) -> Result<PropertyValue, RequestFailure> {
        if request.object_identifier != self.identifier() {
            return Err(RequestFailure::Error("object: unknown-object".into()));
        }

        match (request.property_identifier, request.array_index) {
            (PropertyIdentifier::ObjectList, None) => Ok(self.encode_catalog()),
            (PropertyIdentifier::ObjectList, Some(0)) => {
                Ok(PropertyValue::Unsigned(self.object_list().len() as u64))
            }
            (PropertyIdentifier::ObjectList, Some(index)) => self
                .object_list()
                .get(index as usize - 1)
                .map(|oid| PropertyValue::ObjectIdentifier(*oid))
                .ok_or_else(|| RequestFailure::Error("property: invalid-array-index".into())),
            (PropertyIdentifier::ObjectName, None) => {
                Ok(PropertyValue::CharacterString(format!("SIM-{}", self.device_id)))
            }
            (PropertyIdentifier::VendorIdentifier, None) => Ok(PropertyValue::Unsigned(self.vendor_id as u64)),
            _ => Err(RequestFailure::Error("property: unknown-property".into())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated Network
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory network of simulated devices
pub struct SimulatedNetwork {
    devices: RwLock<Vec<SimulatedDevice>>,
    deliveries: DeliverySender,
}

impl SimulatedNetwork {
    pub fn new(devices: Vec<SimulatedDevice>, deliveries: DeliverySender) -> Self {
        Self {
            devices: RwLock::new(devices),
            deliveries,
        }
    }

    /// Bring a device onto the network
    pub fn add_device(&self, device: SimulatedDevice) {
        let mut devices = self.devices.write();
        devices.retain(|d| d.device_id != device.device_id);
        devices.push(device);
    }

    /// Take a device off the network; later reads to its address time out
    pub fn remove_device(&self, device_id: u32) -> bool {
        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|d| d.device_id != device_id);
        devices.len() != before
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    fn deliver(&self, delivery: Delivery) -> DiscoveryResult<()> {
        self.deliveries
            .send(delivery)
            .map_err(|_| DiscoveryError::TransportClosed)
    }

    fn answer_read(&self, address: &str, request: &ReadPropertyRequest) -> Result<ReadPropertyAck, RequestFailure> {
        let devices = self.devices.read();
        let device = devices
            .iter()
            .find(|d| d.address == address)
            .ok_or(RequestFailure::Timeout)?;

        let value = device.read_property(request)?;
        Ok(ReadPropertyAck {
            source_address: device.address.clone(),
            object_identifier: request.object_identifier,
            property_identifier: request.property_identifier,
            array_index: request.array_index,
            value,
        })
    }
}

#[async_trait]
impl Transport for SimulatedNetwork {
    async fn send_broadcast(&self, message: OutgoingMessage) -> DiscoveryResult<()> {
        match message {
            OutgoingMessage::WhoIs(request) => {
                let announcements: Vec<_> = self
                    .devices
                    .read()
                    .iter()
                    .filter(|d| request.matches(d.device_id))
                    .map(SimulatedDevice::announcement)
                    .collect();

                tracing::trace!("Simulated Who-Is answered by {} devices", announcements.len());
                for announcement in announcements {
                    self.deliver(Delivery::Announcement(announcement))?;
                }
                Ok(())
            }
            OutgoingMessage::ReadProperty(_) => Err(DiscoveryError::Transport(
                "read-property cannot be broadcast".into(),
            )),
        }
    }

    async fn send_unicast(&self, address: &str, message: OutgoingMessage) -> DiscoveryResult<RequestToken> {
        let token = RequestToken::new();

        match message {
            OutgoingMessage::WhoIs(request) => {
                let announcement = self
                    .devices
                    .read()
                    .iter()
                    .find(|d| d.address == address && request.matches(d.device_id))
                    .map(SimulatedDevice::announcement);
                if let Some(announcement) = announcement {
                    self.deliver(Delivery::Announcement(announcement))?;
                }
            }
            OutgoingMessage::ReadProperty(request) => {
                let outcome = self.answer_read(address, &request);
                self.deliver(Delivery::Completion(Completion { token, outcome }))?;
            }
        }

        Ok(token)
    }
}
