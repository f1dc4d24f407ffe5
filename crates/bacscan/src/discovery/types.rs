//! Discovery data model

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::bacnet::{IAmAnnouncement, ObjectType, Segmentation};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::RequestToken;

/// A discovered BACnet device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// BACnet device instance number
    pub device_id: u32,
    /// Source address the device was last heard from
    pub address: String,
    /// BACnet vendor ID
    pub vendor_id: u16,
    /// Maximum APDU length the device accepts
    pub max_apdu_length: Option<u16>,
    /// Segmentation support
    pub segmentation_supported: Option<Segmentation>,
    /// Last I-Am from this device
    pub last_seen: DateTime<Utc>,
    /// First I-Am from this device
    pub discovery_time: DateTime<Utc>,
    /// Whether a point catalog has been attached
    pub points_read: bool,
    /// Point catalog, in object-list order
    pub points: Vec<Point>,
}

/// One object on a device
///
/// The `"{object_type}:{instance}"` identifier is always derived from the
/// two fields, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Point {
    object_type: String,
    instance_number: u32,
}

impl Point {
    pub fn new(object_type: impl Into<String>, instance_number: u32) -> Self {
        Self {
            object_type: object_type.into(),
            instance_number,
        }
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn instance_number(&self) -> u32 {
        self.instance_number
    }

    /// Display/lookup key, e.g. `analog-input:3`
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.object_type, self.instance_number)
    }

}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Point", 3)?;
        state.serialize_field("object_type", &self.object_type)?;
        state.serialize_field("instance_number", &self.instance_number)?;
        state.serialize_field("identifier", &self.identifier())?;
        state.end()
    }
}

/// Fields carried by a presence announcement
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFields {
    pub address: String,
    pub vendor_id: u16,
    pub max_apdu_length: Option<u16>,
    pub segmentation_supported: Option<Segmentation>,
    /// When the announcement was received
    pub seen_at: DateTime<Utc>,
}

impl DeviceFields {
    pub fn new(address: impl Into<String>, vendor_id: u16, seen_at: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            vendor_id,
            max_apdu_length: None,
            segmentation_supported: None,
            seen_at,
        }
    }

    /// Extract the device id and fields from an I-Am
    pub fn from_announcement(announcement: &IAmAnnouncement) -> DiscoveryResult<(u32, Self)> {
        let identifier = announcement.device_identifier;
        if identifier.object_type != ObjectType::Device {
            return Err(DiscoveryError::UnexpectedValue(format!(
                "I-Am carries {} instead of a device identifier",
                identifier
            )));
        }

        if announcement.source_address.trim().is_empty() {
            return Err(DiscoveryError::InvalidValue(format!(
                "I-Am from device {} has no source address",
                identifier.instance
            )));
        }

        Ok((
            identifier.instance,
            Self {
                address: announcement.source_address.clone(),
                vendor_id: announcement.vendor_id,
                max_apdu_length: Some(announcement.max_apdu_length),
                segmentation_supported: Some(announcement.segmentation),
                seen_at: announcement.received_at,
            },
        ))
    }
}

/// An object-list read awaiting its completion
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub device_id: u32,
    pub issued_at: DateTime<Utc>,
    pub request_token: RequestToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bacnet::ObjectIdentifier;

    fn announcement(identifier: ObjectIdentifier, address: &str) -> IAmAnnouncement {
        IAmAnnouncement {
            device_identifier: identifier,
            source_address: address.to_string(),
            max_apdu_length: 480,
            segmentation: Segmentation::Both,
            vendor_id: 15,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_point_identifier_tracks_fields() {
        let point = Point::new("analog-input", 3);
        assert_eq!(point.identifier(), "analog-input:3");

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["identifier"], "analog-input:3");
        assert_eq!(json["instance_number"], 3);

        let back: Point = serde_json::from_value(json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_fields_from_announcement() {
        let iam = announcement(ObjectIdentifier::device(1001), "192.168.1.20:47808");
        let (device_id, fields) = DeviceFields::from_announcement(&iam).unwrap();
        assert_eq!(device_id, 1001);
        assert_eq!(fields.address, "192.168.1.20:47808");
        assert_eq!(fields.max_apdu_length, Some(480));
        assert_eq!(fields.segmentation_supported, Some(Segmentation::Both));
        assert_eq!(fields.seen_at, iam.received_at);
    }

    #[test]
    fn test_fields_reject_non_device() {
        let oid = ObjectIdentifier::new(ObjectType::AnalogInput, 1).unwrap();
        let iam = announcement(oid, "192.168.1.20:47808");
        assert!(DeviceFields::from_announcement(&iam).is_err());

        let iam = announcement(ObjectIdentifier::device(5), "  ");
        assert!(DeviceFields::from_announcement(&iam).is_err());
        let iam = announcement(ObjectIdentifier::device(5), " 10.0.0.5:47808");
        let (_, fields) = DeviceFields::from_announcement(&iam).unwrap();
        assert_eq!(fields.address, " 10.0.0.5:47808");
    }
}
