//! Application messages exchanged with the protocol stack

use chrono::{DateTime, Utc};

use super::types::{ObjectIdentifier, PropertyIdentifier, Segmentation};
use super::value::PropertyValue;

/// Who-Is request, optionally limited to a device instance range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhoIsRequest {
    pub low_limit: Option<u32>,
    pub high_limit: Option<u32>,
}

impl WhoIsRequest {
    /// Who-Is addressed to every device
    pub fn global() -> Self {
        Self::default()
    }

    pub fn range(low_limit: u32, high_limit: u32) -> Self {
        Self {
            low_limit: Some(low_limit),
            high_limit: Some(high_limit),
        }
    }

    /// Whether a device instance falls inside the requested range
    pub fn matches(&self, device_id: u32) -> bool {
        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) => (low..=high).contains(&device_id),
            _ => true,
        }
    }
}

/// ReadProperty request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPropertyRequest {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub array_index: Option<u32>,
}

impl ReadPropertyRequest {
    /// Read the full object list of a device
    pub fn object_list(device_id: u32) -> Self {
        Self {
            object_identifier: ObjectIdentifier::device(device_id),
            property_identifier: PropertyIdentifier::ObjectList,
            array_index: None,
        }
    }
}

/// Messages handed to the transport for sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    WhoIs(WhoIsRequest),
    ReadProperty(ReadPropertyRequest),
}

/// I-Am announcement as delivered by the stack
#[derive(Debug, Clone, PartialEq)]
pub struct IAmAnnouncement {
    pub device_identifier: ObjectIdentifier,
    /// Source address the announcement arrived from
    pub source_address: String,
    pub max_apdu_length: u16,
    pub segmentation: Segmentation,
    pub vendor_id: u16,
    pub received_at: DateTime<Utc>,
}

/// ReadProperty Complex-ACK
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPropertyAck {
    /// Source address the ACK arrived from
    pub source_address: String,
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub array_index: Option<u32>,
    pub value: PropertyValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bacnet::ObjectType;

    #[test]
    fn test_who_is_range() {
        let global = WhoIsRequest::global();
        assert!(global.matches(0));
        assert!(global.matches(ObjectIdentifier::MAX_INSTANCE));

        let ranged = WhoIsRequest::range(1000, 1999);
        assert!(ranged.matches(1000));
        assert!(ranged.matches(1999));
        assert!(!ranged.matches(2000));
    }

    #[test]
    fn test_object_list_request() {
        let request = ReadPropertyRequest::object_list(1001);
        assert_eq!(request.object_identifier.object_type, ObjectType::Device);
        assert_eq!(request.object_identifier.instance, 1001);
        assert_eq!(request.property_identifier, PropertyIdentifier::ObjectList);
        assert_eq!(request.array_index, None);
    }
}
