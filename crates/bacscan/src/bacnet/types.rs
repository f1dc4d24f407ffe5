//! BACnet identifier types
//!
//! Object types, object identifiers, property identifiers and segmentation
//! support, with the kebab-case names used for points and configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};

// ─────────────────────────────────────────────────────────────────────────────
// Object Type
// ─────────────────────────────────────────────────────────────────────────────

/// BACnet object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ObjectType {
    AnalogInput,
    AnalogOutput,
    AnalogValue,
    BinaryInput,
    BinaryOutput,
    BinaryValue,
    Calendar,
    Command,
    Device,
    EventEnrollment,
    File,
    Group,
    Loop,
    MultiStateInput,
    MultiStateOutput,
    NotificationClass,
    Program,
    Schedule,
    Averaging,
    MultiStateValue,
    TrendLog,
    LifeSafetyPoint,
    LifeSafetyZone,
    Accumulator,
    PulseConverter,
    EventLog,
    GlobalGroup,
    TrendLogMultiple,
    LoadControl,
    StructuredView,
    AccessDoor,
    /// Reserved (< 128) or proprietary (>= 128) type code
    Other(u16),
}

const OBJECT_TYPES: [(ObjectType, u16, &str); 31] = [
    (ObjectType::AnalogInput, 0, "analog-input"),
    (ObjectType::AnalogOutput, 1, "analog-output"),
    (ObjectType::AnalogValue, 2, "analog-value"),
    (ObjectType::BinaryInput, 3, "binary-input"),
    (ObjectType::BinaryOutput, 4, "binary-output"),
    (ObjectType::BinaryValue, 5, "binary-value"),
    (ObjectType::Calendar, 6, "calendar"),
    (ObjectType::Command, 7, "command"),
    (ObjectType::Device, 8, "device"),
    (ObjectType::EventEnrollment, 9, "event-enrollment"),
    (ObjectType::File, 10, "file"),
    (ObjectType::Group, 11, "group"),
    (ObjectType::Loop, 12, "loop"),
    (ObjectType::MultiStateInput, 13, "multi-state-input"),
    (ObjectType::MultiStateOutput, 14, "multi-state-output"),
    (ObjectType::NotificationClass, 15, "notification-class"),
    (ObjectType::Program, 16, "program"),
    (ObjectType::Schedule, 17, "schedule"),
    (ObjectType::Averaging, 18, "averaging"),
    (ObjectType::MultiStateValue, 19, "multi-state-value"),
    (ObjectType::TrendLog, 20, "trend-log"),
    (ObjectType::LifeSafetyPoint, 21, "life-safety-point"),
    (ObjectType::LifeSafetyZone, 22, "life-safety-zone"),
    (ObjectType::Accumulator, 23, "accumulator"),
    (ObjectType::PulseConverter, 24, "pulse-converter"),
    (ObjectType::EventLog, 25, "event-log"),
    (ObjectType::GlobalGroup, 26, "global-group"),
    (ObjectType::TrendLogMultiple, 27, "trend-log-multiple"),
    (ObjectType::LoadControl, 28, "load-control"),
    (ObjectType::StructuredView, 29, "structured-view"),
    (ObjectType::AccessDoor, 30, "access-door"),
];

impl ObjectType {
    /// Map a 10-bit type code to an object type
    pub fn from_code(code: u16) -> Self {
        OBJECT_TYPES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .unwrap_or(ObjectType::Other(code))
    }

    /// The numeric type code
    pub fn code(&self) -> u16 {
        match self {
            ObjectType::Other(code) => *code,
            known => OBJECT_TYPES
                .iter()
                .find(|(t, _, _)| t == known)
                .map(|(_, c, _)| *c)
                .unwrap_or_default(),
        }
    }

    fn known_name(&self) -> Option<&'static str> {
        OBJECT_TYPES
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, _, name)| *name)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.known_name(), self) {
            (Some(name), _) => f.write_str(name),
            (None, ObjectType::Other(code)) if *code >= 128 => write!(f, "proprietary-{}", code),
            (None, other) => write!(f, "reserved-{}", other.code()),
        }
    }
}

impl FromStr for ObjectType {
    type Err = DiscoveryError;

    /// Accepts kebab-case, snake_case, camelCase, common abbreviations and raw codes
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        let compact = normalized.replace('-', "");

        let abbreviated = match compact.as_str() {
            "ai" => Some(ObjectType::AnalogInput),
            "ao" => Some(ObjectType::AnalogOutput),
            "av" => Some(ObjectType::AnalogValue),
            "bi" => Some(ObjectType::BinaryInput),
            "bo" => Some(ObjectType::BinaryOutput),
            "bv" => Some(ObjectType::BinaryValue),
            "msi" => Some(ObjectType::MultiStateInput),
            "mso" => Some(ObjectType::MultiStateOutput),
            "msv" => Some(ObjectType::MultiStateValue),
            _ => None,
        };
        if let Some(object_type) = abbreviated {
            return Ok(object_type);
        }

        if let Some((object_type, _, _)) = OBJECT_TYPES
            .iter()
            .find(|(_, _, name)| *name == normalized || name.replace('-', "") == compact)
        {
            return Ok(*object_type);
        }

        let code = normalized
            .strip_prefix("proprietary-")
            .or_else(|| normalized.strip_prefix("reserved-"))
            .unwrap_or(&normalized);
        match code.parse::<u16>() {
            Ok(code) if code <= ObjectIdentifier::MAX_TYPE_CODE => Ok(ObjectType::from_code(code)),
            _ => Err(DiscoveryError::InvalidValue(format!("Unknown object type: {}", s))),
        }
    }
}

impl From<ObjectType> for String {
    fn from(object_type: ObjectType) -> Self {
        object_type.to_string()
    }
}

impl TryFrom<String> for ObjectType {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object Identifier
// ─────────────────────────────────────────────────────────────────────────────

/// A `(type, instance)` reference to one object on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ObjectIdentifier {
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentifier {
    /// Largest instance number that fits the 22-bit encoding
    pub const MAX_INSTANCE: u32 = 0x3F_FFFF;

    /// Largest type code that fits the 10-bit encoding
    pub const MAX_TYPE_CODE: u16 = 0x3FF;

    /// Create an identifier, rejecting out-of-range instances
    pub fn new(object_type: ObjectType, instance: u32) -> DiscoveryResult<Self> {
        if instance > Self::MAX_INSTANCE {
            return Err(DiscoveryError::InvalidValue(format!(
                "Instance {} exceeds {}",
                instance,
                Self::MAX_INSTANCE
            )));
        }
        if object_type.code() > Self::MAX_TYPE_CODE {
            return Err(DiscoveryError::InvalidValue(format!(
                "Object type code {} exceeds {}",
                object_type.code(),
                Self::MAX_TYPE_CODE
            )));
        }
        Ok(Self {
            object_type,
            instance,
        })
    }

    /// Identifier of a device object
    pub fn device(instance: u32) -> Self {
        Self {
            object_type: ObjectType::Device,
            instance: instance & Self::MAX_INSTANCE,
        }
    }

    /// Decode the packed 32-bit form (10-bit type, 22-bit instance)
    pub fn from_raw(raw: u32) -> Self {
        Self {
            object_type: ObjectType::from_code(((raw >> 22) & 0x3FF) as u16),
            instance: raw & Self::MAX_INSTANCE,
        }
    }

    /// Encode into the packed 32-bit form
    pub fn to_raw(&self) -> u32 {
        ((self.object_type.code() as u32 & 0x3FF) << 22) | (self.instance & Self::MAX_INSTANCE)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

impl FromStr for ObjectIdentifier {
    type Err = DiscoveryError;

    /// Parses `"analog-input:3"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object_type, instance) = s
            .rsplit_once(':')
            .ok_or_else(|| DiscoveryError::InvalidValue(format!("Expected type:instance, got {}", s)))?;
        let instance = instance
            .trim()
            .parse::<u32>()
            .map_err(|e| DiscoveryError::InvalidValue(format!("Invalid instance in {}: {}", s, e)))?;
        Self::new(object_type.parse()?, instance)
    }
}

impl From<ObjectIdentifier> for String {
    fn from(oid: ObjectIdentifier) -> Self {
        oid.to_string()
    }
}

impl TryFrom<String> for ObjectIdentifier {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Identifier
// ─────────────────────────────────────────────────────────────────────────────

/// BACnet property identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyIdentifier {
    Description,
    EventState,
    MaxApduLengthAccepted,
    ObjectIdentifier,
    ObjectList,
    ObjectName,
    ObjectType,
    OutOfService,
    PresentValue,
    Reliability,
    SegmentationSupported,
    StatusFlags,
    Units,
    VendorIdentifier,
    Other(u32),
}

const PROPERTY_IDENTIFIERS: [(PropertyIdentifier, u32, &str); 14] = [
    (PropertyIdentifier::Description, 28, "description"),
    (PropertyIdentifier::EventState, 36, "event-state"),
    (PropertyIdentifier::MaxApduLengthAccepted, 62, "max-apdu-length-accepted"),
    (PropertyIdentifier::ObjectIdentifier, 75, "object-identifier"),
    (PropertyIdentifier::ObjectList, 76, "object-list"),
    (PropertyIdentifier::ObjectName, 77, "object-name"),
    (PropertyIdentifier::ObjectType, 79, "object-type"),
    (PropertyIdentifier::OutOfService, 81, "out-of-service"),
    (PropertyIdentifier::PresentValue, 85, "present-value"),
    (PropertyIdentifier::Reliability, 103, "reliability"),
    (PropertyIdentifier::SegmentationSupported, 107, "segmentation-supported"),
    (PropertyIdentifier::StatusFlags, 111, "status-flags"),
    (PropertyIdentifier::Units, 117, "units"),
    (PropertyIdentifier::VendorIdentifier, 120, "vendor-identifier"),
];

impl PropertyIdentifier {
    pub fn code(&self) -> u32 {
        match self {
            PropertyIdentifier::Other(code) => *code,
            known => PROPERTY_IDENTIFIERS
                .iter()
                .find(|(p, _, _)| p == known)
                .map(|(_, c, _)| *c)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for PropertyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match PROPERTY_IDENTIFIERS.iter().find(|(p, _, _)| p == self) {
            Some((_, _, name)) => f.write_str(name),
            None => write!(f, "property-{}", self.code()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Segmentation
// ─────────────────────────────────────────────────────────────────────────────

/// Segmentation support advertised in I-Am
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Segmentation {
    #[serde(alias = "segmentedBoth")]
    Both,
    #[serde(alias = "segmentedTransmit")]
    Transmit,
    #[serde(alias = "segmentedReceive")]
    Receive,
    #[serde(alias = "noSegmentation")]
    None,
}

impl fmt::Display for Segmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segmentation::Both => write!(f, "both"),
            Segmentation::Transmit => write!(f, "transmit"),
            Segmentation::Receive => write!(f, "receive"),
            Segmentation::None => write!(f, "none"),
        }
    }
}
