//! BACnet types
//!
//! Identifiers, property values and the application messages the discovery
//! engine exchanges with the protocol stack. Byte-level framing stays with
//! the transport.

mod message;
mod types;
mod value;

pub use message::{IAmAnnouncement, OutgoingMessage, ReadPropertyAck, ReadPropertyRequest, WhoIsRequest};
pub use types::{ObjectIdentifier, ObjectType, PropertyIdentifier, Segmentation};
pub use value::{ApplicationTag, PropertyValue, TaggedValue};
