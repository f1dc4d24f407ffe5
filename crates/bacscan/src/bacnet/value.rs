//! Property values
//!
//! A property value arrives either already typed (`Array`, `Sequence`,
//! primitives) or as a generic `Any` wrapper holding application-tagged
//! elements that must be cast before use.

use bytes::Bytes;

use super::types::ObjectIdentifier;
use crate::error::{DiscoveryError, DiscoveryResult};

/// BACnet application tag numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationTag {
    Null,
    Boolean,
    UnsignedInt,
    SignedInt,
    Real,
    Double,
    OctetString,
    CharacterString,
    BitString,
    Enumerated,
    Date,
    Time,
    ObjectIdentifier,
    Reserved(u8),
}

impl ApplicationTag {
    pub fn number(&self) -> u8 {
        match self {
            ApplicationTag::Null => 0,
            ApplicationTag::Boolean => 1,
            ApplicationTag::UnsignedInt => 2,
            ApplicationTag::SignedInt => 3,
            ApplicationTag::Real => 4,
            ApplicationTag::Double => 5,
            ApplicationTag::OctetString => 6,
            ApplicationTag::CharacterString => 7,
            ApplicationTag::BitString => 8,
            ApplicationTag::Enumerated => 9,
            ApplicationTag::Date => 10,
            ApplicationTag::Time => 11,
            ApplicationTag::ObjectIdentifier => 12,
            ApplicationTag::Reserved(n) => *n,
        }
    }
}

/// One application-tagged element inside an `Any` wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedValue {
    pub tag: ApplicationTag,
    pub data: Bytes,
}

impl TaggedValue {
    pub fn new(tag: ApplicationTag, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    pub fn null() -> Self {
        Self::new(ApplicationTag::Null, Bytes::new())
    }

    pub fn object_identifier(oid: &ObjectIdentifier) -> Self {
        Self::new(
            ApplicationTag::ObjectIdentifier,
            Bytes::copy_from_slice(&oid.to_raw().to_be_bytes()),
        )
    }

    pub fn is_null(&self) -> bool {
        self.tag == ApplicationTag::Null
    }

    /// Cast this element as an object identifier
    ///
    /// Returns `Ok(None)` for a null element.
    pub fn as_object_identifier(&self) -> DiscoveryResult<Option<ObjectIdentifier>> {
        match self.tag {
            ApplicationTag::Null => Ok(None),
            ApplicationTag::ObjectIdentifier => {
                let raw: [u8; 4] = self.data[..].try_into().map_err(|_| {
                    DiscoveryError::MalformedReference(format!(
                        "object identifier needs 4 bytes, got {}",
                        self.data.len()
                    ))
                })?;
                Ok(Some(ObjectIdentifier::from_raw(u32::from_be_bytes(raw))))
            }
            other => Err(DiscoveryError::MalformedReference(format!(
                "expected object identifier, got application tag {}",
                other.number()
            ))),
        }
    }
}

/// A decoded (or still wrapped) property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Unsigned(u64),
    Signed(i64),
    Real(f32),
    Double(f64),
    CharacterString(String),
    Enumerated(u32),
    ObjectIdentifier(ObjectIdentifier),
    /// Constructed value whose members are positional
    Sequence(Vec<PropertyValue>),
    /// Typed list (`ArrayOf`)
    Array(Vec<PropertyValue>),
    /// Generic wrapper that has not been cast yet
    Any(Vec<TaggedValue>),
}

impl PropertyValue {
    /// Declared kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Unsigned(_) => "unsigned",
            PropertyValue::Signed(_) => "signed",
            PropertyValue::Real(_) => "real",
            PropertyValue::Double(_) => "double",
            PropertyValue::CharacterString(_) => "character-string",
            PropertyValue::Enumerated(_) => "enumerated",
            PropertyValue::ObjectIdentifier(_) => "object-identifier",
            PropertyValue::Sequence(_) => "sequence",
            PropertyValue::Array(_) => "array",
            PropertyValue::Any(_) => "any",
        }
    }

    /// Shorthand for a `(type, instance)` pair as a constructed sequence
    pub fn pair(object_type: impl Into<String>, instance: u64) -> Self {
        PropertyValue::Sequence(vec![
            PropertyValue::CharacterString(object_type.into()),
            PropertyValue::Unsigned(instance),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bacnet::ObjectType;

    #[test]
    fn test_cast_object_identifier() {
        let oid = ObjectIdentifier::new(ObjectType::BinaryValue, 42).unwrap();
        let tagged = TaggedValue::object_identifier(&oid);
        assert_eq!(tagged.as_object_identifier().unwrap(), Some(oid));
        assert_eq!(TaggedValue::null().as_object_identifier().unwrap(), None);
    }

    #[test]
    fn test_cast_rejects_wrong_shape() {
        let short = TaggedValue::new(ApplicationTag::ObjectIdentifier, vec![0x00u8, 0x01]);
        assert!(matches!(
            short.as_object_identifier(),
            Err(DiscoveryError::MalformedReference(_))
        ));

        let unsigned = TaggedValue::new(ApplicationTag::UnsignedInt, vec![0x07u8]);
        assert!(unsigned.as_object_identifier().is_err());
    }
}
