//! Point Catalog Decoding
//!
//! Turns an object-list property value into an ordered list of [`Point`]s.
//! Stacks hand the list back either as a generic `Any` wrapper whose elements
//! still need casting, or as an already typed array. The representation is
//! picked from the value's declared kind, never by trial and error.

use tracing::{trace, warn};

use super::types::Point;
use crate::bacnet::{ObjectIdentifier, ObjectType, PropertyValue, TaggedValue};
use crate::error::{DiscoveryError, DiscoveryResult};

/// Decode an object-list value into points, in list order
///
/// Null entries are padding and skipped. Entries that cannot be read as a
/// `(type, instance)` pair are logged and skipped.
pub fn decode_object_list(value: &PropertyValue) -> DiscoveryResult<Vec<Point>> {
    match value {
        PropertyValue::Any(elements) => Ok(elements
            .iter()
            .enumerate()
            .filter_map(|(index, element)| decode_tagged(index, element))
            .collect()),
        PropertyValue::Array(elements) => Ok(elements
            .iter()
            .enumerate()
            .filter_map(|(index, element)| decode_typed(index, element))
            .collect()),
        PropertyValue::ObjectIdentifier(oid) => Ok(vec![point_from_identifier(oid)]),
        other => Err(DiscoveryError::UnexpectedValue(format!(
            "object-list cannot be decoded from a {} value",
            other.kind()
        ))),
    }
}

/// Parse one `(type, instance)` reference
///
/// The type may be a name or an enumerated code. The instance may be an
/// unsigned, a non-negative signed, or a numeric string.
pub fn object_reference(object_type: &PropertyValue, instance: &PropertyValue) -> DiscoveryResult<Point> {
    let object_type = match object_type {
        PropertyValue::CharacterString(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(DiscoveryError::MalformedReference("empty object type".into()));
            }
            // Known names are normalised; anything else is kept verbatim
            name.parse::<ObjectType>()
                .map(|parsed| parsed.to_string())
                .unwrap_or_else(|_| name.to_string())
        }
        PropertyValue::Enumerated(code) => {
            let code = u16::try_from(*code)
                .ok()
                .filter(|code| *code <= ObjectIdentifier::MAX_TYPE_CODE)
                .ok_or_else(|| DiscoveryError::MalformedReference(format!("object type {} out of range", code)))?;
            ObjectType::from_code(code).to_string()
        }
        other => {
            return Err(DiscoveryError::MalformedReference(format!(
                "object type given as {}",
                other.kind()
            )));
        }
    };

    let instance: u64 = match instance {
        PropertyValue::Unsigned(n) => *n,
        PropertyValue::Signed(n) => u64::try_from(*n)
            .map_err(|_| DiscoveryError::MalformedReference(format!("negative instance {}", n)))?,
        PropertyValue::CharacterString(s) => s
            .trim()
            .parse()
            .map_err(|_| DiscoveryError::MalformedReference(format!("instance '{}' is not a number", s)))?,
        other => {
            return Err(DiscoveryError::MalformedReference(format!(
                "instance given as {}",
                other.kind()
            )));
        }
    };

    if instance > u64::from(ObjectIdentifier::MAX_INSTANCE) {
        return Err(DiscoveryError::MalformedReference(format!(
            "instance {} out of range",
            instance
        )));
    }

    Ok(Point::new(object_type, instance as u32))
}

fn point_from_identifier(oid: &ObjectIdentifier) -> Point {
    Point::new(oid.object_type.to_string(), oid.instance)
}

fn decode_tagged(index: usize, element: &TaggedValue) -> Option<Point> {
    match element.as_object_identifier() {
        Ok(Some(oid)) => {
            trace!(index, object = %oid, "Decoded tagged object-list entry");
            Some(point_from_identifier(&oid))
        }
        Ok(None) => None,
        Err(e) => {
            warn!(index, error = %e, "Skipping malformed object-list entry");
            None
        }
    }
}

fn decode_typed(index: usize, element: &PropertyValue) -> Option<Point> {
    let decoded = match element {
        PropertyValue::Null => return None,
        PropertyValue::ObjectIdentifier(oid) => Ok(point_from_identifier(oid)),
        PropertyValue::Sequence(members) => match members.as_slice() {
            [object_type, instance] => object_reference(object_type, instance),
            _ => Err(DiscoveryError::MalformedReference(format!(
                "expected a (type, instance) pair, got {} members",
                members.len()
            ))),
        },
        other => Err(DiscoveryError::MalformedReference(format!(
            "unexpected {} entry",
            other.kind()
        ))),
    };

    match decoded {
        Ok(point) => {
            trace!(index, point = %point.identifier(), "Decoded object-list entry");
            Some(point)
        }
        Err(e) => {
            warn!(index, error = %e, "Skipping malformed object-list entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::bacnet::ApplicationTag;

    fn identifiers(points: &[Point]) -> Vec<String> {
        points.iter().map(Point::identifier).collect()
    }

    fn oid(object_type: ObjectType, instance: u32) -> ObjectIdentifier {
        ObjectIdentifier::new(object_type, instance).unwrap()
    }

    #[test]
    fn test_array_with_null_padding() {
        let value = PropertyValue::Array(vec![
            PropertyValue::Null,
            PropertyValue::pair("analog-input", 3),
            PropertyValue::Null,
            PropertyValue::pair("binary-output", 7),
        ]);

        let points = decode_object_list(&value).unwrap();
        assert_eq!(identifiers(&points), vec!["analog-input:3", "binary-output:7"]);
    }

    #[test]
    fn test_array_skips_non_numeric_instance() {
        let value = PropertyValue::Array(vec![
            PropertyValue::pair("analog-input", 1),
            PropertyValue::Sequence(vec![
                PropertyValue::CharacterString("analog-input".into()),
                PropertyValue::CharacterString("two".into()),
            ]),
            PropertyValue::pair("analog-value", 3),
        ]);

        let points = decode_object_list(&value).unwrap();
        assert_eq!(identifiers(&points), vec!["analog-input:1", "analog-value:3"]);
    }

    #[test]
    fn test_array_mixed_entry_forms() {
        let value = PropertyValue::Array(vec![
            PropertyValue::ObjectIdentifier(ObjectIdentifier::device(1001)),
            PropertyValue::Sequence(vec![PropertyValue::Enumerated(4), PropertyValue::Signed(2)]),
            PropertyValue::Sequence(vec![
                PropertyValue::CharacterString("multi-state-value".into()),
                PropertyValue::CharacterString(" 12 ".into()),
            ]),
            PropertyValue::Real(1.5),
            PropertyValue::Sequence(vec![PropertyValue::Enumerated(0)]),
            PropertyValue::Sequence(vec![
                PropertyValue::CharacterString("analog-input".into()),
                PropertyValue::Signed(-1),
            ]),
        ]);

        let points = decode_object_list(&value).unwrap();
        assert_eq!(
            identifiers(&points),
            vec!["device:1001", "binary-output:2", "multi-state-value:12"]
        );
    }

    #[test]
    fn test_any_with_null_padding_and_bad_tags() {
        let value = PropertyValue::Any(vec![
            TaggedValue::object_identifier(&ObjectIdentifier::device(1001)),
            TaggedValue::null(),
            TaggedValue::object_identifier(&oid(ObjectType::AnalogInput, 1)),
            TaggedValue::new(ApplicationTag::CharacterString, Bytes::from_static(b"oops")),
            TaggedValue::new(ApplicationTag::ObjectIdentifier, Bytes::from_static(&[0x00, 0x01])),
            TaggedValue::object_identifier(&oid(ObjectType::BinaryValue, 9)),
        ]);

        let points = decode_object_list(&value).unwrap();
        assert_eq!(
            identifiers(&points),
            vec!["device:1001", "analog-input:1", "binary-value:9"]
        );
    }

    #[test]
    fn test_bare_identifier_is_single_point() {
        let value = PropertyValue::ObjectIdentifier(oid(ObjectType::Schedule, 2));
        assert_eq!(identifiers(&decode_object_list(&value).unwrap()), vec!["schedule:2"]);
    }

    #[test]
    fn test_empty_lists() {
        assert!(decode_object_list(&PropertyValue::Any(Vec::new())).unwrap().is_empty());
        assert!(decode_object_list(&PropertyValue::Array(Vec::new())).unwrap().is_empty());
        assert!(
            decode_object_list(&PropertyValue::Array(vec![PropertyValue::Null, PropertyValue::Null]))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_unsupported_kinds_fail() {
        for value in [
            PropertyValue::Null,
            PropertyValue::Unsigned(12),
            PropertyValue::CharacterString("analog-input:1".into()),
            PropertyValue::pair("analog-input", 1),
        ] {
            assert!(matches!(
                decode_object_list(&value),
                Err(DiscoveryError::UnexpectedValue(_))
            ));
        }
    }

    #[test]
    fn test_object_reference_normalises_names() {
        let point = object_reference(
            &PropertyValue::CharacterString("analogInput".into()),
            &PropertyValue::Unsigned(5),
        )
        .unwrap();
        assert_eq!(point.identifier(), "analog-input:5");

        let point = object_reference(
            &PropertyValue::CharacterString("vendor-widget".into()),
            &PropertyValue::Unsigned(5),
        )
        .unwrap();
        assert_eq!(point.identifier(), "vendor-widget:5");
    }

    #[test]
    fn test_object_reference_range_checks() {
        assert!(
            object_reference(
                &PropertyValue::CharacterString("analog-input".into()),
                &PropertyValue::Unsigned(u64::from(ObjectIdentifier::MAX_INSTANCE) + 1),
            )
            .is_err()
        );
        assert!(object_reference(&PropertyValue::Enumerated(5000), &PropertyValue::Unsigned(1)).is_err());
        assert!(
            object_reference(&PropertyValue::CharacterString("  ".into()), &PropertyValue::Unsigned(1)).is_err()
        );
    }
}
