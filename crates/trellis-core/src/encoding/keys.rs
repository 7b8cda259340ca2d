//! Key layout.
//!
//! ```text
//! type vertex      [type prefix][u16 BE]                       3 bytes
//! thing vertex     [thing prefix][type IID][u64 BE]            12 bytes
//! property         IID ++ property infix
//! label index      0x00 ++ label
//! edge (out form)  from ++ out infix ++ to
//! edge (in form)   to ++ in infix ++ from
//! header           0xF0 0x00
//! type counter     0xF0 0x01 ++ type prefix
//! thing counter    0xF0 0x02 ++ type IID
//! ```

use super::schema::{Prefix, PropertyInfix, ThingSchema, TypeSchema};
use crate::primitives::{THING_IID_LENGTH, THING_KEY_LENGTH, TYPE_IID_LENGTH, TYPE_KEY_LENGTH};
use crate::types::{GraphError, Iid};

const SYSTEM_HEADER: u8 = 0x00;
const SYSTEM_TYPE_COUNTER: u8 = 0x01;
const SYSTEM_THING_COUNTER: u8 = 0x02;

// =============================================================================
// VERTEX IDS
// =============================================================================

#[must_use]
pub fn type_iid(schema: TypeSchema, key: [u8; TYPE_KEY_LENGTH]) -> Iid {
    let mut bytes = Vec::with_capacity(TYPE_IID_LENGTH);
    bytes.push(schema.prefix().byte());
    bytes.extend_from_slice(&key);
    Iid::new(bytes)
}

pub fn thing_iid(
    schema: ThingSchema,
    type_iid: &Iid,
    key: [u8; THING_KEY_LENGTH],
) -> Result<Iid, GraphError> {
    let type_schema = validate_type_iid(type_iid)?;
    if type_schema != schema.type_schema() {
        return Err(GraphError::structural(format!(
            "a {} cannot be an instance of a {}",
            schema, type_schema
        )));
    }
    let mut bytes = Vec::with_capacity(THING_IID_LENGTH);
    bytes.push(schema.prefix().byte());
    bytes.extend_from_slice(type_iid.as_bytes());
    bytes.extend_from_slice(&key);
    Ok(Iid::new(bytes))
}

/// Check the length and prefix of a type IID.
pub fn validate_type_iid(iid: &Iid) -> Result<TypeSchema, GraphError> {
    if iid.len() != TYPE_IID_LENGTH {
        return Err(GraphError::structural(format!(
            "type IID {} has length {}, expected {}",
            iid,
            iid.len(),
            TYPE_IID_LENGTH
        )));
    }
    TypeSchema::of(iid.as_bytes()[0])
}

/// Check the length and prefix of a thing IID.
pub fn validate_thing_iid(iid: &Iid) -> Result<ThingSchema, GraphError> {
    if iid.len() != THING_IID_LENGTH {
        return Err(GraphError::structural(format!(
            "thing IID {} has length {}, expected {}",
            iid,
            iid.len(),
            THING_IID_LENGTH
        )));
    }
    ThingSchema::of(iid.as_bytes()[0])
}

/// The type IID embedded in a thing IID.
pub fn type_of_thing(thing: &Iid) -> Result<Iid, GraphError> {
    validate_thing_iid(thing)?;
    Ok(Iid::new(&thing.as_bytes()[1..=TYPE_IID_LENGTH]))
}

/// Prefix shared by every instance of `type_iid`, or `None` for the root
/// thing type, which has no instances of its own.
pub fn instance_prefix(type_iid: &Iid) -> Result<Option<Vec<u8>>, GraphError> {
    let Some(schema) = validate_type_iid(type_iid)?.instance() else {
        return Ok(None);
    };
    let mut prefix = Vec::with_capacity(1 + TYPE_IID_LENGTH);
    prefix.push(schema.prefix().byte());
    prefix.extend_from_slice(type_iid.as_bytes());
    Ok(Some(prefix))
}

// =============================================================================
// PROPERTIES & INDEX
// =============================================================================

#[must_use]
pub fn property_key(iid: &Iid, infix: PropertyInfix) -> Vec<u8> {
    let mut key = Vec::with_capacity(iid.len() + 1);
    key.extend_from_slice(iid.as_bytes());
    key.push(infix.byte());
    key
}

#[must_use]
pub fn label_index_key(label: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(label.len() + 1);
    key.push(Prefix::IndexType.byte());
    key.extend_from_slice(label.as_bytes());
    key
}

#[must_use]
pub fn label_index_prefix() -> Vec<u8> {
    vec![Prefix::IndexType.byte()]
}

/// Label encoded in a label index key.
pub fn label_from_index_key(key: &[u8]) -> Result<String, GraphError> {
    match key.split_first() {
        Some((&prefix, label)) if prefix == Prefix::IndexType.byte() => {
            String::from_utf8(label.to_vec())
                .map_err(|e| GraphError::structural(format!("malformed label index key: {}", e)))
        }
        _ => Err(GraphError::structural("not a label index key")),
    }
}

// =============================================================================
// EDGES
// =============================================================================

/// Scan prefix for every edge of one infix at `iid`.
#[must_use]
pub fn edge_prefix(iid: &Iid, infix: u8) -> Vec<u8> {
    let mut key = Vec::with_capacity(iid.len() + 1);
    key.extend_from_slice(iid.as_bytes());
    key.push(infix);
    key
}

#[must_use]
pub fn edge_key(start: &Iid, infix: u8, end: &Iid) -> Vec<u8> {
    let mut key = edge_prefix(start, infix);
    key.extend_from_slice(end.as_bytes());
    key
}

// =============================================================================
// SYSTEM KEYS
// =============================================================================

#[must_use]
pub fn header_key() -> Vec<u8> {
    vec![Prefix::System.byte(), SYSTEM_HEADER]
}

#[must_use]
pub fn type_counter_key(schema: TypeSchema) -> Vec<u8> {
    vec![
        Prefix::System.byte(),
        SYSTEM_TYPE_COUNTER,
        schema.prefix().byte(),
    ]
}

#[must_use]
pub fn thing_counter_prefix() -> Vec<u8> {
    vec![Prefix::System.byte(), SYSTEM_THING_COUNTER]
}

#[must_use]
pub fn thing_counter_key(type_iid: &Iid) -> Vec<u8> {
    let mut key = thing_counter_prefix();
    key.extend_from_slice(type_iid.as_bytes());
    key
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// `None` when the prefix is all `0xFF`, i.e. the range is unbounded above.
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn type_iid_layout() {
        let iid = type_iid(TypeSchema::EntityType, [0x00, 0x07]);
        assert_eq!(iid.as_bytes(), &[0x11, 0x00, 0x07]);
        assert_eq!(validate_type_iid(&iid).unwrap(), TypeSchema::EntityType);
    }

    #[test]
    fn thing_iid_embeds_type_iid() {
        let person = type_iid(TypeSchema::EntityType, [0x00, 0x05]);
        let thing = thing_iid(ThingSchema::Entity, &person, 9u64.to_be_bytes()).unwrap();

        assert_eq!(thing.len(), THING_IID_LENGTH);
        assert_eq!(thing.prefix(), Some(0x20));
        assert_eq!(type_of_thing(&thing).unwrap(), person);
    }

    #[test]
    fn thing_iid_rejects_mismatched_type() {
        let name = type_iid(TypeSchema::AttributeType, [0x00, 0x01]);
        assert!(matches!(
            thing_iid(ThingSchema::Entity, &name, [0; 8]),
            Err(GraphError::StructuralViolation(_))
        ));
    }

    #[test]
    fn malformed_iids_rejected() {
        assert!(validate_type_iid(&Iid::new(vec![0x11])).is_err());
        assert!(validate_thing_iid(&Iid::new(vec![0x11, 0x00, 0x01])).is_err());
        assert!(validate_type_iid(&Iid::new(vec![0x7f, 0x00, 0x01])).is_err());
    }

    #[test]
    fn edge_forms_mirror_each_other() {
        let a = type_iid(TypeSchema::EntityType, [0, 1]);
        let b = type_iid(TypeSchema::EntityType, [0, 2]);
        let out = edge_key(&a, 0x20, &b);
        let inward = edge_key(&b, 0xA0, &a);

        assert_eq!(out, vec![0x11, 0, 1, 0x20, 0x11, 0, 2]);
        assert_eq!(inward, vec![0x11, 0, 2, 0xA0, 0x11, 0, 1]);
        assert!(out.starts_with(&edge_prefix(&a, 0x20)));
    }

    #[test]
    fn label_index_roundtrip() {
        let key = label_index_key("person");
        assert_eq!(key[0], 0x00);
        assert_eq!(label_from_index_key(&key).unwrap(), "person");
        assert!(label_from_index_key(&[0x11, b'x']).is_err());
    }

    #[test]
    fn prefix_end_bounds_range() {
        assert_eq!(prefix_end(&[0x11, 0x00]), Some(vec![0x11, 0x01]));
        assert_eq!(prefix_end(&[0x11, 0xFF]), Some(vec![0x12]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn system_keys_share_prefix() {
        assert_eq!(header_key(), vec![0xF0, 0x00]);
        assert_eq!(type_counter_key(TypeSchema::RoleType), vec![0xF0, 0x01, 0x13]);
        let person = type_iid(TypeSchema::EntityType, [0, 3]);
        assert!(thing_counter_key(&person).starts_with(&thing_counter_prefix()));
    }
}
