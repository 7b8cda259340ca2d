//! Attribute values and their order-preserving byte encoding.
//!
//! Encoded form: `[value-type byte] ++ payload`. Numeric payloads are
//! big-endian with the sign handled so that byte order matches numeric order.

use crate::primitives::MAX_STRING_VALUE_LENGTH;
use crate::types::GraphError;
use std::fmt;

const SIGN_BIT: u64 = 1 << 63;

/// Value type of an attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    Boolean = 1,
    Long = 2,
    Double = 3,
    String = 4,
    DateTime = 5,
}

impl ValueType {
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, GraphError> {
        match byte {
            1 => Ok(Self::Boolean),
            2 => Ok(Self::Long),
            3 => Ok(Self::Double),
            4 => Ok(Self::String),
            5 => Ok(Self::DateTime),
            other => Err(GraphError::structural(format!(
                "unrecognised value type 0x{:02x}",
                other
            ))),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::DateTime => "datetime",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(Self::Boolean),
            "long" => Some(Self::Long),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "datetime" => Some(Self::DateTime),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value held by an attribute vertex.
///
/// `DateTime` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    DateTime(i64),
}

impl Value {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Boolean(_) => ValueType::Boolean,
            Self::Long(_) => ValueType::Long,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::DateTime(_) => ValueType::DateTime,
        }
    }

    /// Encode as `[value-type] ++ payload`.
    pub fn encode(&self) -> Result<Vec<u8>, GraphError> {
        let mut bytes = vec![self.value_type().byte()];
        match self {
            Self::Boolean(value) => bytes.push(u8::from(*value)),
            Self::Long(value) | Self::DateTime(value) => {
                bytes.extend_from_slice(&encode_i64(*value));
            }
            Self::Double(value) => bytes.extend_from_slice(&encode_f64(*value)),
            Self::String(value) => {
                if value.len() > MAX_STRING_VALUE_LENGTH {
                    return Err(GraphError::structural(format!(
                        "string value of {} bytes exceeds maximum {}",
                        value.len(),
                        MAX_STRING_VALUE_LENGTH
                    )));
                }
                bytes.extend_from_slice(value.as_bytes());
            }
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, GraphError> {
        let (&type_byte, payload) = bytes
            .split_first()
            .ok_or_else(|| GraphError::structural("empty attribute value"))?;
        match ValueType::from_byte(type_byte)? {
            ValueType::Boolean => match payload {
                [0] => Ok(Self::Boolean(false)),
                [1] => Ok(Self::Boolean(true)),
                _ => Err(GraphError::structural("malformed boolean value")),
            },
            ValueType::Long => Ok(Self::Long(decode_i64(payload)?)),
            ValueType::DateTime => Ok(Self::DateTime(decode_i64(payload)?)),
            ValueType::Double => Ok(Self::Double(decode_f64(payload)?)),
            ValueType::String => String::from_utf8(payload.to_vec())
                .map(Self::String)
                .map_err(|e| GraphError::structural(format!("malformed string value: {}", e))),
        }
    }

    /// Parse a textual value of the given type, as typed on the command line.
    pub fn parse(value_type: ValueType, text: &str) -> Result<Self, GraphError> {
        let invalid = || {
            GraphError::structural(format!("'{}' is not a valid {} value", text, value_type))
        };
        match value_type {
            ValueType::Boolean => text.parse().map(Self::Boolean).map_err(|_| invalid()),
            ValueType::Long => text.parse().map(Self::Long).map_err(|_| invalid()),
            ValueType::Double => text.parse().map(Self::Double).map_err(|_| invalid()),
            ValueType::String => Ok(Self::String(text.to_string())),
            ValueType::DateTime => text.parse().map(Self::DateTime).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Long(value) | Self::DateTime(value) => write!(f, "{}", value),
            Self::Double(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{:?}", value),
        }
    }
}

fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

fn decode_i64(payload: &[u8]) -> Result<i64, GraphError> {
    let array: [u8; 8] = payload
        .try_into()
        .map_err(|_| GraphError::structural("malformed 8-byte value"))?;
    Ok((u64::from_be_bytes(array) ^ SIGN_BIT) as i64)
}

fn encode_f64(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let sortable = if bits & SIGN_BIT == 0 {
        bits ^ SIGN_BIT
    } else {
        !bits
    };
    sortable.to_be_bytes()
}

fn decode_f64(payload: &[u8]) -> Result<f64, GraphError> {
    let array: [u8; 8] = payload
        .try_into()
        .map_err(|_| GraphError::structural("malformed 8-byte value"))?;
    let sortable = u64::from_be_bytes(array);
    let bits = if sortable & SIGN_BIT != 0 {
        sortable ^ SIGN_BIT
    } else {
        !sortable
    };
    Ok(f64::from_bits(bits))
}

// =============================================================================
// TESTS
// =============================================================================
