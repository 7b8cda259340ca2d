//! # Byte Encoding Scheme
//!
//! Deterministic mapping between graph elements and key/value byte pairs.
//! Every byte layout here is part of the on-disk format.

pub mod keys;
pub mod schema;
pub mod value;

pub use schema::{
    EdgeSchema, IN_INFIX_FLAG, Prefix, PropertyInfix, ThingEdgeSchema, ThingSchema,
    TypeEdgeSchema, TypeSchema,
};
pub use value::{Value, ValueType};
