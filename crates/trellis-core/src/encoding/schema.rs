//! Schema bytes: key prefixes, property infixes and edge infixes.
//!
//! An edge schema owns one outgoing infix; its incoming infix is the same
//! byte with [`IN_INFIX_FLAG`] set. A scan from either endpoint therefore
//! only needs the schema and a direction to build its key prefix.

use crate::types::{Direction, GraphError};
use std::fmt;

/// Bit set on an infix to mark the incoming (reverse) form of an edge key.
pub const IN_INFIX_FLAG: u8 = 0x80;

// =============================================================================
// PREFIXES
// =============================================================================

/// First byte of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Prefix {
    IndexType = 0x00,
    ThingType = 0x10,
    EntityType = 0x11,
    RelationType = 0x12,
    RoleType = 0x13,
    AttributeType = 0x14,
    Entity = 0x20,
    Relation = 0x21,
    Role = 0x22,
    Attribute = 0x23,
    System = 0xF0,
}

impl Prefix {
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::IndexType),
            0x10 => Some(Self::ThingType),
            0x11 => Some(Self::EntityType),
            0x12 => Some(Self::RelationType),
            0x13 => Some(Self::RoleType),
            0x14 => Some(Self::AttributeType),
            0x20 => Some(Self::Entity),
            0x21 => Some(Self::Relation),
            0x22 => Some(Self::Role),
            0x23 => Some(Self::Attribute),
            0xF0 => Some(Self::System),
            _ => None,
        }
    }
}

// =============================================================================
// VERTEX SCHEMAS
// =============================================================================

/// Category of a type vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeSchema {
    ThingType,
    EntityType,
    RelationType,
    RoleType,
    AttributeType,
}

impl TypeSchema {
    pub const ALL: [Self; 5] = [
        Self::ThingType,
        Self::EntityType,
        Self::RelationType,
        Self::RoleType,
        Self::AttributeType,
    ];

    #[must_use]
    pub const fn prefix(self) -> Prefix {
        match self {
            Self::ThingType => Prefix::ThingType,
            Self::EntityType => Prefix::EntityType,
            Self::RelationType => Prefix::RelationType,
            Self::RoleType => Prefix::RoleType,
            Self::AttributeType => Prefix::AttributeType,
        }
    }

    /// Recover the schema from the first byte of a type IID.
    pub fn of(byte: u8) -> Result<Self, GraphError> {
        Self::ALL
            .into_iter()
            .find(|schema| schema.prefix().byte() == byte)
            .ok_or_else(|| {
                GraphError::structural(format!("unrecognised type vertex prefix 0x{:02x}", byte))
            })
    }

    /// Label of the root type of this category.
    #[must_use]
    pub const fn root_label(self) -> &'static str {
        match self {
            Self::ThingType => "thing",
            Self::EntityType => "entity",
            Self::RelationType => "relation",
            Self::RoleType => "role",
            Self::AttributeType => "attribute",
        }
    }

    /// Category of the instances of this type, if it can have any.
    #[must_use]
    pub const fn instance(self) -> Option<ThingSchema> {
        match self {
            Self::ThingType => None,
            Self::EntityType => Some(ThingSchema::Entity),
            Self::RelationType => Some(ThingSchema::Relation),
            Self::RoleType => Some(ThingSchema::Role),
            Self::AttributeType => Some(ThingSchema::Attribute),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ThingType => "thing-type",
            Self::EntityType => "entity-type",
            Self::RelationType => "relation-type",
            Self::RoleType => "role-type",
            Self::AttributeType => "attribute-type",
        }
    }

    /// Parse the short kind names used on the command line.
    #[must_use]
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "entity" => Some(Self::EntityType),
            "relation" => Some(Self::RelationType),
            "role" => Some(Self::RoleType),
            "attribute" => Some(Self::AttributeType),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of a thing vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThingSchema {
    Entity,
    Relation,
    Role,
    Attribute,
}

impl ThingSchema {
    pub const ALL: [Self; 4] = [Self::Entity, Self::Relation, Self::Role, Self::Attribute];

    #[must_use]
    pub const fn prefix(self) -> Prefix {
        match self {
            Self::Entity => Prefix::Entity,
            Self::Relation => Prefix::Relation,
            Self::Role => Prefix::Role,
            Self::Attribute => Prefix::Attribute,
        }
    }

    /// Recover the schema from the first byte of a thing IID.
    pub fn of(byte: u8) -> Result<Self, GraphError> {
        Self::ALL
            .into_iter()
            .find(|schema| schema.prefix().byte() == byte)
            .ok_or_else(|| {
                GraphError::structural(format!("unrecognised thing vertex prefix 0x{:02x}", byte))
            })
    }

    /// Category of the type this thing must be an instance of.
    #[must_use]
    pub const fn type_schema(self) -> TypeSchema {
        match self {
            Self::Entity => TypeSchema::EntityType,
            Self::Relation => TypeSchema::RelationType,
            Self::Role => TypeSchema::RoleType,
            Self::Attribute => TypeSchema::AttributeType,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relation => "relation",
            Self::Role => "role",
            Self::Attribute => "attribute",
        }
    }
}

impl fmt::Display for ThingSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// PROPERTY INFIXES
// =============================================================================

/// Infix appended to a type IID to form a property key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PropertyInfix {
    Abstract = 0x00,
    Label = 0x01,
    ValueType = 0x02,
    Regex = 0x03,
}

impl PropertyInfix {
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// EDGE SCHEMAS
// =============================================================================

/// A schema of directed edges between vertices of one graph.
pub trait EdgeSchema: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Every schema of this kind, used to decode infixes.
    const ALL: &'static [Self];

    /// Infix of the outgoing (canonical) key form.
    fn out_infix(self) -> u8;

    fn name(self) -> &'static str;

    /// Infix of the incoming (reverse index) key form.
    fn in_infix(self) -> u8 {
        self.out_infix() | IN_INFIX_FLAG
    }

    fn infix(self, direction: Direction) -> u8 {
        match direction {
            Direction::Out => self.out_infix(),
            Direction::In => self.in_infix(),
        }
    }

    /// Decode an infix byte into its schema and key direction.
    fn from_infix(byte: u8) -> Option<(Self, Direction)> {
        let direction = if byte & IN_INFIX_FLAG == 0 {
            Direction::Out
        } else {
            Direction::In
        };
        let out = byte & !IN_INFIX_FLAG;
        Self::ALL
            .iter()
            .copied()
            .find(|schema| schema.out_infix() == out)
            .map(|schema| (schema, direction))
    }
}

/// Edges between type vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeEdgeSchema {
    Sub,
    Key,
    Has,
    Plays,
    Relates,
}

impl EdgeSchema for TypeEdgeSchema {
    const ALL: &'static [Self] = &[Self::Sub, Self::Key, Self::Has, Self::Plays, Self::Relates];

    fn out_infix(self) -> u8 {
        match self {
            Self::Sub => 0x20,
            Self::Key => 0x21,
            Self::Has => 0x22,
            Self::Plays => 0x23,
            Self::Relates => 0x24,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Sub => "sub",
            Self::Key => "key",
            Self::Has => "has",
            Self::Plays => "plays",
            Self::Relates => "relates",
        }
    }
}

/// Edges between thing vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThingEdgeSchema {
    Has,
    Playing,
    Relating,
    RolePlayer,
}

impl EdgeSchema for ThingEdgeSchema {
    const ALL: &'static [Self] = &[Self::Has, Self::Playing, Self::Relating, Self::RolePlayer];

    fn out_infix(self) -> u8 {
        match self {
            Self::Has => 0x40,
            Self::Playing => 0x41,
            Self::Relating => 0x42,
            Self::RolePlayer => 0x43,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Has => "has",
            Self::Playing => "playing",
            Self::Relating => "relating",
            Self::RolePlayer => "role-player",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
