//! # Encoding Primitives
//!
//! Hardcoded constants of the on-disk format.
//!
//! These values are part of the persisted byte layout. Changing any of them
//! makes existing keyspaces unreadable, so a change must come with a bump of
//! `ENCODING_VERSION`.

/// Magic bytes at the start of the keyspace header.
pub const MAGIC_BYTES: &[u8; 4] = b"TRLS";

/// Current version of the key/value layout.
///
/// Increment this when making breaking changes to the encoding.
pub const ENCODING_VERSION: u8 = 1;

/// Width of the generated counter inside a type IID.
pub const TYPE_KEY_LENGTH: usize = 2;

/// Width of the generated counter inside a thing IID.
pub const THING_KEY_LENGTH: usize = 8;

/// Total length of a type IID: prefix byte + counter.
pub const TYPE_IID_LENGTH: usize = 1 + TYPE_KEY_LENGTH;

/// Total length of a thing IID: prefix byte + type IID + counter.
pub const THING_IID_LENGTH: usize = 1 + TYPE_IID_LENGTH + THING_KEY_LENGTH;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a type label in bytes.
///
/// Labels form the label index key, so they are kept short.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Maximum length of an attribute type regex in bytes.
pub const MAX_REGEX_LENGTH: usize = 4096;

/// Maximum length of a string attribute value in bytes.
pub const MAX_STRING_VALUE_LENGTH: usize = 64 * 1024;
