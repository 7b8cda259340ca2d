//! # Keyspace Header
//!
//! Postcard-encoded record stored under the header key.
//!
//! Format:
//! - 4 bytes: Magic ("TRLS")
//! - 1 byte: Encoding version
//!
//! The header is written once when the keyspace is initialised and checked
//! every time the keyspace is opened. Its presence is what makes a keyspace
//! "initialised".

use crate::primitives::{ENCODING_VERSION, MAGIC_BYTES};
use crate::types::GraphError;
use serde::{Deserialize, Serialize};

/// Upper bound on the encoded header, checked before decoding.
const MAX_HEADER_SIZE: usize = 64;

/// Header of an initialised keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceHeader {
    pub magic: [u8; 4],
    pub encoding_version: u8,
}

impl KeyspaceHeader {
    /// Header for the current encoding.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            encoding_version: ENCODING_VERSION,
        }
    }

    /// Check magic bytes and encoding version.
    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != MAGIC_BYTES {
            return Err(GraphError::Serialization("Invalid magic bytes".to_string()));
        }
        if self.encoding_version != ENCODING_VERSION {
            return Err(GraphError::IncompatibleEncoding {
                found: self.encoding_version,
                expected: ENCODING_VERSION,
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        postcard::to_stdvec(self).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Decode and validate a stored header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.len() > MAX_HEADER_SIZE {
            return Err(GraphError::Serialization(format!(
                "Header of {} bytes exceeds maximum {}",
                bytes.len(),
                MAX_HEADER_SIZE
            )));
        }
        let header: Self = postcard::from_bytes(bytes).map_err(|e| {
            GraphError::Serialization(format!("Failed to decode keyspace header: {}", e))
        })?;
        header.validate()?;
        Ok(header)
    }
}

impl Default for KeyspaceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
