//! # Key Generator
//!
//! Issues the counter part of every new IID.
//!
//! - one counter per type schema (2-byte keys)
//! - one counter per type IID for its instances (8-byte keys)
//!
//! Counters only move forward. A key handed to a transaction that is later
//! discarded is never issued again.

use crate::encoding::TypeSchema;
use crate::encoding::keys;
use crate::primitives::{THING_KEY_LENGTH, TYPE_IID_LENGTH, TYPE_KEY_LENGTH};
use crate::storage::{KeyValue, Storage};
use crate::types::{GraphError, Iid};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counter service of one keyspace.
#[derive(Debug)]
pub struct KeyGenerator {
    /// Next type key to issue, per type schema.
    type_keys: BTreeMap<TypeSchema, AtomicU64>,
    /// Next thing key to issue, per type IID.
    thing_keys: Mutex<BTreeMap<Iid, u64>>,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            type_keys: TypeSchema::ALL
                .into_iter()
                .map(|schema| (schema, AtomicU64::new(0)))
                .collect(),
            thing_keys: Mutex::new(BTreeMap::new()),
        }
    }

    fn type_counter(&self, schema: TypeSchema) -> Result<&AtomicU64, GraphError> {
        self.type_keys.get(&schema).ok_or_else(|| {
            GraphError::structural(format!("no key counter for {}", schema))
        })
    }

    /// Next key for a vertex of `schema`.
    pub fn for_type(&self, schema: TypeSchema) -> Result<[u8; TYPE_KEY_LENGTH], GraphError> {
        let limit = u64::from(u16::MAX);
        self.type_counter(schema)?
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                (next <= limit).then_some(next + 1)
            })
            .map(|issued| (issued as u16).to_be_bytes())
            .map_err(|_| GraphError::KeyExhausted(schema.name().to_string()))
    }

    /// Next key for an instance of the type `type_iid`.
    pub fn for_thing(&self, type_iid: &Iid) -> Result<[u8; THING_KEY_LENGTH], GraphError> {
        let mut keys = self.thing_keys.lock();
        let next = keys.entry(type_iid.clone()).or_insert(0);
        let issued = *next;
        *next = issued
            .checked_add(1)
            .ok_or_else(|| GraphError::KeyExhausted(format!("instances of {}", type_iid)))?;
        Ok(issued.to_be_bytes())
    }

    /// Next type key that would be issued for `schema`.
    pub fn peek_type(&self, schema: TypeSchema) -> Result<u64, GraphError> {
        Ok(self.type_counter(schema)?.load(Ordering::SeqCst))
    }

    /// Next thing key that would be issued for instances of `type_iid`.
    #[must_use]
    pub fn peek_thing(&self, type_iid: &Iid) -> u64 {
        self.thing_keys.lock().get(type_iid).copied().unwrap_or(0)
    }

    fn raise_type(&self, schema: TypeSchema, next: u64) -> Result<(), GraphError> {
        self.type_counter(schema)?.fetch_max(next, Ordering::SeqCst);
        Ok(())
    }

    fn raise_thing(&self, type_iid: Iid, next: u64) {
        let mut keys = self.thing_keys.lock();
        let current = keys.entry(type_iid).or_insert(0);
        *current = (*current).max(next);
    }

    /// Raise every counter past what `storage` already holds.
    ///
    /// Looks at the greatest stored IID of each category and at the last
    /// checkpoint; counters are never lowered.
    pub fn sync(&self, storage: &dyn Storage) -> Result<(), GraphError> {
        for schema in TypeSchema::ALL {
            if let Some((key, _)) = storage.last_with_prefix(&[schema.prefix().byte()])? {
                let counter = decode_counter(&key[1..TYPE_IID_LENGTH.min(key.len())])?;
                self.raise_type(schema, counter.saturating_add(1))?;
            }
            if let Some(checkpoint) = storage.get(&keys::type_counter_key(schema))? {
                self.raise_type(schema, decode_counter(&checkpoint)?)?;
            }
        }

        // Every type is in the label index, so its instances can be found.
        let mut type_iids = Vec::new();
        for entry in storage.iterate(&keys::label_index_prefix())? {
            let (_, value) = entry?;
            type_iids.push(Iid::new(value));
        }
        for type_iid in type_iids {
            let Some(instance) = keys::validate_type_iid(&type_iid)?.instance() else {
                continue;
            };
            let mut prefix = vec![instance.prefix().byte()];
            prefix.extend_from_slice(type_iid.as_bytes());
            if let Some((key, _)) = storage.last_with_prefix(&prefix)? {
                let start = prefix.len();
                let end = (start + THING_KEY_LENGTH).min(key.len());
                let counter = decode_counter(&key[start..end])?;
                self.raise_thing(type_iid, counter.saturating_add(1));
            }
        }

        let checkpoint_prefix = keys::thing_counter_prefix();
        for entry in storage.iterate(&checkpoint_prefix)? {
            let (key, value) = entry?;
            let type_iid = Iid::new(&key[checkpoint_prefix.len()..]);
            self.raise_thing(type_iid, decode_counter(&value)?);
        }

        tracing::debug!(
            thing_counters = self.thing_keys.lock().len(),
            "key generator synchronised"
        );
        Ok(())
    }

    /// Current value of every counter, as storage pairs.
    #[must_use]
    pub fn checkpoint(&self) -> Vec<KeyValue> {
        let mut pairs: Vec<KeyValue> = self
            .type_keys
            .iter()
            .map(|(schema, next)| {
                (
                    keys::type_counter_key(*schema),
                    next.load(Ordering::SeqCst).to_be_bytes().to_vec(),
                )
            })
            .collect();
        pairs.extend(self.thing_keys.lock().iter().map(|(type_iid, next)| {
            (keys::thing_counter_key(type_iid), next.to_be_bytes().to_vec())
        }));
        pairs
    }
}

/// Big-endian counter of up to 8 bytes.
fn decode_counter(bytes: &[u8]) -> Result<u64, GraphError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(GraphError::structural(format!(
            "malformed key counter of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

// =============================================================================
// TESTS
// =============================================================================
