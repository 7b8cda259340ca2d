//! # redb-backed Storage
//!
//! One transaction's view of a redb database:
//! - reads come from a redb read snapshot taken when the view is opened
//! - writes go to an ordered in-memory overlay (tombstones for deletes)
//! - `commit_with` applies the overlay in a single redb write transaction
//!
//! Reads merge the overlay over the snapshot, so a transaction sees its own
//! writes while other transactions keep seeing their snapshots.
//!
//! Writable views also remember what they saw: the snapshot value of every
//! key they read or wrote, and every prefix they scanned. `commit_with`
//! compares those against the committed state inside the write transaction
//! and fails with `Conflict` if another transaction changed any of them
//! since the snapshot was taken. The first committer wins.

use super::{KeyValue, KeyValues, Storage};
use crate::encoding::keys::prefix_end;
use crate::types::GraphError;
use parking_lot::Mutex;
use redb::{Database, ReadOnlyTable, ReadableDatabase, Table, TableDefinition};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

/// The single table holding every graph key.
pub const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("data");

type Snapshot = ReadOnlyTable<&'static [u8], &'static [u8]>;
type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Writes of a writable view, plus the reads they depend on.
#[derive(Default)]
struct Pending {
    writes: Overlay,
    /// Snapshot value of every key read through to the snapshot or written.
    observed: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    /// Prefixes scanned over the snapshot.
    scanned: BTreeSet<Vec<u8>>,
}

impl Pending {
    /// Record the snapshot value of `key` once and return it.
    fn observe(
        &mut self,
        snapshot: &Snapshot,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, GraphError> {
        if let Some(value) = self.observed.get(key) {
            return Ok(value.clone());
        }
        let value = snapshot.get(key)?.map(|value| value.value().to_vec());
        self.observed.insert(key.to_vec(), value.clone());
        Ok(value)
    }
}

/// Transaction-scoped storage over a redb database.
pub struct RedbStorage {
    db: Arc<Database>,
    snapshot: Mutex<Snapshot>,
    /// `None` for read-only views.
    overlay: Option<Mutex<Pending>>,
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage")
            .field("writable", &self.is_writable())
            .field(
                "pending",
                &self.overlay.as_ref().map(|overlay| overlay.lock().writes.len()),
            )
            .finish_non_exhaustive()
    }
}

impl RedbStorage {
    /// Create the data table if the database does not have it yet.
    pub fn ensure_table(db: &Database) -> Result<(), GraphError> {
        let write_txn = db.begin_write()?;
        let _ = write_txn.open_table(DATA_TABLE)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Read-only view: every put or delete fails with `ReadOnly`.
    pub fn read(db: Arc<Database>) -> Result<Self, GraphError> {
        let snapshot = Self::snapshot(&db)?;
        Ok(Self {
            db,
            snapshot: Mutex::new(snapshot),
            overlay: None,
        })
    }

    /// Writable view with an empty overlay.
    pub fn write(db: Arc<Database>) -> Result<Self, GraphError> {
        let snapshot = Self::snapshot(&db)?;
        Ok(Self {
            db,
            snapshot: Mutex::new(snapshot),
            overlay: Some(Mutex::new(Pending::default())),
        })
    }

    fn snapshot(db: &Database) -> Result<Snapshot, GraphError> {
        let read_txn = db.begin_read()?;
        match read_txn.open_table(DATA_TABLE) {
            Ok(table) => Ok(table),
            Err(redb::TableError::TableDoesNotExist(_)) => Err(GraphError::NotInitialised),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.overlay.is_some()
    }

    /// Number of buffered puts and deletes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.overlay
            .as_ref()
            .map_or(0, |overlay| overlay.lock().writes.len())
    }

    fn overlay(&self) -> Result<&Mutex<Pending>, GraphError> {
        self.overlay.as_ref().ok_or(GraphError::ReadOnly)
    }

    /// Apply the overlay, plus the pairs produced by `extra`, atomically.
    ///
    /// `extra` runs while the redb writer is held, so whatever it reads is
    /// ordered after every earlier commit. The overlay is drained even when
    /// the write fails. Nothing is written if another transaction committed a
    /// change to a key or prefix this view depends on.
    pub fn commit_with<F>(&self, extra: F) -> Result<usize, GraphError>
    where
        F: FnOnce() -> Vec<KeyValue>,
    {
        let pending = std::mem::take(&mut *self.overlay()?.lock());
        let write_txn = self.db.begin_write()?;
        let conflict = {
            let table = write_txn.open_table(DATA_TABLE)?;
            self.find_conflict(&table, &pending)?
        };
        if let Some(key) = conflict {
            write_txn.abort()?;
            let key = crate::types::hex_string(&key);
            tracing::debug!(%key, "commit rejected: concurrent change");
            return Err(GraphError::Conflict(key));
        }
        let mut written = 0;
        {
            let mut table = write_txn.open_table(DATA_TABLE)?;
            for (key, value) in &pending.writes {
                match value {
                    Some(value) => {
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    None => {
                        table.remove(key.as_slice())?;
                    }
                }
                written += 1;
            }
            for (key, value) in extra() {
                table.insert(key.as_slice(), value.as_slice())?;
                written += 1;
            }
        }
        write_txn.commit()?;
        Ok(written)
    }

    /// The first observed key or scanned prefix whose committed state differs
    /// from the snapshot.
    fn find_conflict(
        &self,
        table: &Table<'_, &'static [u8], &'static [u8]>,
        pending: &Pending,
    ) -> Result<Option<Vec<u8>>, GraphError> {
        for (key, seen) in &pending.observed {
            let current = redb::ReadableTable::get(table, key.as_slice())?;
            if current.as_ref().map(|value| value.value()) != seen.as_deref() {
                return Ok(Some(key.clone()));
            }
        }
        let snapshot = self.snapshot.lock();
        for prefix in &pending.scanned {
            let end = prefix_end(prefix);
            let bounds = Self::bounds(prefix, end.as_deref());
            let mut seen = snapshot.range::<&[u8]>(bounds)?;
            let mut current = redb::ReadableTable::range::<&[u8]>(table, bounds)?;
            loop {
                match (seen.next(), current.next()) {
                    (None, None) => break,
                    (Some(before), Some(now)) => {
                        let (before_key, before_value) = before?;
                        let (now_key, now_value) = now?;
                        if before_key.value() != now_key.value()
                            || before_value.value() != now_value.value()
                        {
                            return Ok(Some(prefix.clone()));
                        }
                    }
                    _ => return Ok(Some(prefix.clone())),
                }
            }
        }
        Ok(None)
    }

    fn bounds<'a>(
        prefix: &'a [u8],
        end: Option<&'a [u8]>,
    ) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
        (
            Bound::Included(prefix),
            end.map_or(Bound::Unbounded, Bound::Excluded),
        )
    }
}

impl Storage for RedbStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, GraphError> {
        if let Some(overlay) = &self.overlay {
            let mut pending = overlay.lock();
            if let Some(entry) = pending.writes.get(key) {
                return Ok(entry.clone());
            }
            return pending.observe(&self.snapshot.lock(), key);
        }
        let snapshot = self.snapshot.lock();
        Ok(snapshot.get(key)?.map(|value| value.value().to_vec()))
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), GraphError> {
        let mut pending = self.overlay()?.lock();
        pending.observe(&self.snapshot.lock(), &key)?;
        pending.writes.insert(key, Some(value));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), GraphError> {
        let mut pending = self.overlay()?.lock();
        pending.observe(&self.snapshot.lock(), key)?;
        pending.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn iterate(&self, prefix: &[u8]) -> Result<KeyValues, GraphError> {
        let end = prefix_end(prefix);
        let bounds = Self::bounds(prefix, end.as_deref());
        let stored = self.snapshot.lock().range::<&[u8]>(bounds)?;
        let pending = match &self.overlay {
            Some(overlay) => {
                let mut pending = overlay.lock();
                pending.scanned.insert(prefix.to_vec());
                pending
                    .writes
                    .range::<[u8], _>(bounds)
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            }
            None => Vec::new(),
        };
        Ok(Box::new(MergeIter {
            stored,
            stored_head: None,
            stored_done: false,
            pending: pending.into_iter(),
            pending_head: None,
        }))
    }

    fn last_with_prefix(&self, prefix: &[u8]) -> Result<Option<KeyValue>, GraphError> {
        let end = prefix_end(prefix);
        let bounds = Self::bounds(prefix, end.as_deref());
        let mut overlay = self.overlay.as_ref().map(|overlay| overlay.lock());
        if let Some(pending) = overlay.as_mut() {
            pending.scanned.insert(prefix.to_vec());
        }
        let overlay = overlay.as_ref().map(|pending| &pending.writes);

        let pending_last = overlay.and_then(|overlay| {
            overlay
                .range::<[u8], _>(bounds)
                .rev()
                .find_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.clone())))
        });

        let mut stored_last = None;
        for entry in self.snapshot.lock().range::<&[u8]>(bounds)?.rev() {
            let (key, value) = entry?;
            let key = key.value();
            let shadowed = overlay.is_some_and(|overlay| overlay.contains_key(key));
            if !shadowed {
                stored_last = Some((key.to_vec(), value.value().to_vec()));
                break;
            }
        }

        Ok(match (stored_last, pending_last) {
            (Some(stored), Some(pending)) => {
                if stored.0 > pending.0 {
                    Some(stored)
                } else {
                    Some(pending)
                }
            }
            (stored, pending) => pending.or(stored),
        })
    }
}

// =============================================================================
// MERGE ITERATOR
// =============================================================================

type OverlayEntry = (Vec<u8>, Option<Vec<u8>>);

/// Ordered merge of a snapshot range with an overlay copy.
///
/// On equal keys the overlay entry wins; a tombstone hides the stored pair.
struct MergeIter {
    stored: redb::Range<'static, &'static [u8], &'static [u8]>,
    stored_head: Option<KeyValue>,
    stored_done: bool,
    pending: std::vec::IntoIter<OverlayEntry>,
    pending_head: Option<OverlayEntry>,
}

impl MergeIter {
    fn fill_stored(&mut self) -> Result<(), GraphError> {
        if self.stored_head.is_none() && !self.stored_done {
            match self.stored.next() {
                Some(Ok((key, value))) => {
                    self.stored_head = Some((key.value().to_vec(), value.value().to_vec()));
                }
                Some(Err(e)) => {
                    self.stored_done = true;
                    return Err(e.into());
                }
                None => self.stored_done = true,
            }
        }
        Ok(())
    }
}

impl Iterator for MergeIter {
    type Item = Result<KeyValue, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Err(e) = self.fill_stored() {
                return Some(Err(e));
            }
            if self.pending_head.is_none() {
                self.pending_head = self.pending.next();
            }
            match (self.stored_head.take(), self.pending_head.take()) {
                (None, None) => return None,
                (Some(stored), None) => return Some(Ok(stored)),
                (None, Some((key, value))) => {
                    if let Some(value) = value {
                        return Some(Ok((key, value)));
                    }
                }
                (Some(stored), Some((key, value))) => match stored.0.cmp(&key) {
                    Ordering::Less => {
                        self.pending_head = Some((key, value));
                        return Some(Ok(stored));
                    }
                    Ordering::Greater => {
                        self.stored_head = Some(stored);
                        if let Some(value) = value {
                            return Some(Ok((key, value)));
                        }
                    }
                    Ordering::Equal => {
                        if let Some(value) = value {
                            return Some(Ok((key, value)));
                        }
                    }
                },
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
