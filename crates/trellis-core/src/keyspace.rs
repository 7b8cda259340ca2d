//! # Keyspace
//!
//! A keyspace is one redb file holding one graph. It owns what every session
//! against it shares: the database handle, the key generator and the schema
//! lock. Cloning a `Keyspace` clones handles, not data.

use crate::encoding::keys;
use crate::formats::KeyspaceHeader;
use crate::graph::KeyGenerator;
use crate::lock::SchemaLock;
use crate::session::Session;
use crate::storage::{RedbStorage, Storage};
use crate::types::{GraphError, SessionType, TransactionType};
use redb::Database;
use redb::backends::InMemoryBackend;
use std::path::Path;
use std::sync::Arc;

/// Handle to an open keyspace.
#[derive(Clone)]
pub struct Keyspace {
    name: String,
    db: Arc<Database>,
    key_generator: Arc<KeyGenerator>,
    schema_lock: SchemaLock,
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("name", &self.name)
            .field("schema_lock", &self.schema_lock)
            .finish_non_exhaustive()
    }
}

fn name_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Keyspace {
    fn assemble(name: String, db: Database) -> Self {
        Self {
            name,
            db: Arc::new(db),
            key_generator: Arc::new(KeyGenerator::new()),
            schema_lock: SchemaLock::new(),
        }
    }

    /// Create and initialise a keyspace file.
    ///
    /// Fails with `AlreadyInitialised` if the file already holds a keyspace.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let db = Database::create(path)?;
        Self::initialise(Self::assemble(name_of(path), db))
    }

    /// Create an initialised keyspace that lives only in memory.
    pub fn in_memory() -> Result<Self, GraphError> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::initialise(Self::assemble("memory".to_string(), db))
    }

    fn initialise(keyspace: Self) -> Result<Self, GraphError> {
        RedbStorage::ensure_table(&keyspace.db)?;
        let storage = RedbStorage::read(Arc::clone(&keyspace.db))?;
        keyspace.key_generator.sync(&storage)?;
        {
            let session = keyspace.session(SessionType::Schema);
            let mut transaction = session.transaction(TransactionType::Write)?;
            transaction.graphs().initialise()?;
            transaction.commit()?;
        }
        tracing::info!(keyspace = %keyspace.name, "keyspace created");
        Ok(keyspace)
    }

    /// Open an initialised keyspace file.
    ///
    /// Checks the header and brings the key generator past every stored IID.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GraphError::NotInitialised);
        }
        let keyspace = Self::assemble(name_of(path), Database::open(path)?);
        let storage = RedbStorage::read(Arc::clone(&keyspace.db))?;
        let header = storage
            .get(&keys::header_key())?
            .ok_or(GraphError::NotInitialised)?;
        KeyspaceHeader::from_bytes(&header)?;
        keyspace.key_generator.sync(&storage)?;
        tracing::info!(keyspace = %keyspace.name, "keyspace opened");
        Ok(keyspace)
    }

    /// Open the keyspace at `path`, creating it if needed.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        match Self::open(path) {
            Err(GraphError::NotInitialised) => Self::create(path),
            other => other,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key_generator(&self) -> &Arc<KeyGenerator> {
        &self.key_generator
    }

    #[must_use]
    pub fn schema_lock(&self) -> &SchemaLock {
        &self.schema_lock
    }

    pub(crate) fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Open a session. A schema session waits for exclusive use of the schema.
    pub fn session(&self, kind: SessionType) -> Session {
        let guard = match kind {
            SessionType::Schema => Some(self.schema_lock.lock_schema()),
            SessionType::Data => None,
        };
        Session::new(self.clone(), kind, guard)
    }

    /// Open a session without waiting; `None` if the schema lock is taken.
    pub fn try_session(&self, kind: SessionType) -> Option<Session> {
        let guard = match kind {
            SessionType::Schema => Some(self.schema_lock.try_lock_schema()?),
            SessionType::Data => None,
        };
        Some(Session::new(self.clone(), kind, guard))
    }
}

// =============================================================================
// TESTS
// =============================================================================
