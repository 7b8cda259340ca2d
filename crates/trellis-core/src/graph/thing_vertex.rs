//! Thing vertices: instances of entity, relation, role and attribute types.

use super::type_vertex::load;
use crate::encoding::{ThingSchema, Value};
use crate::primitives::TYPE_IID_LENGTH;
use crate::storage::Storage;
use crate::types::{GraphError, Iid, Status};
use std::sync::{Arc, OnceLock};

/// A vertex of the thing graph.
pub struct ThingVertex {
    storage: Arc<dyn Storage>,
    iid: Iid,
    schema: ThingSchema,
    status: Status,
    value: OnceLock<Option<Value>>,
}

impl std::fmt::Debug for ThingVertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingVertex")
            .field("iid", &self.iid)
            .field("schema", &self.schema)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl ThingVertex {
    pub(crate) fn buffered(
        storage: Arc<dyn Storage>,
        iid: Iid,
        schema: ThingSchema,
        value: Option<Value>,
    ) -> Self {
        Self {
            storage,
            iid,
            schema,
            status: Status::Buffered,
            value: OnceLock::from(value),
        }
    }

    pub(crate) fn persisted(storage: Arc<dyn Storage>, iid: Iid, schema: ThingSchema) -> Self {
        Self {
            storage,
            iid,
            schema,
            status: Status::Persisted,
            value: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn iid(&self) -> &Iid {
        &self.iid
    }

    #[must_use]
    pub fn schema(&self) -> ThingSchema {
        self.schema
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// IID of this thing's type, read from its own IID.
    #[must_use]
    pub fn type_iid(&self) -> Iid {
        Iid::new(&self.iid.as_bytes()[1..=TYPE_IID_LENGTH])
    }

    /// Value of an attribute; `None` for every other kind of thing.
    pub fn value(&self) -> Result<Option<&Value>, GraphError> {
        let value = load(&self.value, || {
            if self.schema != ThingSchema::Attribute {
                return Ok(None);
            }
            match self.storage.get(self.iid.as_bytes())? {
                Some(bytes) if !bytes.is_empty() => Value::decode(&bytes).map(Some),
                _ => Ok(None),
            }
        })?;
        Ok(value.as_ref())
    }

    pub(crate) fn commit(&mut self) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            return Err(GraphError::structural(format!(
                "thing {} is already persisted",
                self.iid
            )));
        }
        let payload = match self.value()? {
            Some(value) => value.encode()?,
            None => Vec::new(),
        };
        self.storage.put(self.iid.as_bytes().to_vec(), payload)?;
        self.status = Status::Persisted;
        Ok(())
    }

    pub(crate) fn delete(&self) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            self.storage.delete(self.iid.as_bytes())?;
        }
        Ok(())
    }
}
