//! Type vertices.
//!
//! A buffered type holds every property in memory. A persisted type loads
//! each property on first access and caches it; an empty cell means "not
//! loaded yet", a filled `None` means "loaded, absent".

use crate::encoding::keys;
use crate::encoding::{PropertyInfix, TypeSchema, ValueType};
use crate::primitives::{MAX_LABEL_LENGTH, MAX_REGEX_LENGTH};
use crate::storage::Storage;
use crate::types::{GraphError, Iid, Status};
use std::sync::{Arc, OnceLock};

/// A vertex of the type graph.
pub struct TypeVertex {
    storage: Arc<dyn Storage>,
    iid: Iid,
    schema: TypeSchema,
    status: Status,
    label: OnceLock<Option<String>>,
    is_abstract: OnceLock<bool>,
    value_type: OnceLock<Option<ValueType>>,
    regex: OnceLock<Option<String>>,
}

impl std::fmt::Debug for TypeVertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeVertex")
            .field("iid", &self.iid)
            .field("schema", &self.schema)
            .field("status", &self.status)
            .field("label", &self.label.get())
            .finish_non_exhaustive()
    }
}

/// Reject labels that cannot be stored in the label index.
pub(crate) fn validate_label(label: &str) -> Result<(), GraphError> {
    if label.is_empty() {
        return Err(GraphError::structural("type label must not be empty"));
    }
    if label.len() > MAX_LABEL_LENGTH {
        return Err(GraphError::structural(format!(
            "type label of {} bytes exceeds maximum {}",
            label.len(),
            MAX_LABEL_LENGTH
        )));
    }
    Ok(())
}

impl TypeVertex {
    pub(crate) fn buffered(
        storage: Arc<dyn Storage>,
        iid: Iid,
        schema: TypeSchema,
        label: String,
    ) -> Self {
        Self {
            storage,
            iid,
            schema,
            status: Status::Buffered,
            label: OnceLock::from(Some(label)),
            is_abstract: OnceLock::from(false),
            value_type: OnceLock::from(None),
            regex: OnceLock::from(None),
        }
    }

    pub(crate) fn persisted(storage: Arc<dyn Storage>, iid: Iid, schema: TypeSchema) -> Self {
        Self {
            storage,
            iid,
            schema,
            status: Status::Persisted,
            label: OnceLock::new(),
            is_abstract: OnceLock::new(),
            value_type: OnceLock::new(),
            regex: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn iid(&self) -> &Iid {
        &self.iid
    }

    #[must_use]
    pub fn schema(&self) -> TypeSchema {
        self.schema
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    fn property(&self, infix: PropertyInfix) -> Result<Option<Vec<u8>>, GraphError> {
        self.storage.get(&keys::property_key(&self.iid, infix))
    }

    fn reject_persisted(&self, property: &str) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            return Err(GraphError::structural(format!(
                "cannot change the {} of persisted type {}",
                property, self.iid
            )));
        }
        Ok(())
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    pub fn label(&self) -> Result<Option<&str>, GraphError> {
        let label = load(&self.label, || {
            self.property(PropertyInfix::Label)?
                .map(|bytes| {
                    String::from_utf8(bytes).map_err(|e| {
                        GraphError::structural(format!("malformed label of {}: {}", self.iid, e))
                    })
                })
                .transpose()
        })?;
        Ok(label.as_deref())
    }

    /// Rename a buffered type. The owning graph keeps its label map in step.
    pub(crate) fn set_label(&mut self, label: String) -> Result<(), GraphError> {
        self.reject_persisted("label")?;
        validate_label(&label)?;
        self.label = OnceLock::from(Some(label));
        Ok(())
    }

    pub fn is_abstract(&self) -> Result<bool, GraphError> {
        load(&self.is_abstract, || {
            Ok(self.property(PropertyInfix::Abstract)?.is_some())
        })
        .copied()
    }

    /// Set the abstract flag. On a persisted type this writes through to the
    /// transaction's storage immediately.
    pub fn set_abstract(&mut self, is_abstract: bool) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            let key = keys::property_key(&self.iid, PropertyInfix::Abstract);
            if is_abstract {
                self.storage.put(key, Vec::new())?;
            } else {
                self.storage.delete(&key)?;
            }
        }
        self.is_abstract = OnceLock::from(is_abstract);
        Ok(())
    }

    pub fn value_type(&self) -> Result<Option<ValueType>, GraphError> {
        load(&self.value_type, || {
            match self.property(PropertyInfix::ValueType)?.as_deref() {
                None => Ok(None),
                Some([byte]) => ValueType::from_byte(*byte).map(Some),
                Some(_) => Err(GraphError::structural(format!(
                    "malformed value type of {}",
                    self.iid
                ))),
            }
        })
        .copied()
    }

    /// Value type of a buffered attribute type.
    pub fn set_value_type(&mut self, value_type: ValueType) -> Result<(), GraphError> {
        self.reject_persisted("value type")?;
        if self.schema != TypeSchema::AttributeType {
            return Err(GraphError::structural(format!(
                "only attribute types have a value type, {} is a {}",
                self.iid, self.schema
            )));
        }
        self.value_type = OnceLock::from(Some(value_type));
        Ok(())
    }

    pub fn regex(&self) -> Result<Option<&str>, GraphError> {
        let regex = load(&self.regex, || {
            self.property(PropertyInfix::Regex)?
                .map(|bytes| {
                    String::from_utf8(bytes).map_err(|e| {
                        GraphError::structural(format!("malformed regex of {}: {}", self.iid, e))
                    })
                })
                .transpose()
        })?;
        Ok(regex.as_deref())
    }

    /// Regex of a buffered attribute type. An empty regex clears it.
    pub fn set_regex(&mut self, regex: &str) -> Result<(), GraphError> {
        self.reject_persisted("regex")?;
        if self.schema != TypeSchema::AttributeType {
            return Err(GraphError::structural(format!(
                "only attribute types have a regex, {} is a {}",
                self.iid, self.schema
            )));
        }
        if regex.len() > MAX_REGEX_LENGTH {
            return Err(GraphError::structural(format!(
                "regex of {} bytes exceeds maximum {}",
                regex.len(),
                MAX_REGEX_LENGTH
            )));
        }
        let regex = (!regex.is_empty()).then(|| regex.to_string());
        self.regex = OnceLock::from(regex);
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Write the vertex, its properties and its label index entry.
    pub(crate) fn commit(&mut self) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            return Err(GraphError::structural(format!(
                "type {} is already persisted",
                self.iid
            )));
        }
        let storage = Arc::clone(&self.storage);
        storage.put(self.iid.as_bytes().to_vec(), Vec::new())?;
        if let Some(label) = self.label()? {
            storage.put(
                keys::property_key(&self.iid, PropertyInfix::Label),
                label.as_bytes().to_vec(),
            )?;
            storage.put(keys::label_index_key(label), self.iid.as_bytes().to_vec())?;
        }
        if self.is_abstract()? {
            storage.put(
                keys::property_key(&self.iid, PropertyInfix::Abstract),
                Vec::new(),
            )?;
        }
        if let Some(value_type) = self.value_type()? {
            storage.put(
                keys::property_key(&self.iid, PropertyInfix::ValueType),
                vec![value_type.byte()],
            )?;
        }
        if let Some(regex) = self.regex()? {
            storage.put(
                keys::property_key(&self.iid, PropertyInfix::Regex),
                regex.as_bytes().to_vec(),
            )?;
        }
        self.status = Status::Persisted;
        Ok(())
    }

    /// Delete the vertex, its properties and its label index entry.
    ///
    /// Edges are removed by the owning graph.
    pub(crate) fn delete(&self) -> Result<(), GraphError> {
        if self.status == Status::Buffered {
            return Ok(());
        }
        if let Some(label) = self.label()? {
            self.storage.delete(&keys::label_index_key(label))?;
        }
        for infix in [
            PropertyInfix::Abstract,
            PropertyInfix::Label,
            PropertyInfix::ValueType,
            PropertyInfix::Regex,
        ] {
            self.storage.delete(&keys::property_key(&self.iid, infix))?;
        }
        self.storage.delete(self.iid.as_bytes())
    }
}

/// Fill `cell` with `init` on first access.
pub(crate) fn load<T>(
    cell: &OnceLock<T>,
    init: impl FnOnce() -> Result<T, GraphError>,
) -> Result<&T, GraphError> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}
