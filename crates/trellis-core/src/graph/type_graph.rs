//! # Type Graph
//!
//! The schema half of a transaction's graph: type vertices, their buffered
//! edges and the labels of buffered types.
//!
//! Persisted types are materialised on demand from storage and cached by
//! IID. Every mutation requires a schema session write transaction.

use super::adjacency::{Adjacency, DirectedEdges, EdgeHost, purge};
use super::key_generator::KeyGenerator;
use super::type_vertex::{TypeVertex, validate_label};
use crate::encoding::keys;
use crate::encoding::{TypeEdgeSchema, TypeSchema};
use crate::primitives::TYPE_IID_LENGTH;
use crate::storage::Storage;
use crate::types::{Access, Direction, GraphError, Iid, Status};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type vertices of one transaction.
pub struct TypeGraph {
    storage: Arc<dyn Storage>,
    key_generator: Arc<KeyGenerator>,
    access: Access,
    vertices: BTreeMap<Iid, TypeVertex>,
    /// Labels of buffered types only; persisted labels live in the index.
    labels: BTreeMap<String, Iid>,
    adjacency: Adjacency<TypeEdgeSchema>,
}

impl std::fmt::Debug for TypeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeGraph")
            .field("access", &self.access)
            .field("cached_vertices", &self.vertices.len())
            .field("buffered_labels", &self.labels.len())
            .field("buffered_edges", &self.adjacency.len())
            .finish_non_exhaustive()
    }
}

impl TypeGraph {
    pub(crate) fn new(
        storage: Arc<dyn Storage>,
        key_generator: Arc<KeyGenerator>,
        access: Access,
    ) -> Self {
        Self {
            storage,
            key_generator,
            access,
            vertices: BTreeMap::new(),
            labels: BTreeMap::new(),
            adjacency: Adjacency::default(),
        }
    }

    /// Create a buffered type with a fresh IID.
    pub fn create(&mut self, schema: TypeSchema, label: &str) -> Result<Iid, GraphError> {
        self.check_writable()?;
        validate_label(label)?;
        if self.iid_of(label)?.is_some() {
            return Err(GraphError::structural(format!(
                "a type labelled '{}' already exists",
                label
            )));
        }
        let iid = keys::type_iid(schema, self.key_generator.for_type(schema)?);
        let vertex = TypeVertex::buffered(
            Arc::clone(&self.storage),
            iid.clone(),
            schema,
            label.to_string(),
        );
        self.vertices.insert(iid.clone(), vertex);
        self.labels.insert(label.to_string(), iid.clone());
        tracing::debug!(%iid, label, schema = schema.name(), "type created");
        Ok(iid)
    }

    /// The type with this IID, if it exists.
    pub fn get(&mut self, iid: &Iid) -> Result<Option<&TypeVertex>, GraphError> {
        self.materialise(iid)?;
        Ok(self.vertices.get(iid))
    }

    /// Mutable access to a type; requires a schema write transaction.
    pub fn get_mut(&mut self, iid: &Iid) -> Result<Option<&mut TypeVertex>, GraphError> {
        self.check_writable()?;
        self.materialise(iid)?;
        Ok(self.vertices.get_mut(iid))
    }

    /// IID of the type labelled `label`: buffered labels first, then the index.
    pub fn iid_of(&self, label: &str) -> Result<Option<Iid>, GraphError> {
        if let Some(iid) = self.labels.get(label) {
            return Ok(Some(iid.clone()));
        }
        Ok(self.storage.get(&keys::label_index_key(label))?.map(Iid::new))
    }

    /// The type labelled `label`, if it exists.
    pub fn get_by_label(&mut self, label: &str) -> Result<Option<&TypeVertex>, GraphError> {
        match self.iid_of(label)? {
            Some(iid) => self.get(&iid),
            None => Ok(None),
        }
    }

    /// Rename a buffered type.
    pub fn set_label(&mut self, iid: &Iid, label: &str) -> Result<(), GraphError> {
        self.check_writable()?;
        if let Some(existing) = self.iid_of(label)? {
            if &existing == iid {
                return Ok(());
            }
            return Err(GraphError::structural(format!(
                "a type labelled '{}' already exists",
                label
            )));
        }
        self.materialise(iid)?;
        let vertex = self
            .vertices
            .get_mut(iid)
            .ok_or_else(|| GraphError::structural(format!("type {} does not exist", iid)))?;
        let previous = vertex.label()?.map(str::to_string);
        vertex.set_label(label.to_string())?;
        if let Some(previous) = previous {
            self.labels.remove(&previous);
        }
        self.labels.insert(label.to_string(), iid.clone());
        Ok(())
    }

    /// Outgoing edges of a type.
    pub fn outs(&mut self, iid: &Iid) -> Result<DirectedEdges<'_, Self>, GraphError> {
        DirectedEdges::of(self, iid, Direction::Out)
    }

    /// Incoming edges of a type.
    pub fn ins(&mut self, iid: &Iid) -> Result<DirectedEdges<'_, Self>, GraphError> {
        DirectedEdges::of(self, iid, Direction::In)
    }

    /// Delete a type with its properties, label and every incident edge.
    ///
    /// Returns `false` if there was no such type. Fails with
    /// `StructuralViolation` while the type has subtypes or stored instances;
    /// instances still buffered in this transaction are not seen here.
    pub fn delete(&mut self, iid: &Iid) -> Result<bool, GraphError> {
        self.check_writable()?;
        let Some(status) = self.materialise(iid)? else {
            return Ok(false);
        };
        if self.ins(iid)?.get(TypeEdgeSchema::Sub)?.next().transpose()?.is_some() {
            return Err(GraphError::structural(format!(
                "type {} still has subtypes",
                iid
            )));
        }
        if let Some(prefix) = keys::instance_prefix(iid)? {
            if self.storage.iterate(&prefix)?.next().transpose()?.is_some() {
                return Err(GraphError::structural(format!(
                    "type {} still has instances",
                    iid
                )));
            }
        }
        let edges = purge(self, iid, status)?;
        if let Some(vertex) = self.vertices.remove(iid) {
            if let Some(label) = vertex.label()? {
                if self.labels.get(label) == Some(iid) {
                    self.labels.remove(label);
                }
            }
            vertex.delete()?;
        }
        tracing::debug!(%iid, edges, "type deleted");
        Ok(true)
    }

    /// Every type label with its IID, in label order.
    pub fn labels(&self) -> Result<Vec<(String, Iid)>, GraphError> {
        let mut labels = BTreeMap::new();
        for entry in self.storage.iterate(&keys::label_index_prefix())? {
            let (key, value) = entry?;
            labels.insert(keys::label_from_index_key(&key)?, Iid::new(value));
        }
        labels.extend(self.labels.iter().map(|(label, iid)| (label.clone(), iid.clone())));
        Ok(labels.into_iter().collect())
    }

    /// Number of buffered types.
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.vertices
            .values()
            .filter(|vertex| vertex.status() == Status::Buffered)
            .count()
    }

    /// Write every buffered type and buffered type edge.
    pub(crate) fn commit(&mut self) -> Result<(usize, usize), GraphError> {
        let mut vertices = 0;
        for vertex in self.vertices.values_mut() {
            if vertex.status() == Status::Buffered {
                vertex.commit()?;
                vertices += 1;
            }
        }
        let mut edges = self.adjacency.drain();
        for edge in &mut edges {
            edge.commit(self.storage.as_ref())?;
        }
        self.labels.clear();
        Ok((vertices, edges.len()))
    }
}

impl EdgeHost for TypeGraph {
    type Schema = TypeEdgeSchema;

    const IID_LENGTH: usize = TYPE_IID_LENGTH;

    fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn adjacency(&self) -> &Adjacency<TypeEdgeSchema> {
        &self.adjacency
    }

    fn adjacency_mut(&mut self) -> &mut Adjacency<TypeEdgeSchema> {
        &mut self.adjacency
    }

    fn materialise(&mut self, iid: &Iid) -> Result<Option<Status>, GraphError> {
        if let Some(vertex) = self.vertices.get(iid) {
            return Ok(Some(vertex.status()));
        }
        let schema = keys::validate_type_iid(iid)?;
        if !self.storage.contains(iid.as_bytes())? {
            return Ok(None);
        }
        self.vertices.insert(
            iid.clone(),
            TypeVertex::persisted(Arc::clone(&self.storage), iid.clone(), schema),
        );
        Ok(Some(Status::Persisted))
    }

    fn check_writable(&self) -> Result<(), GraphError> {
        if !self.access.can_write_data() {
            return Err(GraphError::ReadOnly);
        }
        if !self.access.can_write_schema() {
            return Err(GraphError::SchemaWriteRequired);
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::encoding::{ThingSchema, ValueType};
    use crate::storage::RedbStorage;
    use redb::Database;
    use redb::backends::InMemoryBackend;

    fn graph(access: Access) -> TypeGraph {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .unwrap();
        RedbStorage::ensure_table(&db).unwrap();
        let storage: Arc<dyn Storage> = Arc::new(RedbStorage::write(Arc::new(db)).unwrap());
        TypeGraph::new(storage, Arc::new(KeyGenerator::new()), access)
    }

    fn collect(edges: &DirectedEdges<'_, TypeGraph>, schema: TypeEdgeSchema) -> Vec<Iid> {
        edges.get(schema).unwrap().map(Result::unwrap).collect()
    }

    #[test]
    fn create_and_find_by_label() {
        let mut graph = graph(Access::SchemaWrite);
        let person = graph.create(TypeSchema::EntityType, "person").unwrap();

        let vertex = graph.get_by_label("person").unwrap().unwrap();
        assert_eq!(vertex.iid(), &person);
        assert_eq!(vertex.status(), Status::Buffered);
        assert!(!vertex.is_abstract().unwrap());
        assert!(graph.get_by_label("company").unwrap().is_none());
    }

    #[test]
    fn duplicate_label_rejected() {
        let mut graph = graph(Access::SchemaWrite);
        graph.create(TypeSchema::EntityType, "person").unwrap();
        assert!(matches!(
            graph.create(TypeSchema::RelationType, "person"),
            Err(GraphError::StructuralViolation(_))
        ));
        assert!(graph.create(TypeSchema::EntityType, "").is_err());
    }

    #[test]
    fn mutation_requires_schema_write() {
        let mut data = graph(Access::DataWrite);
        assert!(matches!(
            data.create(TypeSchema::EntityType, "person"),
            Err(GraphError::SchemaWriteRequired)
        ));
        let mut read = graph(Access::Read);
        assert!(matches!(
            read.create(TypeSchema::EntityType, "person"),
            Err(GraphError::ReadOnly)
        ));
    }

    #[test]
    fn buffered_rename_updates_label_lookup() {
        let mut graph = graph(Access::SchemaWrite);
        let person = graph.create(TypeSchema::EntityType, "person").unwrap();
        graph.set_label(&person, "human").unwrap();

        assert!(graph.get_by_label("person").unwrap().is_none());
        assert_eq!(graph.iid_of("human").unwrap(), Some(person));
    }

    #[test]
    fn edges_visible_from_both_endpoints() {
        let mut graph = graph(Access::SchemaWrite);
        let thing = graph.create(TypeSchema::ThingType, "thing").unwrap();
        let person = graph.create(TypeSchema::EntityType, "person").unwrap();
        graph.outs(&person).unwrap().add(TypeEdgeSchema::Sub, &thing).unwrap();
        graph.outs(&person).unwrap().add(TypeEdgeSchema::Sub, &thing).unwrap();

        assert_eq!(collect(&graph.outs(&person).unwrap(), TypeEdgeSchema::Sub), vec![thing.clone()]);
        assert_eq!(collect(&graph.ins(&thing).unwrap(), TypeEdgeSchema::Sub), vec![person.clone()]);

        assert!(graph.ins(&thing).unwrap().remove(TypeEdgeSchema::Sub, &person).unwrap());
        assert!(collect(&graph.outs(&person).unwrap(), TypeEdgeSchema::Sub).is_empty());
    }

    #[test]
    fn edge_to_missing_vertex_rejected() {
        let mut graph = graph(Access::SchemaWrite);
        let person = graph.create(TypeSchema::EntityType, "person").unwrap();
        let ghost = keys::type_iid(TypeSchema::EntityType, [0x0F, 0xFF]);

        assert!(graph.outs(&person).unwrap().add(TypeEdgeSchema::Sub, &ghost).is_err());
        assert!(graph.outs(&ghost).is_err());
    }

    #[test]
    fn commit_persists_properties_and_index() {
        let mut graph = graph(Access::SchemaWrite);
        let name = graph.create(TypeSchema::AttributeType, "name").unwrap();
        {
            let vertex = graph.get_mut(&name).unwrap().unwrap();
            vertex.set_value_type(ValueType::String).unwrap();
            vertex.set_regex("^[a-z]+$").unwrap();
        }
        assert_eq!(graph.commit().unwrap(), (1, 0));

        let storage = Arc::clone(&graph.storage);
        let mut fresh = TypeGraph::new(storage, Arc::new(KeyGenerator::new()), Access::SchemaWrite);
        let vertex = fresh.get_by_label("name").unwrap().unwrap();
        assert_eq!(vertex.status(), Status::Persisted);
        assert_eq!(vertex.value_type().unwrap(), Some(ValueType::String));
        assert_eq!(vertex.regex().unwrap(), Some("^[a-z]+$"));
        assert!(!vertex.is_abstract().unwrap());
    }

    #[test]
    fn persisted_structural_setters_rejected() {
        let mut graph = graph(Access::SchemaWrite);
        let name = graph.create(TypeSchema::AttributeType, "name").unwrap();
        graph.commit().unwrap();

        assert!(graph.set_label(&name, "title").is_err());
        let vertex = graph.get_mut(&name).unwrap().unwrap();
        assert!(vertex.set_value_type(ValueType::Long).is_err());
        assert!(vertex.set_regex(".*").is_err());
        vertex.set_abstract(true).unwrap();
        assert!(vertex.is_abstract().unwrap());
    }

    #[test]
    fn delete_removes_label_and_edges() {
        let mut graph = graph(Access::SchemaWrite);
        let thing = graph.create(TypeSchema::ThingType, "thing").unwrap();
        let person = graph.create(TypeSchema::EntityType, "person").unwrap();
        graph.outs(&person).unwrap().add(TypeEdgeSchema::Sub, &thing).unwrap();
        graph.commit().unwrap();

        assert!(graph.delete(&person).unwrap());
        assert!(!graph.delete(&person).unwrap());
        assert!(graph.get_by_label("person").unwrap().is_none());
        assert!(collect(&graph.ins(&thing).unwrap(), TypeEdgeSchema::Sub).is_empty());
        assert_eq!(graph.labels().unwrap().len(), 1);
    }

    #[test]
    fn delete_rejected_while_type_is_in_use() {
        let mut graph = graph(Access::SchemaWrite);
        let thing = graph.create(TypeSchema::ThingType, "thing").unwrap();
        let person = graph.create(TypeSchema::EntityType, "person").unwrap();
        let student = graph.create(TypeSchema::EntityType, "student").unwrap();
        graph.outs(&person).unwrap().add(TypeEdgeSchema::Sub, &thing).unwrap();
        graph.outs(&student).unwrap().add(TypeEdgeSchema::Sub, &person).unwrap();
        graph.commit().unwrap();

        assert!(matches!(
            graph.delete(&person),
            Err(GraphError::StructuralViolation(_))
        ));

        let alice = keys::thing_iid(ThingSchema::Entity, &student, [0; 8]).unwrap();
        graph.storage.put(alice.as_bytes().to_vec(), Vec::new()).unwrap();
        assert!(matches!(
            graph.delete(&student),
            Err(GraphError::StructuralViolation(_))
        ));

        graph.storage.delete(alice.as_bytes()).unwrap();
        assert!(graph.delete(&student).unwrap());
        assert!(graph.delete(&person).unwrap());
        assert!(graph.get_by_label("person").unwrap().is_none());
    }
}
