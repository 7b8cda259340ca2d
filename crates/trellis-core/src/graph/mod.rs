//! # Graph
//!
//! A transaction's view of the keyspace as two graphs:
//! - `TypeGraph`: entity, relation, role and attribute types
//! - `ThingGraph`: their instances
//!
//! New vertices and edges are buffered in memory. Persisted ones are read
//! lazily from storage. `Graphs::commit` writes everything buffered into the
//! transaction's storage exactly once.

pub mod adjacency;
pub mod edge;
pub mod key_generator;
pub mod thing_graph;
pub mod thing_vertex;
pub mod type_graph;
pub mod type_vertex;

pub use adjacency::{Adjacency, DirectedEdges, EdgeHost, EdgeId};
pub use edge::Edge;
pub use key_generator::KeyGenerator;
pub use thing_graph::ThingGraph;
pub use thing_vertex::ThingVertex;
pub use type_graph::TypeGraph;
pub use type_vertex::TypeVertex;

use crate::encoding::keys;
use crate::encoding::{ThingSchema, TypeEdgeSchema, TypeSchema, Value};
use crate::formats::KeyspaceHeader;
use crate::storage::Storage;
use crate::types::{Access, GraphError, Iid};
use std::sync::Arc;

/// Counts written by a graph commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub types: usize,
    pub type_edges: usize,
    pub things: usize,
    pub thing_edges: usize,
}

/// The type and thing graphs of one transaction.
pub struct Graphs {
    storage: Arc<dyn Storage>,
    access: Access,
    types: TypeGraph,
    things: ThingGraph,
}

impl std::fmt::Debug for Graphs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graphs")
            .field("access", &self.access)
            .field("types", &self.types)
            .field("things", &self.things)
            .finish_non_exhaustive()
    }
}

impl Graphs {
    pub(crate) fn new(
        storage: Arc<dyn Storage>,
        key_generator: Arc<KeyGenerator>,
        access: Access,
    ) -> Self {
        Self {
            types: TypeGraph::new(Arc::clone(&storage), Arc::clone(&key_generator), access),
            things: ThingGraph::new(Arc::clone(&storage), key_generator, access),
            storage,
            access,
        }
    }

    pub fn types(&mut self) -> &mut TypeGraph {
        &mut self.types
    }

    pub fn things(&mut self) -> &mut ThingGraph {
        &mut self.things
    }

    #[must_use]
    pub fn access(&self) -> Access {
        self.access
    }

    /// Whether the keyspace carries a header.
    pub fn is_initialised(&self) -> Result<bool, GraphError> {
        self.storage.contains(&keys::header_key())
    }

    /// Write the header and the abstract root types.
    ///
    /// `entity`, `relation` and `attribute` are subtypes of `thing`; `role`
    /// stands alone.
    pub fn initialise(&mut self) -> Result<(), GraphError> {
        if !self.access.can_write_schema() {
            return Err(GraphError::SchemaWriteRequired);
        }
        if self.is_initialised()? {
            return Err(GraphError::AlreadyInitialised);
        }
        let mut roots = Vec::with_capacity(TypeSchema::ALL.len());
        for schema in TypeSchema::ALL {
            let iid = self.types.create(schema, schema.root_label())?;
            if let Some(vertex) = self.types.get_mut(&iid)? {
                vertex.set_abstract(true)?;
            }
            roots.push((schema, iid));
        }
        let thing = roots
            .iter()
            .find(|(schema, _)| *schema == TypeSchema::ThingType)
            .map(|(_, iid)| iid.clone())
            .ok_or_else(|| GraphError::structural("root thing type missing"))?;
        for (schema, iid) in &roots {
            if matches!(
                schema,
                TypeSchema::EntityType | TypeSchema::RelationType | TypeSchema::AttributeType
            ) {
                self.types.outs(iid)?.add(TypeEdgeSchema::Sub, &thing)?;
            }
        }
        self.storage
            .put(keys::header_key(), KeyspaceHeader::new().to_bytes()?)?;
        tracing::debug!("root types created");
        Ok(())
    }

    /// Schema of the instances of `type_iid`, after checking the type can
    /// have instances at all.
    fn instance_schema(&mut self, type_iid: &Iid) -> Result<ThingSchema, GraphError> {
        let vertex = self
            .types
            .get(type_iid)?
            .ok_or_else(|| GraphError::structural(format!("type {} does not exist", type_iid)))?;
        let schema = vertex.schema().instance().ok_or_else(|| {
            GraphError::structural(format!("{} types cannot have instances", vertex.schema()))
        })?;
        if vertex.is_abstract()? {
            return Err(GraphError::structural(format!(
                "abstract type '{}' cannot have instances",
                vertex.label()?.unwrap_or_default()
            )));
        }
        Ok(schema)
    }

    /// Create an entity, relation or role of `type_iid`.
    pub fn create_thing(&mut self, type_iid: &Iid) -> Result<Iid, GraphError> {
        if !self.access.can_write_data() {
            return Err(GraphError::ReadOnly);
        }
        let schema = self.instance_schema(type_iid)?;
        if schema == ThingSchema::Attribute {
            return Err(GraphError::structural(
                "attributes are created with a value",
            ));
        }
        self.things.insert(schema, type_iid, None)
    }

    /// Create an attribute of `type_iid` holding `value`.
    pub fn create_attribute(&mut self, type_iid: &Iid, value: Value) -> Result<Iid, GraphError> {
        if !self.access.can_write_data() {
            return Err(GraphError::ReadOnly);
        }
        let schema = self.instance_schema(type_iid)?;
        if schema != ThingSchema::Attribute {
            return Err(GraphError::structural(format!(
                "{} is not an attribute type",
                type_iid
            )));
        }
        let expected = self
            .types
            .get(type_iid)?
            .map(|vertex| vertex.value_type())
            .transpose()?
            .flatten();
        if expected != Some(value.value_type()) {
            return Err(GraphError::structural(format!(
                "value of type {} does not match attribute type {}",
                value.value_type(),
                type_iid
            )));
        }
        value.encode()?;
        self.things.insert(schema, type_iid, Some(value))
    }

    /// Write every buffered vertex and edge into the transaction's storage.
    pub(crate) fn commit(mut self) -> Result<CommitSummary, GraphError> {
        let (types, type_edges) = self.types.commit()?;
        let (things, thing_edges) = self.things.commit()?;
        Ok(CommitSummary {
            types,
            type_edges,
            things,
            thing_edges,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::encoding::{ThingEdgeSchema, ValueType};
    use crate::storage::RedbStorage;
    use crate::types::Status;
    use redb::Database;
    use redb::backends::InMemoryBackend;

    fn graphs(access: Access) -> Graphs {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .unwrap();
        RedbStorage::ensure_table(&db).unwrap();
        let storage: Arc<dyn Storage> = Arc::new(RedbStorage::write(Arc::new(db)).unwrap());
        Graphs::new(storage, Arc::new(KeyGenerator::new()), access)
    }

    fn schema_with_person() -> (Graphs, Iid) {
        let mut graphs = graphs(Access::SchemaWrite);
        graphs.initialise().unwrap();
        let person = graphs.types().create(TypeSchema::EntityType, "person").unwrap();
        (graphs, person)
    }

    #[test]
    fn initialise_creates_abstract_roots() {
        let mut graphs = graphs(Access::SchemaWrite);
        graphs.initialise().unwrap();

        assert!(graphs.is_initialised().unwrap());
        for schema in TypeSchema::ALL {
            let vertex = graphs.types().get_by_label(schema.root_label()).unwrap().unwrap();
            assert_eq!(vertex.schema(), schema);
            assert!(vertex.is_abstract().unwrap());
        }
        let thing = graphs.types().iid_of("thing").unwrap().unwrap();
        let subs: Vec<_> = graphs
            .types()
            .ins(&thing)
            .unwrap()
            .get(TypeEdgeSchema::Sub)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(subs.len(), 3);
        assert!(matches!(
            graphs.initialise(),
            Err(GraphError::AlreadyInitialised)
        ));
    }

    #[test]
    fn thing_iid_carries_its_type() {
        let (mut graphs, person) = schema_with_person();
        let alice = graphs.create_thing(&person).unwrap();

        let vertex = graphs.things().get(&alice).unwrap().unwrap();
        assert_eq!(vertex.type_iid(), person);
        assert_eq!(vertex.schema(), ThingSchema::Entity);
        assert_eq!(vertex.status(), Status::Buffered);
        assert!(vertex.value().unwrap().is_none());
    }

    #[test]
    fn abstract_type_cannot_be_instantiated() {
        let (mut graphs, _) = schema_with_person();
        let entity = graphs.types().iid_of("entity").unwrap().unwrap();
        assert!(matches!(
            graphs.create_thing(&entity),
            Err(GraphError::StructuralViolation(_))
        ));
        let role = graphs.types().iid_of("role").unwrap().unwrap();
        assert!(graphs.create_thing(&role).is_err());
    }

    #[test]
    fn attribute_value_must_match_value_type() {
        let (mut graphs, person) = schema_with_person();
        let age = graphs.types().create(TypeSchema::AttributeType, "age").unwrap();
        graphs
            .types()
            .get_mut(&age)
            .unwrap()
            .unwrap()
            .set_value_type(ValueType::Long)
            .unwrap();

        assert!(graphs.create_attribute(&age, Value::String("x".into())).is_err());
        assert!(graphs.create_thing(&age).is_err());
        assert!(graphs.create_attribute(&person, Value::Long(3)).is_err());

        let thirty = graphs.create_attribute(&age, Value::Long(30)).unwrap();
        assert_eq!(
            graphs.things().get(&thirty).unwrap().unwrap().value().unwrap(),
            Some(&Value::Long(30))
        );
    }

    #[test]
    fn commit_writes_things_and_edges() {
        let (mut graphs, person) = schema_with_person();
        let alice = graphs.create_thing(&person).unwrap();
        let bob = graphs.create_thing(&person).unwrap();
        graphs
            .things()
            .outs(&alice)
            .unwrap()
            .add(ThingEdgeSchema::Playing, &bob)
            .unwrap();

        let storage = Arc::clone(&graphs.storage);
        let summary = graphs.commit().unwrap();
        assert_eq!(summary.things, 2);
        assert_eq!(summary.thing_edges, 1);
        assert_eq!(summary.types, 6);
        assert_eq!(summary.type_edges, 3);
        assert!(storage.contains(alice.as_bytes()).unwrap());
    }

    #[test]
    fn data_write_cannot_touch_schema() {
        let mut graphs = graphs(Access::DataWrite);
        assert!(matches!(
            graphs.initialise(),
            Err(GraphError::SchemaWriteRequired)
        ));
        let mut read = self::graphs(Access::Read);
        let ghost = keys::type_iid(TypeSchema::EntityType, [0, 9]);
        assert!(matches!(
            read.create_thing(&ghost),
            Err(GraphError::ReadOnly)
        ));
    }
}
