//! # Thing Graph
//!
//! The data half of a transaction's graph: instances and the edges between
//! them. Any write transaction may mutate it.

use super::adjacency::{Adjacency, DirectedEdges, EdgeHost, purge};
use super::key_generator::KeyGenerator;
use super::thing_vertex::ThingVertex;
use crate::encoding::keys;
use crate::encoding::{ThingEdgeSchema, ThingSchema, Value};
use crate::primitives::THING_IID_LENGTH;
use crate::storage::Storage;
use crate::types::{Access, Direction, GraphError, Iid, Status};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thing vertices of one transaction.
pub struct ThingGraph {
    storage: Arc<dyn Storage>,
    key_generator: Arc<KeyGenerator>,
    access: Access,
    vertices: BTreeMap<Iid, ThingVertex>,
    adjacency: Adjacency<ThingEdgeSchema>,
}

impl std::fmt::Debug for ThingGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingGraph")
            .field("access", &self.access)
            .field("cached_vertices", &self.vertices.len())
            .field("buffered_edges", &self.adjacency.len())
            .finish_non_exhaustive()
    }
}

impl ThingGraph {
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
            adjacency: Adjacency::default(),
        }
    }

    /// Create a buffered thing of `type_iid`.
    ///
    /// Only checks that the IID can be formed; the type itself is validated
    /// by the caller, which can see the type graph.
    pub(crate) fn insert(
        &mut self,
        schema: ThingSchema,
        type_iid: &Iid,
        value: Option<Value>,
    ) -> Result<Iid, GraphError> {
        self.check_writable()?;
        let iid = keys::thing_iid(schema, type_iid, self.key_generator.for_thing(type_iid)?)?;
        self.vertices.insert(
            iid.clone(),
            ThingVertex::buffered(Arc::clone(&self.storage), iid.clone(), schema, value),
        );
        tracing::trace!(%iid, schema = schema.name(), "thing created");
        Ok(iid)
    }

    /// The thing with this IID, if it exists.
    pub fn get(&mut self, iid: &Iid) -> Result<Option<&ThingVertex>, GraphError> {
        self.materialise(iid)?;
        Ok(self.vertices.get(iid))
    }

    pub fn outs(&mut self, iid: &Iid) -> Result<DirectedEdges<'_, Self>, GraphError> {
        DirectedEdges::of(self, iid, Direction::Out)
    }

    pub fn ins(&mut self, iid: &Iid) -> Result<DirectedEdges<'_, Self>, GraphError> {
        DirectedEdges::of(self, iid, Direction::In)
    }

    /// Delete a thing and every edge touching it.
    pub fn delete(&mut self, iid: &Iid) -> Result<bool, GraphError> {
        self.check_writable()?;
        let Some(status) = self.materialise(iid)? else {
            return Ok(false);
        };
        let edges = purge(self, iid, status)?;
        if let Some(vertex) = self.vertices.remove(iid) {
            vertex.delete()?;
        }
        tracing::trace!(%iid, edges, "thing deleted");
        Ok(true)
    }

    /// Number of buffered things.
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.vertices
            .values()
            .filter(|vertex| vertex.status() == Status::Buffered)
            .count()
    }

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
        Ok((vertices, edges.len()))
    }
}

impl EdgeHost for ThingGraph {
    type Schema = ThingEdgeSchema;

    const IID_LENGTH: usize = THING_IID_LENGTH;

    fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn adjacency(&self) -> &Adjacency<ThingEdgeSchema> {
        &self.adjacency
    }

    fn adjacency_mut(&mut self) -> &mut Adjacency<ThingEdgeSchema> {
        &mut self.adjacency
    }

    fn materialise(&mut self, iid: &Iid) -> Result<Option<Status>, GraphError> {
        if let Some(vertex) = self.vertices.get(iid) {
            return Ok(Some(vertex.status()));
        }
        let schema = keys::validate_thing_iid(iid)?;
        if !self.storage.contains(iid.as_bytes())? {
            return Ok(None);
        }
        self.vertices.insert(
            iid.clone(),
            ThingVertex::persisted(Arc::clone(&self.storage), iid.clone(), schema),
        );
        Ok(Some(Status::Persisted))
    }

    fn check_writable(&self) -> Result<(), GraphError> {
        if !self.access.can_write_data() {
            return Err(GraphError::ReadOnly);
        }
        Ok(())
    }
}
