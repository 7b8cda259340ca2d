//! # Adjacency
//!
//! Buffered edges live in an arena owned by their graph and are referenced by
//! `EdgeId`. Each endpoint indexes them per direction and per schema, so an
//! edge is registered at both ends and removed from both ends at once.
//!
//! `DirectedEdges` is the view of one vertex in one direction. For a
//! persisted vertex it merges the buffered edges with a lazy prefix scan of
//! storage.

use super::edge::Edge;
use crate::encoding::EdgeSchema;
use crate::encoding::keys;
use crate::iterator::{VertexIter, link};
use crate::storage::Storage;
use crate::types::{Direction, GraphError, Iid, Status};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Index of a buffered edge in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(usize);

/// owner -> schema -> adjacent -> edge
type Index<S> = BTreeMap<Iid, BTreeMap<S, BTreeMap<Iid, EdgeId>>>;

/// Arena of buffered edges with per-endpoint indexes.
#[derive(Debug)]
pub struct Adjacency<S> {
    edges: Vec<Option<Edge<S>>>,
    outs: Index<S>,
    ins: Index<S>,
}

impl<S> Default for Adjacency<S> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            outs: BTreeMap::new(),
            ins: BTreeMap::new(),
        }
    }
}

impl<S: EdgeSchema> Adjacency<S> {
    fn index(&self, direction: Direction) -> &Index<S> {
        match direction {
            Direction::Out => &self.outs,
            Direction::In => &self.ins,
        }
    }

    /// Register an edge at both endpoints.
    pub fn insert(&mut self, edge: Edge<S>) -> EdgeId {
        let id = EdgeId(self.edges.len());
        let schema = edge.schema();
        self.outs
            .entry(edge.from().clone())
            .or_default()
            .entry(schema)
            .or_default()
            .insert(edge.to().clone(), id);
        self.ins
            .entry(edge.to().clone())
            .or_default()
            .entry(schema)
            .or_default()
            .insert(edge.from().clone(), id);
        self.edges.push(Some(edge));
        id
    }

    /// Unregister an edge from both endpoints and take it out of the arena.
    pub fn remove(&mut self, id: EdgeId) -> Option<Edge<S>> {
        let edge = self.edges.get_mut(id.0)?.take()?;
        unlink(&mut self.outs, edge.from(), edge.schema(), edge.to());
        unlink(&mut self.ins, edge.to(), edge.schema(), edge.from());
        Some(edge)
    }

    #[must_use]
    pub fn get(&self, id: EdgeId) -> Option<&Edge<S>> {
        self.edges.get(id.0)?.as_ref()
    }

    /// The buffered edge between `owner` and `adjacent`, seen from `owner`.
    #[must_use]
    pub fn find(
        &self,
        owner: &Iid,
        direction: Direction,
        schema: S,
        adjacent: &Iid,
    ) -> Option<EdgeId> {
        self.index(direction)
            .get(owner)?
            .get(&schema)?
            .get(adjacent)
            .copied()
    }

    /// Snapshot of the adjacent vertices of `owner` in one direction.
    #[must_use]
    pub fn adjacent(&self, owner: &Iid, direction: Direction, schema: S) -> Vec<Iid> {
        self.index(direction)
            .get(owner)
            .and_then(|schemas| schemas.get(&schema))
            .map(|adjacent| adjacent.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Edges of one schema at `owner` in one direction.
    #[must_use]
    pub fn ids(&self, owner: &Iid, direction: Direction, schema: S) -> Vec<EdgeId> {
        self.index(direction)
            .get(owner)
            .and_then(|schemas| schemas.get(&schema))
            .map(|adjacent| adjacent.values().copied().collect())
            .unwrap_or_default()
    }

    /// Every edge touching `owner`, either direction, any schema.
    #[must_use]
    pub fn incident(&self, owner: &Iid) -> BTreeSet<EdgeId> {
        [&self.outs, &self.ins]
            .into_iter()
            .filter_map(|index| index.get(owner))
            .flat_map(|schemas| schemas.values())
            .flat_map(|adjacent| adjacent.values().copied())
            .collect()
    }

    /// Number of live buffered edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every live edge out of the arena, in creation order.
    pub fn drain(&mut self) -> Vec<Edge<S>> {
        self.outs.clear();
        self.ins.clear();
        self.edges.drain(..).flatten().collect()
    }
}

fn unlink<S: EdgeSchema>(index: &mut Index<S>, owner: &Iid, schema: S, adjacent: &Iid) {
    if let Some(schemas) = index.get_mut(owner) {
        if let Some(set) = schemas.get_mut(&schema) {
            set.remove(adjacent);
            if set.is_empty() {
                schemas.remove(&schema);
            }
        }
        if schemas.is_empty() {
            index.remove(owner);
        }
    }
}

// =============================================================================
// EDGE HOST
// =============================================================================

/// A graph that owns vertices of one kind and the buffered edges between them.
pub trait EdgeHost {
    type Schema: EdgeSchema;

    /// Length of every vertex IID in this graph.
    const IID_LENGTH: usize;

    fn storage(&self) -> &Arc<dyn Storage>;

    fn adjacency(&self) -> &Adjacency<Self::Schema>;

    fn adjacency_mut(&mut self) -> &mut Adjacency<Self::Schema>;

    /// Load the vertex into the graph if it exists and report its status.
    fn materialise(&mut self, iid: &Iid) -> Result<Option<Status>, GraphError>;

    /// Fail unless the transaction may mutate this graph.
    fn check_writable(&self) -> Result<(), GraphError>;
}

// =============================================================================
// DIRECTED EDGES
// =============================================================================

/// Edges of one vertex in one direction, grouped by schema.
pub struct DirectedEdges<'g, G: EdgeHost> {
    graph: &'g mut G,
    owner: Iid,
    owner_status: Status,
    direction: Direction,
}

impl<'g, G: EdgeHost> DirectedEdges<'g, G> {
    /// View of `owner`'s edges, or a structural violation if it does not exist.
    pub fn of(graph: &'g mut G, owner: &Iid, direction: Direction) -> Result<Self, GraphError> {
        let owner_status = graph
            .materialise(owner)?
            .ok_or_else(|| GraphError::structural(format!("vertex {} does not exist", owner)))?;
        Ok(Self {
            graph,
            owner: owner.clone(),
            owner_status,
            direction,
        })
    }

    #[must_use]
    pub fn owner(&self) -> &Iid {
        &self.owner
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn orient(&self, adjacent: &Iid) -> (Iid, Iid) {
        match self.direction {
            Direction::Out => (self.owner.clone(), adjacent.clone()),
            Direction::In => (adjacent.clone(), self.owner.clone()),
        }
    }

    fn stored_key(&self, schema: G::Schema, adjacent: &Iid) -> Vec<u8> {
        keys::edge_key(&self.owner, schema.infix(self.direction), adjacent)
    }

    /// Add an edge to `adjacent`. Adding an existing edge does nothing.
    ///
    /// Between two persisted vertices the edge is written to the
    /// transaction's storage at once; otherwise it stays buffered until the
    /// graph commits.
    pub fn add(&mut self, schema: G::Schema, adjacent: &Iid) -> Result<(), GraphError> {
        self.graph.check_writable()?;
        let adjacent_status = self.graph.materialise(adjacent)?.ok_or_else(|| {
            GraphError::structural(format!("vertex {} does not exist", adjacent))
        })?;
        if self.contains(schema, adjacent)? {
            return Ok(());
        }
        let (from, to) = self.orient(adjacent);
        if self.owner_status == Status::Persisted && adjacent_status == Status::Persisted {
            let mut edge = Edge::buffered(schema, from, to);
            edge.commit(self.graph.storage().as_ref())?;
        } else {
            tracing::trace!(%from, %to, schema = schema.name(), "edge buffered");
            self.graph
                .adjacency_mut()
                .insert(Edge::buffered(schema, from, to));
        }
        Ok(())
    }

    /// Whether an edge of `schema` to `adjacent` exists.
    pub fn contains(&self, schema: G::Schema, adjacent: &Iid) -> Result<bool, GraphError> {
        if self
            .graph
            .adjacency()
            .find(&self.owner, self.direction, schema, adjacent)
            .is_some()
        {
            return Ok(true);
        }
        if self.owner_status == Status::Buffered {
            return Ok(false);
        }
        self.graph
            .storage()
            .contains(&self.stored_key(schema, adjacent))
    }

    /// Lazy sequence of adjacent vertices over `schema`.
    ///
    /// Buffered edges come first, from a snapshot taken now; stored edges
    /// follow as the scan proceeds, skipping any already yielded.
    pub fn get(&self, schema: G::Schema) -> Result<VertexIter<'static>, GraphError> {
        let buffered = self
            .graph
            .adjacency()
            .adjacent(&self.owner, self.direction, schema);
        if self.owner_status == Status::Buffered {
            return Ok(Box::new(buffered.into_iter().map(Ok::<Iid, GraphError>)));
        }

        let seen: BTreeSet<Iid> = buffered.iter().cloned().collect();
        let direction = self.direction;
        let scan = self
            .graph
            .storage()
            .iterate(&keys::edge_prefix(&self.owner, schema.infix(direction)))?;
        let stored = scan
            .map(move |entry| {
                let (key, _) = entry?;
                let edge = Edge::<G::Schema>::decode(&key, G::IID_LENGTH)?;
                Ok(edge.adjacent(direction).clone())
            })
            .filter(move |adjacent: &Result<Iid, GraphError>| match adjacent {
                Ok(iid) => !seen.contains(iid),
                Err(_) => true,
            });
        Ok(Box::new(link(buffered.into_iter().map(Ok::<Iid, GraphError>), stored)))
    }

    /// Delete the edge of `schema` to `adjacent`, if there is one.
    pub fn remove(&mut self, schema: G::Schema, adjacent: &Iid) -> Result<bool, GraphError> {
        self.graph.check_writable()?;
        if let Some(id) = self
            .graph
            .adjacency()
            .find(&self.owner, self.direction, schema, adjacent)
        {
            self.graph.adjacency_mut().remove(id);
            return Ok(true);
        }
        if self.owner_status == Status::Buffered
            || !self
                .graph
                .storage()
                .contains(&self.stored_key(schema, adjacent))?
        {
            return Ok(false);
        }
        let (from, to) = self.orient(adjacent);
        Edge::persisted(schema, from, to).delete(self.graph.storage().as_ref())?;
        Ok(true)
    }

    /// Delete every edge of `schema` in this direction. Returns how many.
    pub fn remove_all(&mut self, schema: G::Schema) -> Result<usize, GraphError> {
        self.graph.check_writable()?;
        let mut removed = 0;
        for id in self
            .graph
            .adjacency()
            .ids(&self.owner, self.direction, schema)
        {
            if self.graph.adjacency_mut().remove(id).is_some() {
                removed += 1;
            }
        }
        if self.owner_status == Status::Persisted {
            removed += delete_stored(
                self.graph.storage().as_ref(),
                &self.owner,
                schema,
                self.direction,
                G::IID_LENGTH,
            )?;
        }
        Ok(removed)
    }
}

/// Delete every stored edge of `schema` at `owner` in `direction`.
///
/// The scan works on its own copy of the pending writes, so deleting while
/// streaming is safe.
pub(crate) fn delete_stored<S: EdgeSchema>(
    storage: &dyn Storage,
    owner: &Iid,
    schema: S,
    direction: Direction,
    iid_length: usize,
) -> Result<usize, GraphError> {
    let mut removed = 0;
    for entry in storage.iterate(&keys::edge_prefix(owner, schema.infix(direction)))? {
        let (key, _) = entry?;
        Edge::<S>::decode(&key, iid_length)?.delete(storage)?;
        removed += 1;
    }
    Ok(removed)
}

/// Remove every buffered and stored edge touching `owner`.
pub(crate) fn purge<G: EdgeHost>(graph: &mut G, owner: &Iid, status: Status) -> Result<usize, GraphError> {
    let mut removed = 0;
    for id in graph.adjacency().incident(owner) {
        if graph.adjacency_mut().remove(id).is_some() {
            removed += 1;
        }
    }
    if status == Status::Persisted {
        for schema in G::Schema::ALL {
            for direction in [Direction::Out, Direction::In] {
                removed += delete_stored(
                    graph.storage().as_ref(),
                    owner,
                    *schema,
                    direction,
                    G::IID_LENGTH,
                )?;
            }
        }
    }
    Ok(removed)
}

// =============================================================================
// TESTS
// =============================================================================
