//! Read/write contracts the engine requires from the surrounding store.
//! Ordering, indexing, and transactions are the store's own concern.

use chrono::{DateTime, Utc};
use knowledge_graph_schemas::{Connection, Node, NodeId};

use crate::error::Result;

// `Send` only: the SQLite connection behind the default store is not `Sync`.
// Shared access goes through a mutex.
pub trait NodeStore: Send {
    /// Up to `limit` nodes created strictly after `cutoff`, excluding
    /// `exclude` itself. No ordering is promised.
    fn find_created_after(
        &self,
        cutoff: DateTime<Utc>,
        exclude: &NodeId,
        limit: usize,
    ) -> Result<Vec<Node>>;

    fn find_by_id(&self, id: &NodeId) -> Result<Option<Node>>;

    /// Insert or replace. Reinforcement re-saves existing nodes.
    fn save_nodes(&mut self, nodes: &[Node]) -> Result<()>;
}

pub trait ConnectionStore: Send {
    fn save_batch(&mut self, connections: &[Connection]) -> Result<()>;

    /// Every connection record touching the node, either direction. Used to
    /// derive activity state on demand.
    fn connections_for(&self, node_id: &NodeId) -> Result<Vec<Connection>>;
}

/// Convenience supertrait so the engine can hold one boxed store that serves
/// both contracts.
pub trait GraphStore: NodeStore + ConnectionStore {}

impl<T: NodeStore + ConnectionStore> GraphStore for T {}
