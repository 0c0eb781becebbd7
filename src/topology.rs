//! Static neighbor topology.
//!
//! Each node is assigned its neighbor list exactly once, by a topology
//! update from the controller. Until then the table reads as unconfigured
//! and fan-out degrades to a no-op.

use parking_lot::RwLock;
use smallvec::SmallVec;

/// Cloned-out neighbor list. Fan-out sets are small in practice, so the
/// first eight ids live inline.
pub type NeighborList<I> = SmallVec<[I; 8]>;

/// This node's ordered list of gossip neighbors.
///
/// Set once at configuration time; a repeated set overwrites (last write
/// wins), which the protocol never exercises in practice. Reads clone the
/// list out so no caller ever iterates under the lock.
#[derive(Debug)]
pub struct TopologyTable<I> {
    neighbors: RwLock<Option<Vec<I>>>,
}

impl<I> Default for TopologyTable<I> {
    fn default() -> Self {
        Self {
            neighbors: RwLock::new(None),
        }
    }
}

impl<I: Clone + PartialEq> TopologyTable<I> {
    /// Create an unconfigured table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the neighbor list. Overwrites any previous list.
    pub fn set_neighbors(&self, neighbors: Vec<I>) {
        *self.neighbors.write() = Some(neighbors);
    }

    /// The current neighbor list, cloned out, in assignment order.
    ///
    /// Empty both before configuration and when the assigned list is empty;
    /// [`TopologyTable::is_configured`] distinguishes the two.
    pub fn neighbors(&self) -> NeighborList<I> {
        match self.neighbors.read().as_ref() {
            Some(list) => list.iter().cloned().collect(),
            None => NeighborList::new(),
        }
    }

    /// Whether a topology update has been applied, even an empty one.
    pub fn is_configured(&self) -> bool {
        self.neighbors.read().is_some()
    }

    /// Number of configured neighbors.
    pub fn len(&self) -> usize {
        self.neighbors.read().as_ref().map_or(0, Vec::len)
    }

    /// Whether the neighbor list is empty (unconfigured or assigned empty).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is one of this node's neighbors.
    pub fn contains(&self, id: &I) -> bool {
        self.neighbors
            .read()
            .as_ref()
            .is_some_and(|list| list.contains(id))
    }
}
