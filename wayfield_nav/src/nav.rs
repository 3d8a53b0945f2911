// Navigation mesh: sampled surface nodes plus their adjacency.
//
// A `NavMesh` is a sparse, irregular grid of `SpatialNode`s produced by
// `MeshBuilder`. Nodes live in a dense `Vec` indexed by `NavNodeId`, with an
// `FxHashMap<NodeKey, NavNodeId>` for exact position lookup. Adjacency is a
// per-node `SmallVec` of neighbour ids in ascending id order; it is `None`
// until the builder computes it, and any node insertion or removal drops it
// again, since the "within radius" relation must be recomputed.
//
// Once wrapped in `Arc` and handed to search threads the mesh is read-only.
//
// Persistence goes through `PersistedNavMesh`, a flat list-based schema
// (`nodes[]`, `adjacency[{node_index, neighbour_indices}]`) that is what the
// repository writes as JSON or bincode. Loading rebuilds the key index and
// validates every adjacency reference.
//
// See also: `builder.rs` which populates meshes, `pathfinding.rs` and
// `jps.rs` which search them, `repository.rs` which stores them.

use crate::error::{NavError, NavResult, SearchError};
use crate::types::{NavNodeId, NodeKey, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Neighbour list. Eight fits a full ring on a flat grid without spilling.
pub type Neighbours = SmallVec<[NavNodeId; 8]>;

/// A sampled surface point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialNode {
    pub position: Vec3,
    pub is_walkable: bool,
    /// Vertical clearance above the surface, clamped to the mesh's
    /// `[min_cell_height, max_cell_height]`.
    pub height: f32,
    /// Accumulated point-light contribution. Never negative.
    pub illumination: f32,
}

impl SpatialNode {
    pub fn new(position: Vec3, is_walkable: bool, height: f32) -> Self {
        Self {
            position,
            is_walkable,
            height,
            illumination: 0.0,
        }
    }
}

/// A navigable graph for one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "PersistedNavMesh", try_from = "PersistedNavMesh")]
pub struct NavMesh {
    pub name: String,
    pub cell_size: f32,
    pub min_cell_height: f32,
    pub max_cell_height: f32,
    pub origin: Vec3,
    nodes: Vec<SpatialNode>,
    index: FxHashMap<NodeKey, NavNodeId>,
    adjacency: Option<Vec<Neighbours>>,
}

impl NavMesh {
    pub fn new(name: &str, cell_size: f32, min_cell_height: f32, max_cell_height: f32) -> Self {
        Self {
            name: name.to_string(),
            cell_size,
            min_cell_height,
            max_cell_height,
            origin: Vec3::ZERO,
            nodes: Vec::new(),
            index: FxHashMap::default(),
            adjacency: None,
        }
    }

    /// Insert a node. Returns `None` (and leaves the mesh unchanged) if a
    /// node already occupies the same position key.
    pub fn add_node(&mut self, node: SpatialNode) -> Option<NavNodeId> {
        let key = node.position.key();
        if self.index.contains_key(&key) {
            return None;
        }
        let id = NavNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.index.insert(key, id);
        self.adjacency = None;
        Some(id)
    }

    pub fn node(&self, id: NavNodeId) -> &SpatialNode {
        &self.nodes[id.index()]
    }

    /// Mutable access to node attributes. Position must not change through
    /// this, or the key index goes stale.
    pub(crate) fn node_mut(&mut self, id: NavNodeId) -> &mut SpatialNode {
        &mut self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[SpatialNode] {
        &self.nodes
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NavNodeId> + '_ {
        (0..self.nodes.len() as u32).map(NavNodeId)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn walkable_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_walkable).count()
    }

    /// Node at exactly this position (within `POSITION_TOLERANCE`). Never
    /// matches a non-finite position.
    pub fn find_exact(&self, position: Vec3) -> Option<NavNodeId> {
        if !position.is_finite() {
            return None;
        }
        self.index.get(&position.key()).copied()
    }

    /// Closest node by Euclidean distance. Ties go to the lowest id.
    /// `None` for an empty mesh or a non-finite position.
    pub fn find_nearest(&self, position: Vec3) -> Option<NavNodeId> {
        if !position.is_finite() {
            return None;
        }
        let mut best: Option<(NavNodeId, f32)> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            let d = node.position.distance(position);
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((NavNodeId(i as u32), d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Exact lookup, falling back to the nearest node. `NotFound` for an
    /// empty mesh or a non-finite position.
    pub fn resolve(&self, position: Vec3) -> Result<NavNodeId, SearchError> {
        self.find_exact(position)
            .or_else(|| self.find_nearest(position))
            .ok_or(SearchError::NotFound)
    }

    /// All nodes within `radius` (inclusive) of `position`, in id order.
    pub fn nodes_within(&self, position: Vec3, radius: f32) -> Vec<NavNodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.position.distance(position) <= radius)
            .map(|(i, _)| NavNodeId(i as u32))
            .collect()
    }

    pub fn has_adjacency(&self) -> bool {
        self.adjacency.is_some()
    }

    /// Install a computed adjacency. Must have one entry per node.
    pub(crate) fn set_adjacency(&mut self, adjacency: Vec<Neighbours>) {
        debug_assert_eq!(adjacency.len(), self.nodes.len());
        self.adjacency = Some(adjacency);
    }

    /// Stored neighbour list, unfiltered.
    ///
    /// Panics if adjacency has not been computed. Search entry points check
    /// `has_adjacency()` first.
    pub fn neighbours(&self, id: NavNodeId) -> &[NavNodeId] {
        let adjacency = self
            .adjacency
            .as_ref()
            .unwrap_or_else(|| panic!("adjacency queried on mesh {:?} before build", self.name));
        &adjacency[id.index()]
    }

    /// Neighbours of `id`, optionally skipping non-walkable ones. The filter
    /// applies to this call only.
    pub fn neighbours_of(&self, id: NavNodeId, ignore_unwalkable: bool) -> Vec<NavNodeId> {
        self.neighbours(id)
            .iter()
            .copied()
            .filter(|&nb| !ignore_unwalkable || self.nodes[nb.index()].is_walkable)
            .collect()
    }

    pub fn neighbour_count(&self, id: NavNodeId) -> usize {
        self.neighbours(id).len()
    }

    /// Keep only nodes for which `keep` returns true. Surviving nodes are
    /// renumbered densely in their original order. Returns the number removed.
    pub fn retain_nodes(&mut self, mut keep: impl FnMut(NavNodeId, &SpatialNode) -> bool) -> usize {
        let before = self.nodes.len();
        let old = std::mem::take(&mut self.nodes);
        self.index.clear();
        for (i, node) in old.into_iter().enumerate() {
            if keep(NavNodeId(i as u32), &node) {
                let id = NavNodeId(self.nodes.len() as u32);
                self.index.insert(node.position.key(), id);
                self.nodes.push(node);
            }
        }
        let removed = before - self.nodes.len();
        if removed > 0 {
            self.adjacency = None;
        }
        removed
    }

    /// Verify the structural invariants: unique keys, index consistent with
    /// the node list, and every adjacency entry refers to an existing node
    /// other than itself, in ascending order.
    pub fn check_integrity(&self) -> NavResult<()> {
        if self.index.len() != self.nodes.len() {
            return Err(NavError::config(format!(
                "mesh {:?}: {} nodes but {} distinct position keys",
                self.name,
                self.nodes.len(),
                self.index.len()
            )));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.index.get(&node.position.key()) != Some(&NavNodeId(i as u32)) {
                return Err(NavError::config(format!(
                    "mesh {:?}: index does not map node {i}",
                    self.name
                )));
            }
            if node.illumination.is_nan() || node.illumination < 0.0 {
                return Err(NavError::config(format!(
                    "mesh {:?}: node {i} has illumination {}",
                    self.name, node.illumination
                )));
            }
        }
        let Some(adjacency) = &self.adjacency else {
            return Ok(());
        };
        if adjacency.len() != self.nodes.len() {
            return Err(NavError::config(format!(
                "mesh {:?}: adjacency has {} entries for {} nodes",
                self.name,
                adjacency.len(),
                self.nodes.len()
            )));
        }
        for (i, list) in adjacency.iter().enumerate() {
            for (j, nb) in list.iter().enumerate() {
                if nb.index() >= self.nodes.len() || nb.index() == i {
                    return Err(NavError::config(format!(
                        "mesh {:?}: node {i} has invalid neighbour {}",
                        self.name, nb.0
                    )));
                }
                if j > 0 && list[j - 1] >= *nb {
                    return Err(NavError::config(format!(
                        "mesh {:?}: neighbours of node {i} are not strictly ascending",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persistence schema
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedNode {
    pub position: Vec3,
    pub is_walkable: bool,
    pub height: f32,
    pub illumination: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedAdjacency {
    pub node_index: u32,
    pub neighbour_indices: Vec<u32>,
}

/// On-disk form of a `NavMesh`. `adjacency` is `None` when the mesh was
/// saved before adjacency was computed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedNavMesh {
    pub mesh_name: String,
    pub cell_size: f32,
    pub min_cell_height: f32,
    pub max_cell_height: f32,
    pub origin: Vec3,
    pub nodes: Vec<PersistedNode>,
    #[serde(default)]
    pub adjacency: Option<Vec<PersistedAdjacency>>,
}

impl From<NavMesh> for PersistedNavMesh {
    fn from(mesh: NavMesh) -> Self {
        let nodes = mesh
            .nodes
            .iter()
            .map(|n| PersistedNode {
                position: n.position,
                is_walkable: n.is_walkable,
                height: n.height,
                illumination: n.illumination,
            })
            .collect();
        let adjacency: Option<Vec<PersistedAdjacency>> = mesh.adjacency.as_ref().map(|lists| {
            lists
                .iter()
                .enumerate()
                .map(|(i, list)| PersistedAdjacency {
                    node_index: i as u32,
                    neighbour_indices: list.iter().map(|nb| nb.0).collect(),
                })
                .collect()
        });
        Self {
            mesh_name: mesh.name,
            cell_size: mesh.cell_size,
            min_cell_height: mesh.min_cell_height,
            max_cell_height: mesh.max_cell_height,
            origin: mesh.origin,
            nodes,
            adjacency,
        }
    }
}

impl TryFrom<PersistedNavMesh> for NavMesh {
    type Error = NavError;

    fn try_from(p: PersistedNavMesh) -> NavResult<Self> {
        let mut mesh = NavMesh::new(&p.mesh_name, p.cell_size, p.min_cell_height, p.max_cell_height);
        mesh.origin = p.origin;
        for n in &p.nodes {
            let node = SpatialNode {
                position: n.position,
                is_walkable: n.is_walkable,
                height: n.height,
                illumination: n.illumination,
            };
            if mesh.add_node(node).is_none() {
                return Err(NavError::config(format!(
                    "mesh {:?}: duplicate node at {}",
                    p.mesh_name, n.position
                )));
            }
        }

        if let Some(entries) = p.adjacency {
            let mut adjacency: Vec<Option<Neighbours>> = vec![None; p.nodes.len()];
            for entry in entries {
                let slot = adjacency
                    .get_mut(entry.node_index as usize)
                    .ok_or_else(|| {
                        NavError::config(format!(
                            "mesh {:?}: adjacency refers to missing node {}",
                            p.mesh_name, entry.node_index
                        ))
                    })?;
                if slot.is_some() {
                    return Err(NavError::config(format!(
                        "mesh {:?}: node {} listed twice in adjacency",
                        p.mesh_name, entry.node_index
                    )));
                }
                *slot = Some(entry.neighbour_indices.into_iter().map(NavNodeId).collect());
            }
            let complete: Option<Vec<Neighbours>> = adjacency.into_iter().collect();
            let adjacency = complete.ok_or_else(|| {
                NavError::config(format!(
                    "mesh {:?}: adjacency does not cover every node",
                    p.mesh_name
                ))
            })?;
            mesh.adjacency = Some(adjacency);
        }

        mesh.check_integrity()?;
        Ok(mesh)
    }
}
