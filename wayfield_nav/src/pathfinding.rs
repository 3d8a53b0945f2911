// Path search over a nav mesh.
//
// One contract, `PathFinder::find_path(mesh, start, goal, budget)`, with two
// algorithms: `AStarSearch` here and `JumpPointSearch` in `jps.rs`. The
// closed `PathAlgorithm` enum picks one from configuration and implements
// `PathFinder` itself by dispatching to the chosen variant.
//
// The open set is a `BinaryHeap` turned into a min-heap by reversing `Ord`.
// Ties on `f` go to the entry pushed first (a per-search insertion counter),
// so results are deterministic for a given mesh.
//
// Scoring keeps the established behaviour of this engine: `g` is the cost of
// the single edge from the current node to the neighbour, not the
// accumulated cost from the start, and a node is opened at most once. This
// makes the search greedy (paths are not guaranteed shortest) and is kept
// deliberately; see DESIGN.md.
//
// `SearchBudget` carries the soft deadline and the cancellation flag. Both
// are checked once per expansion, never mid-expansion.
//
// See also: `nav.rs` for the mesh being searched, `jps.rs` for the
// jump-point variant, `worker.rs` which runs searches off-thread.

use crate::error::SearchError;
use crate::jps::JumpPointSearch;
use crate::nav::NavMesh;
use crate::types::{NavNodeId, Vec3};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

/// The search algorithms a caller can select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathAlgorithm {
    #[default]
    AStar,
    JumpPoint,
}

/// A successful search result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    /// Node ids from start to goal, both inclusive.
    pub nodes: Vec<NavNodeId>,
    /// Nodes expanded (closed) during the search.
    pub expanded: usize,
}

impl Path {
    pub fn positions(&self, mesh: &NavMesh) -> Vec<Vec3> {
        self.nodes.iter().map(|&id| mesh.node(id).position).collect()
    }

    /// Sum of straight-line segment lengths.
    pub fn length(&self, mesh: &NavMesh) -> f32 {
        self.nodes
            .windows(2)
            .map(|w| cost(mesh, w[0], w[1]))
            .sum()
    }
}

/// Time and cancellation limits for one search.
#[derive(Clone, Debug, Default)]
pub struct SearchBudget {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchBudget {
    /// No deadline, no cancellation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now; `None` means no deadline.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            cancel: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Called once per expansion.
    pub fn check(&self) -> Result<(), SearchError> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(AtomicOrdering::Relaxed))
        {
            return Err(SearchError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SearchError::SearchTimedOut);
        }
        Ok(())
    }
}

/// The search contract shared by every algorithm.
pub trait PathFinder {
    fn find_path(
        &self,
        mesh: &NavMesh,
        start: NavNodeId,
        goal: NavNodeId,
        budget: &SearchBudget,
    ) -> Result<Path, SearchError>;
}

impl PathFinder for PathAlgorithm {
    fn find_path(
        &self,
        mesh: &NavMesh,
        start: NavNodeId,
        goal: NavNodeId,
        budget: &SearchBudget,
    ) -> Result<Path, SearchError> {
        match self {
            PathAlgorithm::AStar => AStarSearch.find_path(mesh, start, goal, budget),
            PathAlgorithm::JumpPoint => JumpPointSearch.find_path(mesh, start, goal, budget),
        }
    }
}

/// Resolve both positions to nodes and search between them. Returns the
/// path as world positions.
pub fn find_path_between(
    mesh: &NavMesh,
    from: Vec3,
    to: Vec3,
    finder: &impl PathFinder,
    budget: &SearchBudget,
) -> Result<Vec<Vec3>, SearchError> {
    let start = mesh.resolve(from)?;
    let goal = mesh.resolve(to)?;
    let path = finder.find_path(mesh, start, goal, budget)?;
    Ok(path.positions(mesh))
}

/// Euclidean distance between two nodes.
pub(crate) fn cost(mesh: &NavMesh, a: NavNodeId, b: NavNodeId) -> f32 {
    mesh.node(a).position.distance(mesh.node(b).position)
}

// ---------------------------------------------------------------------------
// Open set
// ---------------------------------------------------------------------------

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NavNodeId,
    f_score: f32,
    seq: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest", then the
        // earliest insertion.
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Open set plus the per-node bookkeeping both algorithms share.
pub(crate) struct SearchState {
    open: BinaryHeap<OpenEntry>,
    next_seq: u64,
    pub(crate) opened: Vec<bool>,
    pub(crate) closed: Vec<bool>,
    pub(crate) expanded: usize,
}

impl SearchState {
    pub(crate) fn new(node_count: usize) -> Self {
        Self {
            open: BinaryHeap::new(),
            next_seq: 0,
            opened: vec![false; node_count],
            closed: vec![false; node_count],
            expanded: 0,
        }
    }

    pub(crate) fn push(&mut self, node: NavNodeId, f_score: f32) {
        self.opened[node.index()] = true;
        self.open.push(OpenEntry {
            node,
            f_score,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<NavNodeId> {
        self.open.pop().map(|e| e.node)
    }

    pub(crate) fn close(&mut self, node: NavNodeId) {
        self.closed[node.index()] = true;
        self.expanded += 1;
    }

    /// Walkable and never opened (a closed node was opened first).
    pub(crate) fn is_fresh(&self, mesh: &NavMesh, node: NavNodeId) -> bool {
        mesh.node(node).is_walkable && !self.opened[node.index()]
    }
}

/// Common preconditions. `Ok(Some(path))` short-circuits a trivial search.
pub(crate) fn precheck(
    mesh: &NavMesh,
    start: NavNodeId,
    goal: NavNodeId,
) -> Result<Option<Path>, SearchError> {
    if !mesh.has_adjacency() {
        return Err(SearchError::MeshNotBuilt);
    }
    if start.index() >= mesh.node_count() || goal.index() >= mesh.node_count() {
        return Err(SearchError::NotFound);
    }
    if start == goal {
        return Ok(Some(Path {
            nodes: vec![start],
            expanded: 0,
        }));
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// A*
// ---------------------------------------------------------------------------

/// Best-first search over the full neighbour sets.
#[derive(Clone, Copy, Debug, Default)]
pub struct AStarSearch;

impl PathFinder for AStarSearch {
    fn find_path(
        &self,
        mesh: &NavMesh,
        start: NavNodeId,
        goal: NavNodeId,
        budget: &SearchBudget,
    ) -> Result<Path, SearchError> {
        if let Some(path) = precheck(mesh, start, goal)? {
            return Ok(path);
        }

        let mut state = SearchState::new(mesh.node_count());
        let mut came_from: Vec<Option<NavNodeId>> = vec![None; mesh.node_count()];
        state.push(start, cost(mesh, start, goal));

        while let Some(current) = state.pop() {
            budget.check()?;
            if current == goal {
                let nodes = reconstruct_path(&came_from, start, goal);
                return Ok(Path {
                    nodes,
                    expanded: state.expanded,
                });
            }
            if state.closed[current.index()] {
                continue;
            }
            state.close(current);

            for &neighbour in mesh.neighbours(current) {
                if !state.is_fresh(mesh, neighbour) {
                    continue;
                }
                let g = cost(mesh, current, neighbour);
                let h = cost(mesh, neighbour, goal);
                came_from[neighbour.index()] = Some(current);
                state.push(neighbour, g + h);
            }
        }

        Err(SearchError::NoPathFound)
    }
}

/// Follow predecessor links back from `goal`.
fn reconstruct_path(
    came_from: &[Option<NavNodeId>],
    start: NavNodeId,
    goal: NavNodeId,
) -> Vec<NavNodeId> {
    let mut nodes = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from[current.index()] {
            Some(prev) => {
                nodes.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    nodes.reverse();
    nodes
}
