// Jump point search over a nav mesh.
//
// A grid-pruning variant of the A* in `pathfinding.rs`. Rather than opening
// every neighbour, each expanded node keeps only its "natural" neighbours and
// then jumps along each surviving direction until something interesting
// happens. Only the far end of a jump (a jump point) enters the open set, so
// long open corridors cost one expansion instead of one per cell.
//
// The mesh is an irregular sampled grid, not a bitmap, so directions are
// horizontal cell offsets `(dx, dz)` with each component in {-1, 0, 1}, and
// a step follows whichever neighbour sits one cell over in that direction
// (preferring the smallest height change, so jumps follow slopes and
// stairs). Missing cells count as blocked.
//
// Pruning compares whole-cell step counts (`steps`, the Euclidean distance
// rounded to cells). A walkable neighbour is dropped when going straight to
// the goal is no worse than going via that neighbour: `<=` for diagonal
// moves, `<` for straight ones. Unwalkable neighbours are never pruned;
// their jump fails on the first step.
//
// A node whose jumps open nothing new falls back to opening its walkable
// neighbours directly. Nodes that did open jump points are remembered, and
// if the open set runs dry their skipped neighbours are opened before the
// search gives up, so this search fails only where A* would.
//
// Scoring matches A*: `f = cost(current, successor) + cost(successor, goal)`.
// The returned path is expanded back to consecutive cells. Jumps pass over
// cells without opening them, so two jump segments can cover the same cells;
// the expansion cuts such loops out, and a returned path never repeats a node.

use crate::error::SearchError;
use crate::nav::NavMesh;
use crate::pathfinding::{Path, PathFinder, SearchBudget, SearchState, cost, precheck};
use crate::types::NavNodeId;

/// Horizontal direction in cells.
type Dir = (i32, i32);

/// How far (in cells) a neighbour's offset may deviate from an exact grid
/// step and still count as that step.
const STEP_TOLERANCE: f32 = 0.25;

#[derive(Clone, Copy, Debug, Default)]
pub struct JumpPointSearch;

impl PathFinder for JumpPointSearch {
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
        // Predecessor and the jump direction that reached this node; `None`
        // for a single fallback step.
        let mut came_from: Vec<Option<(NavNodeId, Option<Dir>)>> = vec![None; mesh.node_count()];
        let mut deferred: Vec<NavNodeId> = Vec::new();
        state.push(start, cost(mesh, start, goal));

        loop {
            let Some(current) = state.pop() else {
                // Open set is dry: revisit neighbours skipped by pruning.
                let mut reopened = false;
                for node in std::mem::take(&mut deferred) {
                    reopened |= open_neighbours(mesh, &mut state, &mut came_from, node, goal);
                }
                if reopened {
                    continue;
                }
                return Err(SearchError::NoPathFound);
            };
            budget.check()?;
            if current == goal {
                let nodes = expand_path(mesh, &came_from, start, goal);
                return Ok(Path {
                    nodes,
                    expanded: state.expanded,
                });
            }
            if state.closed[current.index()] {
                continue;
            }
            state.close(current);

            let mut opened_any = false;
            for (jump_point, dir) in successors(mesh, current, goal, budget)? {
                if !state.is_fresh(mesh, jump_point) {
                    continue;
                }
                let f = cost(mesh, current, jump_point) + cost(mesh, jump_point, goal);
                came_from[jump_point.index()] = Some((current, Some(dir)));
                state.push(jump_point, f);
                opened_any = true;
            }
            if opened_any {
                deferred.push(current);
            } else {
                open_neighbours(mesh, &mut state, &mut came_from, current, goal);
            }
        }
    }
}

/// Open every walkable, unvisited neighbour of `node` as a single step.
fn open_neighbours(
    mesh: &NavMesh,
    state: &mut SearchState,
    came_from: &mut [Option<(NavNodeId, Option<Dir>)>],
    node: NavNodeId,
    goal: NavNodeId,
) -> bool {
    let mut opened = false;
    for &nb in mesh.neighbours(node) {
        if !state.is_fresh(mesh, nb) {
            continue;
        }
        let f = cost(mesh, node, nb) + cost(mesh, nb, goal);
        came_from[nb.index()] = Some((node, None));
        state.push(nb, f);
        opened = true;
    }
    opened
}

/// Jump points reachable from `node` along its natural directions.
fn successors(
    mesh: &NavMesh,
    node: NavNodeId,
    goal: NavNodeId,
    budget: &SearchBudget,
) -> Result<Vec<(NavNodeId, Dir)>, SearchError> {
    let mut tried: Vec<Dir> = Vec::with_capacity(8);
    let mut out = Vec::new();
    for &nb in mesh.neighbours(node) {
        let Some(dir) = direction(mesh, node, nb) else {
            continue;
        };
        if tried.contains(&dir) {
            continue;
        }
        tried.push(dir);
        if mesh.node(nb).is_walkable && is_pruned(mesh, node, nb, goal, is_diagonal(dir)) {
            continue;
        }
        if let Some(jump_point) = jump(mesh, node, dir, goal, budget)? {
            out.push((jump_point, dir));
        }
    }
    Ok(out)
}

/// Distance in whole cells.
fn steps(mesh: &NavMesh, a: NavNodeId, b: NavNodeId) -> i64 {
    (cost(mesh, a, b) / mesh.cell_size).round() as i64
}

fn is_pruned(mesh: &NavMesh, node: NavNodeId, nb: NavNodeId, goal: NavNodeId, diagonal: bool) -> bool {
    let direct = steps(mesh, node, goal);
    let via = steps(mesh, node, nb) + steps(mesh, nb, goal);
    if diagonal { direct <= via } else { direct < via }
}

fn is_diagonal((dx, dz): Dir) -> bool {
    dx != 0 && dz != 0
}

/// Horizontal cell direction from `a` to its neighbour `b`, or `None` if
/// `b` is directly above or below.
fn direction(mesh: &NavMesh, a: NavNodeId, b: NavNodeId) -> Option<Dir> {
    let offset = mesh.node(b).position - mesh.node(a).position;
    let dx = (offset.x / mesh.cell_size).round().clamp(-1.0, 1.0) as i32;
    let dz = (offset.z / mesh.cell_size).round().clamp(-1.0, 1.0) as i32;
    (dx != 0 || dz != 0).then_some((dx, dz))
}

/// The neighbour one cell over in `dir`, preferring the smallest height
/// change. Walkability is not checked.
fn step(mesh: &NavMesh, node: NavNodeId, (dx, dz): Dir) -> Option<NavNodeId> {
    let cs = mesh.cell_size;
    let from = mesh.node(node).position;
    let tolerance = STEP_TOLERANCE * cs;
    mesh.neighbours(node)
        .iter()
        .copied()
        .filter(|&nb| {
            let offset = mesh.node(nb).position - from;
            (offset.x - dx as f32 * cs).abs() <= tolerance
                && (offset.z - dz as f32 * cs).abs() <= tolerance
        })
        .min_by(|&a, &b| {
            let da = (mesh.node(a).position.y - from.y).abs();
            let db = (mesh.node(b).position.y - from.y).abs();
            da.total_cmp(&db)
        })
}

fn walkable_step(mesh: &NavMesh, node: NavNodeId, dir: Dir) -> Option<NavNodeId> {
    step(mesh, node, dir).filter(|&nb| mesh.node(nb).is_walkable)
}

/// Whether `node`, entered moving in `dir`, has a forced neighbour: a
/// blocked side cell whose forward diagonal is open, so an optimal path
/// may turn here.
fn has_forced_neighbour(mesh: &NavMesh, node: NavNodeId, (dx, dz): Dir) -> bool {
    let blocked = |dir: Dir| walkable_step(mesh, node, dir).is_none();
    let open = |dir: Dir| walkable_step(mesh, node, dir).is_some();
    if dx != 0 && dz != 0 {
        (blocked((-dx, 0)) && open((-dx, dz))) || (blocked((0, -dz)) && open((dx, -dz)))
    } else if dx != 0 {
        (blocked((0, 1)) && open((dx, 1))) || (blocked((0, -1)) && open((dx, -1)))
    } else {
        (blocked((1, 0)) && open((1, dz))) || (blocked((-1, 0)) && open((-1, dz)))
    }
}

/// Step from `from` in `dir` until the goal, a forced neighbour, or a
/// blocked cell. Bounded by the node count and by `budget`.
fn jump(
    mesh: &NavMesh,
    from: NavNodeId,
    dir: Dir,
    goal: NavNodeId,
    budget: &SearchBudget,
) -> Result<Option<NavNodeId>, SearchError> {
    let mut current = from;
    for _ in 0..mesh.node_count() {
        budget.check()?;
        let Some(next) = walkable_step(mesh, current, dir) else {
            return Ok(None);
        };
        if next == goal || has_forced_neighbour(mesh, next, dir) {
            return Ok(Some(next));
        }
        if is_diagonal(dir)
            && (straight_probe(mesh, next, (dir.0, 0), goal)
                || straight_probe(mesh, next, (0, dir.1), goal))
        {
            return Ok(Some(next));
        }
        current = next;
    }
    Ok(None)
}

/// Straight jump used by diagonal jumps: true if it would find a jump point.
fn straight_probe(mesh: &NavMesh, from: NavNodeId, dir: Dir, goal: NavNodeId) -> bool {
    let mut current = from;
    for _ in 0..mesh.node_count() {
        let Some(next) = walkable_step(mesh, current, dir) else {
            return false;
        };
        if next == goal || has_forced_neighbour(mesh, next, dir) {
            return true;
        }
        current = next;
    }
    false
}

/// Rebuild the jump-point chain and fill in the cells each jump skipped.
/// Revisiting a cell drops everything after its first visit.
fn expand_path(
    mesh: &NavMesh,
    came_from: &[Option<(NavNodeId, Option<Dir>)>],
    start: NavNodeId,
    goal: NavNodeId,
) -> Vec<NavNodeId> {
    let mut segments = Vec::new();
    let mut current = goal;
    while current != start {
        let Some((prev, dir)) = came_from[current.index()] else {
            break;
        };
        segments.push((prev, current, dir));
        current = prev;
    }
    segments.reverse();

    let mut nodes = Vec::new();
    let mut seen_at: Vec<Option<usize>> = vec![None; mesh.node_count()];
    visit(&mut nodes, &mut seen_at, start);
    for (from, to, dir) in segments {
        if let Some(dir) = dir {
            let mut cell = from;
            for _ in 0..mesh.node_count() {
                match walkable_step(mesh, cell, dir) {
                    Some(next) if next != to => {
                        visit(&mut nodes, &mut seen_at, next);
                        cell = next;
                    }
                    _ => break,
                }
            }
        }
        visit(&mut nodes, &mut seen_at, to);
    }
    nodes
}

/// Append `id`, or rewind the path to `id` if it is already on it.
fn visit(nodes: &mut Vec<NavNodeId>, seen_at: &mut [Option<usize>], id: NavNodeId) {
    match seen_at[id.index()] {
        Some(first) => {
            for dropped in nodes.drain(first + 1..) {
                seen_at[dropped.index()] = None;
            }
        }
        None => {
            seen_at[id.index()] = Some(nodes.len());
            nodes.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::AStarSearch;
    use crate::pathfinding::tests::{assert_connected, at, grid_mesh};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn assert_no_repeats(path: &Path) {
        let distinct: BTreeSet<_> = path.nodes.iter().collect();
        assert_eq!(distinct.len(), path.nodes.len(), "repeated node in {:?}", path.nodes);
    }

    #[test]
    fn expands_fewer_nodes_than_astar_on_open_grid() {
        let mesh = grid_mesh(5, 5, |_, _| false);
        let (start, goal) = (at(&mesh, 0, 0), at(&mesh, 4, 4));
        let budget = SearchBudget::unbounded();
        let jps = JumpPointSearch.find_path(&mesh, start, goal, &budget).unwrap();
        let astar = AStarSearch.find_path(&mesh, start, goal, &budget).unwrap();
        assert!(jps.expanded < astar.expanded);
        assert_eq!(jps.nodes, astar.nodes);
        assert_connected(&mesh, &jps);
    }

    #[test]
    fn long_corridor_is_one_jump() {
        let mesh = grid_mesh(20, 1, |_, _| false);
        let path = JumpPointSearch
            .find_path(&mesh, at(&mesh, 0, 0), at(&mesh, 19, 0), &SearchBudget::unbounded())
            .unwrap();
        assert_eq!(path.expanded, 1);
        assert_eq!(path.nodes.len(), 20);
        assert_connected(&mesh, &path);
    }

    #[test]
    fn finds_gap_in_wall() {
        let mesh = grid_mesh(7, 7, |x, z| x == 3 && z < 5);
        let (start, goal) = (at(&mesh, 0, 0), at(&mesh, 6, 0));
        let path = JumpPointSearch
            .find_path(&mesh, start, goal, &SearchBudget::unbounded())
            .unwrap();
        assert_eq!(path.nodes.first(), Some(&start));
        assert_eq!(path.nodes.last(), Some(&goal));
        assert_connected(&mesh, &path);
        assert!(path.nodes.iter().any(|&id| mesh.node(id).position.z >= 5.0));
    }

    #[test]
    fn blocked_row_means_no_path() {
        let mesh = grid_mesh(5, 5, |x, _| x == 2);
        let result = JumpPointSearch.find_path(
            &mesh,
            at(&mesh, 0, 0),
            at(&mesh, 4, 4),
            &SearchBudget::unbounded(),
        );
        assert_eq!(result, Err(SearchError::NoPathFound));
    }

    #[test]
    fn agrees_with_astar_on_reachability() {
        // Scattered obstacles; every reachable goal must be found by both.
        let mesh = grid_mesh(9, 9, |x, z| (x * 7 + z * 3) % 5 == 0 && (x, z) != (0, 0));
        let start = at(&mesh, 0, 0);
        let budget = SearchBudget::unbounded();
        for goal in mesh.node_ids() {
            let a = AStarSearch.find_path(&mesh, start, goal, &budget);
            let j = JumpPointSearch.find_path(&mesh, start, goal, &budget);
            assert_eq!(a.is_ok(), j.is_ok(), "goal {goal}");
            if let Ok(path) = j {
                assert_eq!(path.nodes.last(), Some(&goal));
                assert_connected(&mesh, &path);
                assert_no_repeats(&path);
            }
        }
    }

    #[test]
    fn follows_slopes() {
        use crate::builder::compute_adjacency;
        use crate::nav::SpatialNode;
        use crate::types::Vec3;

        // A 6x3 ramp rising 0.5 per cell along x.
        let mut mesh = NavMesh::new("ramp", 1.0, 1.0, 3.0);
        for x in 0..6 {
            for z in 0..3 {
                let p = Vec3::new(x as f32, x as f32 * 0.5, z as f32);
                mesh.add_node(SpatialNode::new(p, true, 2.0));
            }
        }
        compute_adjacency(&mut mesh);
        let start = mesh.find_exact(Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let goal = mesh.find_exact(Vec3::new(5.0, 2.5, 1.0)).unwrap();
        let path = JumpPointSearch
            .find_path(&mesh, start, goal, &SearchBudget::unbounded())
            .unwrap();
        assert_eq!(path.nodes.len(), 6);
        assert_connected(&mesh, &path);
    }

    #[test]
    fn expansion_cuts_overlapping_jumps() {
        // Column x = 0, z = 0..4. A jump from z = 4 down to z = 1, then a
        // fallback step back up to z = 2, then a jump on to the goal.
        let mesh = grid_mesh(1, 5, |_, _| false);
        let cell = |z| at(&mesh, 0, z);
        let mut came_from = vec![None; mesh.node_count()];
        came_from[cell(1).index()] = Some((cell(4), Some((0, -1))));
        came_from[cell(2).index()] = Some((cell(1), None));
        came_from[cell(0).index()] = Some((cell(2), Some((0, -1))));
        let nodes = expand_path(&mesh, &came_from, cell(4), cell(0));
        assert_eq!(nodes, vec![cell(4), cell(3), cell(2), cell(1), cell(0)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(96))]

        #[test]
        fn paths_on_random_grids_are_simple(
            blocked in prop::collection::vec(prop::bool::weighted(0.25), 100),
            pairs in prop::collection::vec((0i32..100, 0i32..100), 20),
        ) {
            let mesh = grid_mesh(10, 10, |x, z| blocked[(x * 10 + z) as usize]);
            let budget = SearchBudget::unbounded();
            for (s, g) in pairs {
                let start = at(&mesh, s / 10, s % 10);
                let goal = at(&mesh, g / 10, g % 10);
                let astar = AStarSearch.find_path(&mesh, start, goal, &budget);
                let jps = JumpPointSearch.find_path(&mesh, start, goal, &budget);
                prop_assert_eq!(astar.is_ok(), jps.is_ok());
                if let Ok(path) = jps {
                    prop_assert_eq!(path.nodes.first(), Some(&start));
                    prop_assert_eq!(path.nodes.last(), Some(&goal));
                    let distinct: BTreeSet<_> = path.nodes.iter().collect();
                    prop_assert_eq!(distinct.len(), path.nodes.len());
                    for w in path.nodes.windows(2) {
                        prop_assert!(mesh.neighbours(w[0]).contains(&w[1]));
                    }
                }
            }
        }
    }
}
