// Nav mesh construction from collision geometry.
//
// `MeshBuilder` turns a `CollisionWorld` and a build volume into a `NavMesh`
// in five passes:
//
// 1. **Sample.** Lay a grid of `cell_size` columns over the volume's X/Z
//    footprint and cast one ray straight down per column from the volume
//    top. Each hit becomes a node; its layer decides walkability and the gap
//    to the volume top (clamped) becomes its clearance height. When the hit
//    surface leaves enough room above, a second ray probes beneath the
//    obstacle so floors under platforms and tables are sampled too.
// 2. **Prune.** Drop nodes with no other walkable node within three cells.
// 3. **Adjacency.** Link every pair of nodes within 1.5 cells. This is the
//    expensive pass and runs in parallel with rayon over a spatial hash.
// 4. **Illuminate.** See `lighting.rs`.
// 5. **Fix edges.** Nodes with fewer than eight neighbours sit on a border
//    and are marked non-walkable, which keeps agents off ledges.
//
// Passes 2, 3 and 5 are public so tests and tools can run them on
// hand-built meshes.
//
// See also: `world.rs` for the raycast seam, `nav.rs` for the output,
// `config.rs` for `BuildConfig`.

use crate::config::BuildConfig;
use crate::error::{NavError, NavResult};
use crate::lighting;
use crate::nav::{NavMesh, Neighbours, SpatialNode};
use crate::types::{NavNodeId, Vec3};
use crate::world::{Aabb, CollisionWorld};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Gap left below an obstacle's underside before the second probe starts.
pub const SURFACE_EPSILON: f32 = 1e-3;

/// Neighbour radius, in cells.
pub const NEIGHBOUR_RADIUS_CELLS: f32 = 1.5;

/// Isolation prune radius, in cells.
pub const PRUNE_RADIUS_CELLS: f32 = 3.0;

/// Nodes with fewer neighbours than this are border nodes.
pub const FULL_NEIGHBOURHOOD: usize = 8;

/// Counters from one build, for logging and the CLI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Grid columns whose top ray hit something.
    pub sampled: usize,
    /// Nodes found by probing beneath an obstacle.
    pub under_obstacle: usize,
    /// Hits dropped because a node already held their position.
    pub duplicates: usize,
    pub pruned: usize,
    pub edge_fixed: usize,
    pub lights: usize,
    pub walkable: usize,
}

pub struct MeshBuilder {
    config: BuildConfig,
}

impl MeshBuilder {
    pub fn new(config: BuildConfig) -> NavResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the full pipeline. `volume` is the level's build bounds; `None`
    /// is a configuration error.
    pub fn build(
        &self,
        world: &impl CollisionWorld,
        volume: Option<&Aabb>,
        name: &str,
    ) -> NavResult<(NavMesh, BuildReport)> {
        let volume =
            volume.ok_or_else(|| NavError::config(format!("no build volume for mesh {name:?}")))?;
        info!(mesh = name, "building nav mesh");

        let (mut mesh, mut report) = self.sample(world, volume, name)?;
        debug!(
            sampled = report.sampled,
            under_obstacle = report.under_obstacle,
            duplicates = report.duplicates,
            "sampling done"
        );

        let radius = self.config.cell_size * PRUNE_RADIUS_CELLS;
        report.pruned = prune_isolated_nodes(&mut mesh, radius);
        debug!(pruned = report.pruned, "isolated nodes pruned");

        compute_adjacency(&mut mesh);

        report.lights = lighting::illuminate(
            &mut mesh,
            world,
            &self.config.ignored_colliders,
            self.config.illumination_clamp(),
        );
        debug!(lights = report.lights, "illumination applied");

        report.edge_fixed = fix_edges(&mut mesh);
        debug!(edge_fixed = report.edge_fixed, "edge nodes marked unwalkable");

        mesh.origin = volume.min;
        report.walkable = mesh.walkable_count();
        if report.walkable == 0 {
            warn!(mesh = name, "nav mesh has no walkable nodes");
        }
        info!(
            mesh = name,
            nodes = mesh.node_count(),
            walkable = report.walkable,
            "nav mesh built"
        );
        Ok((mesh, report))
    }

    /// Pass 1: raycast the volume into an un-linked mesh.
    pub fn sample(
        &self,
        world: &impl CollisionWorld,
        volume: &Aabb,
        name: &str,
    ) -> NavResult<(NavMesh, BuildReport)> {
        let cfg = &self.config;
        let cs = cfg.cell_size;
        let size = volume.size();
        if !volume.is_valid() || size.y <= 0.0 || size.x < cs || size.z < cs {
            return Err(NavError::config(format!(
                "build volume for mesh {name:?} is degenerate: min {} max {}",
                volume.min, volume.max
            )));
        }
        if cfg.walkable_layers.is_empty() {
            warn!(mesh = name, "no walkable layers configured");
        }

        // Small slack so an exact multiple of the cell size is not lost to
        // float error.
        let cells_x = (size.x / cs + 1e-4).floor() as u32;
        let cells_z = (size.z / cs + 1e-4).floor() as u32;
        let top = volume.max.y;
        let bottom = volume.min.y;
        let clamp_height = |h: f32| h.clamp(cfg.min_cell_height, cfg.max_cell_height);

        let mut mesh = NavMesh::new(name, cs, cfg.min_cell_height, cfg.max_cell_height);
        let mut report = BuildReport::default();
        let insert = |mesh: &mut NavMesh, report: &mut BuildReport, node: SpatialNode| {
            if mesh.add_node(node).is_none() {
                report.duplicates += 1;
            }
        };

        for ix in 0..cells_x {
            for iz in 0..cells_z {
                let x = volume.min.x + (ix as f32 + 0.5) * cs;
                let z = volume.min.z + (iz as f32 + 0.5) * cs;
                let origin = Vec3::new(x, top, z);
                let Some(hit) = world.raycast(origin, Vec3::DOWN, size.y, &cfg.ignored_colliders)
                else {
                    continue;
                };
                report.sampled += 1;
                let walkable = cfg.walkable_layers.contains(&hit.layer);
                let node = SpatialNode::new(hit.point, walkable, clamp_height(top - hit.point.y));
                insert(&mut mesh, &mut report, node);

                if top - (hit.bounds.extents().y + hit.point.y) < cfg.min_cell_height {
                    continue;
                }
                let probe_y = hit.point.y - hit.bounds.size().y - SURFACE_EPSILON;
                if probe_y <= bottom {
                    continue;
                }
                let probe = Vec3::new(x, probe_y, z);
                let Some(under) =
                    world.raycast(probe, Vec3::DOWN, probe_y - bottom, &cfg.ignored_colliders)
                else {
                    continue;
                };
                report.under_obstacle += 1;
                let walkable = cfg.walkable_layers.contains(&under.layer);
                let height = clamp_height(hit.point.y - under.point.y);
                insert(&mut mesh, &mut report, SpatialNode::new(under.point, walkable, height));
            }
        }
        Ok((mesh, report))
    }
}

/// Bucketed spatial hash over node positions. Bucket edge equals the query
/// radius, so a radius query touches at most the 27 surrounding buckets.
struct SpatialGrid {
    bucket: f32,
    cells: FxHashMap<(i32, i32, i32), Vec<NavNodeId>>,
}

impl SpatialGrid {
    fn new(nodes: &[SpatialNode], bucket: f32) -> Self {
        let mut cells: FxHashMap<(i32, i32, i32), Vec<NavNodeId>> = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            cells
                .entry(Self::cell_of(node.position, bucket))
                .or_default()
                .push(NavNodeId(i as u32));
        }
        Self { bucket, cells }
    }

    fn cell_of(p: Vec3, bucket: f32) -> (i32, i32, i32) {
        (
            (p.x / bucket).floor() as i32,
            (p.y / bucket).floor() as i32,
            (p.z / bucket).floor() as i32,
        )
    }

    /// Candidate ids near `p`, unordered. Caller filters by exact distance.
    fn candidates(&self, p: Vec3) -> impl Iterator<Item = NavNodeId> + '_ {
        let (cx, cy, cz) = Self::cell_of(p, self.bucket);
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).flat_map(move |dz| {
                    self.cells
                        .get(&(cx + dx, cy + dy, cz + dz))
                        .into_iter()
                        .flatten()
                        .copied()
                })
            })
        })
    }
}

/// Remove every node with no walkable node other than itself within
/// `radius`. Decisions are made against the mesh as it was on entry.
pub fn prune_isolated_nodes(mesh: &mut NavMesh, radius: f32) -> usize {
    let nodes = mesh.nodes();
    let grid = SpatialGrid::new(nodes, radius);
    let keep: Vec<bool> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            grid.candidates(node.position).any(|other| {
                let o = &nodes[other.index()];
                other.index() != i && o.is_walkable && o.position.distance(node.position) <= radius
            })
        })
        .collect();
    mesh.retain_nodes(|id, _| keep[id.index()])
}

/// Link every pair of distinct nodes within `1.5 * cell_size` (inclusive).
/// Neighbour lists are in ascending id order.
pub fn compute_adjacency(mesh: &mut NavMesh) {
    let radius = mesh.cell_size * NEIGHBOUR_RADIUS_CELLS;
    let nodes = mesh.nodes();
    let grid = SpatialGrid::new(nodes, radius);
    let adjacency: Vec<Neighbours> = nodes
        .par_iter()
        .enumerate()
        .map(|(i, node)| {
            let mut list: Neighbours = grid
                .candidates(node.position)
                .filter(|other| {
                    other.index() != i
                        && nodes[other.index()].position.distance(node.position) <= radius
                })
                .collect();
            list.sort_unstable();
            list
        })
        .collect();
    mesh.set_adjacency(adjacency);
}

/// Mark every node with fewer than eight neighbours non-walkable. Returns
/// how many walkable nodes were changed. Adjacency is left as is.
///
/// Panics if adjacency has not been computed.
pub fn fix_edges(mesh: &mut NavMesh) -> usize {
    let border: Vec<NavNodeId> = mesh
        .node_ids()
        .filter(|&id| mesh.node(id).is_walkable && mesh.neighbour_count(id) < FULL_NEIGHBOURHOOD)
        .collect();
    for &id in &border {
        mesh.node_mut(id).is_walkable = false;
    }
    border.len()
}
