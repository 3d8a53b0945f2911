// Point-light illumination baked into nav nodes.
//
// Each point light is snapped to its nearest node (the light node). Light
// then spreads along the straight lines through the light node's neighbours:
// a node is a candidate if its direction from the light node matches one of
// those neighbour directions and it lies within the light's range. The light
// node itself is always a candidate. A candidate receives light only if the
// ray from the light to it is clear.
//
// Contribution falls off as `intensity / distance`, where distance is
// measured from the light node (like the range), floored at one cell so the
// light node itself never divides by zero. Negative
// intensities contribute nothing. When a clamp is configured, values are
// clamped after every contribution.
//
// Runs after adjacency (it needs the light node's neighbours) and before the
// edge fix-up.
//
// See also: `builder.rs` which calls `illuminate`, `world.rs` for
// `PointLight` and the occlusion raycast.

use crate::nav::NavMesh;
use crate::types::{ColliderId, NavNodeId};
use crate::world::CollisionWorld;
use std::collections::BTreeSet;
use tracing::debug;

/// Minimum cosine between a neighbour direction and a candidate direction.
pub const DIRECTION_COS_THRESHOLD: f32 = 0.9995;

/// Occlusion rays stop this far short of the target node so the surface the
/// node sits on does not count as a blocker.
pub const OCCLUSION_SLACK: f32 = 0.01;

/// Apply every point light in `world` to `mesh`. Returns the number of
/// lights that landed on a node.
///
/// Panics if adjacency has not been computed.
pub fn illuminate(
    mesh: &mut NavMesh,
    world: &impl CollisionWorld,
    ignored: &BTreeSet<ColliderId>,
    clamp: Option<f32>,
) -> usize {
    let mut applied = 0;
    for light in world.point_lights() {
        let Some(centre) = mesh.find_nearest(light.position) else {
            continue;
        };
        applied += 1;
        let targets = lit_candidates(mesh, centre, light.range);
        let light_node = mesh.node(centre).position;
        let intensity = light.intensity.max(0.0);
        let mut lit = 0usize;
        for id in targets {
            let position = mesh.node(id).position;
            let offset = position - light.position;
            if let Some(direction) = offset.normalized() {
                let reach = (offset.length() - OCCLUSION_SLACK).max(0.0);
                if world.raycast(light.position, direction, reach, ignored).is_some() {
                    continue;
                }
            }
            let distance = position.distance(light_node);
            let contribution = intensity / distance.max(mesh.cell_size);
            let node = mesh.node_mut(id);
            node.illumination += contribution;
            if let Some(ceiling) = clamp {
                node.illumination = node.illumination.clamp(0.0, ceiling);
            }
            lit += 1;
        }
        debug!(position = %light.position, lit, "point light applied");
    }
    applied
}

/// The light node plus every node within `range` of it that lies along one
/// of its neighbour directions.
fn lit_candidates(mesh: &NavMesh, centre: NavNodeId, range: f32) -> BTreeSet<NavNodeId> {
    let origin = mesh.node(centre).position;
    let directions: Vec<_> = mesh
        .neighbours(centre)
        .iter()
        .filter_map(|&nb| (mesh.node(nb).position - origin).normalized())
        .collect();

    let mut out = BTreeSet::from([centre]);
    for id in mesh.node_ids() {
        if id == centre {
            continue;
        }
        let offset = mesh.node(id).position - origin;
        if offset.length() > range {
            continue;
        }
        let Some(dir) = offset.normalized() else {
            continue;
        };
        if directions
            .iter()
            .any(|d| d.dot(dir) >= DIRECTION_COS_THRESHOLD)
        {
            out.insert(id);
        }
    }
    out
}
