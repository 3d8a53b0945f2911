// Collision geometry seam for mesh building.
//
// `CollisionWorld` is the only thing `MeshBuilder` needs from the host
// engine: a closest-hit raycast that reports the hit collider's surface
// layer and bounds, and the list of point lights. Engines implement it over
// their own physics scene.
//
// `BoxWorld` is the in-crate implementation: a flat list of axis-aligned box
// colliders, each tagged with a `SurfaceLayer`, plus point lights and named
// navigation volumes (the bounds a build samples). It loads from JSON, which
// is what the CLI and tests use.
//
// Ray semantics follow common physics engines: a ray whose origin lies
// strictly inside a collider does not report that collider; a ray starting
// exactly on a face does (at distance 0). Ties between colliders at the same
// distance go to the earlier collider in the list.
//
// See also: `builder.rs` (downward sampling rays), `lighting.rs` (occlusion
// rays), `types.rs` for `ColliderId`/`SurfaceLayer`.

use crate::error::NavResult;
use crate::types::{ColliderId, SurfaceLayer, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Half of `size()`.
    pub fn extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn center(&self) -> Vec3 {
        self.min + self.extents()
    }

    /// Finite and not inverted on any axis.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.max.x >= self.min.x
            && self.max.y >= self.min.y
            && self.max.z >= self.min.z
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Slab test. Returns the parametric entry/exit distances along
    /// `direction` (which need not be normalized), or `None` if the line
    /// misses the box.
    pub fn ray_span(&self, origin: Vec3, direction: Vec3) -> Option<(f32, f32)> {
        let o = origin.to_array();
        let d = direction.to_array();
        let lo = self.min.to_array();
        let hi = self.max.to_array();

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        for axis in 0..3 {
            if d[axis].abs() <= f32::EPSILON {
                // Parallel to this slab: must already be between the planes.
                if o[axis] < lo[axis] || o[axis] > hi[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d[axis];
            let mut t0 = (lo[axis] - o[axis]) * inv;
            let mut t1 = (hi[axis] - o[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }
        Some((t_enter, t_exit))
    }
}

/// A solid box in the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub id: ColliderId,
    pub bounds: Aabb,
    pub layer: SurfaceLayer,
}

/// An omnidirectional light. Only point lights contribute illumination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub intensity: f32,
    pub range: f32,
}

/// The closest collider struck by a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    pub collider: ColliderId,
    pub layer: SurfaceLayer,
    /// Bounds of the struck collider. The builder uses its height as the
    /// surface thickness when probing beneath an obstacle.
    pub bounds: Aabb,
}

/// Geometry queries a mesh build needs from the host engine.
pub trait CollisionWorld {
    /// Closest hit along `direction` (unit length) within `max_distance`,
    /// skipping colliders in `ignored`.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignored: &BTreeSet<ColliderId>,
    ) -> Option<RayHit>;

    /// All point lights in the scene.
    fn point_lights(&self) -> &[PointLight];
}

/// A scene made of axis-aligned boxes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxWorld {
    pub colliders: Vec<Collider>,
    pub lights: Vec<PointLight>,
    /// Named build volumes, keyed by mesh (level) name.
    pub volumes: BTreeMap<String, Aabb>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> NavResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> NavResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Add a box collider. Ids are assigned sequentially from the current
    /// collider count.
    pub fn add_box(&mut self, min: Vec3, max: Vec3, layer: SurfaceLayer) -> ColliderId {
        let id = ColliderId(self.colliders.len() as u32);
        self.colliders.push(Collider {
            id,
            bounds: Aabb::new(min, max),
            layer,
        });
        id
    }

    pub fn add_light(&mut self, position: Vec3, intensity: f32, range: f32) {
        self.lights.push(PointLight {
            position,
            intensity,
            range,
        });
    }

    pub fn add_volume(&mut self, name: &str, bounds: Aabb) {
        self.volumes.insert(name.to_string(), bounds);
    }

    pub fn volume(&self, name: &str) -> Option<&Aabb> {
        self.volumes.get(name)
    }
}

impl CollisionWorld for BoxWorld {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignored: &BTreeSet<ColliderId>,
    ) -> Option<RayHit> {
        let mut best: Option<(f32, &Collider)> = None;
        for collider in &self.colliders {
            if ignored.contains(&collider.id) {
                continue;
            }
            let Some((t_enter, _)) = collider.bounds.ray_span(origin, direction) else {
                continue;
            };
            // Negative entry means the origin is inside this box.
            if t_enter < 0.0 || t_enter > max_distance {
                continue;
            }
            if best.is_none_or(|(t, _)| t_enter < t) {
                best = Some((t_enter, collider));
            }
        }
        best.map(|(t, collider)| RayHit {
            point: origin + direction * t,
            distance: t,
            collider: collider.id,
            layer: collider.layer,
            bounds: collider.bounds,
        })
    }

    fn point_lights(&self) -> &[PointLight] {
        &self.lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_world() -> BoxWorld {
        let mut world = BoxWorld::new();
        world.add_box(
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            SurfaceLayer(0),
        );
        world
    }

    #[test]
    fn downward_ray_hits_floor_top() {
        let world = floor_world();
        let hit = world
            .raycast(Vec3::new(2.5, 5.0, 2.5), Vec3::DOWN, 10.0, &BTreeSet::new())
            .unwrap();
        assert_eq!(hit.point, Vec3::new(2.5, 0.0, 2.5));
        assert_eq!(hit.distance, 5.0);
        assert_eq!(hit.layer, SurfaceLayer(0));
        assert_eq!(hit.bounds.size().y, 1.0);
    }

    #[test]
    fn max_distance_is_inclusive() {
        let world = floor_world();
        let origin = Vec3::new(2.5, 5.0, 2.5);
        assert!(world.raycast(origin, Vec3::DOWN, 5.0, &BTreeSet::new()).is_some());
        assert!(world.raycast(origin, Vec3::DOWN, 4.9, &BTreeSet::new()).is_none());
    }

    #[test]
    fn ray_outside_footprint_misses() {
        let world = floor_world();
        let hit = world.raycast(Vec3::new(12.0, 5.0, 2.0), Vec3::DOWN, 10.0, &BTreeSet::new());
        assert!(hit.is_none());
    }

    #[test]
    fn closest_collider_wins() {
        let mut world = floor_world();
        let platform = world.add_box(
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(4.0, 2.5, 4.0),
            SurfaceLayer(1),
        );
        let hit = world
            .raycast(Vec3::new(3.0, 5.0, 3.0), Vec3::DOWN, 10.0, &BTreeSet::new())
            .unwrap();
        assert_eq!(hit.collider, platform);
        assert_eq!(hit.point.y, 2.5);
    }

    #[test]
    fn ignored_colliders_are_transparent() {
        let mut world = floor_world();
        let crate_box = world.add_box(
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(4.0, 1.0, 4.0),
            SurfaceLayer(2),
        );
        let ignored = BTreeSet::from([crate_box]);
        let hit = world
            .raycast(Vec3::new(3.0, 5.0, 3.0), Vec3::DOWN, 10.0, &ignored)
            .unwrap();
        assert_eq!(hit.collider, ColliderId(0));
    }

    #[test]
    fn ray_starting_inside_box_ignores_it() {
        let world = floor_world();
        let hit = world.raycast(Vec3::new(2.0, -0.5, 2.0), Vec3::DOWN, 10.0, &BTreeSet::new());
        assert!(hit.is_none());
    }

    #[test]
    fn world_loads_from_json() {
        let json = r#"{
            "colliders": [
                { "id": 4, "bounds": { "min": {"x":0,"y":-1,"z":0}, "max": {"x":8,"y":0,"z":8} }, "layer": 0 }
            ],
            "lights": [ { "position": {"x":4,"y":2,"z":4}, "intensity": 3.0, "range": 5.0 } ],
            "volumes": { "Level1": { "min": {"x":0,"y":0,"z":0}, "max": {"x":8,"y":4,"z":8} } }
        }"#;
        let world = BoxWorld::from_json_str(json).unwrap();
        assert_eq!(world.colliders[0].id, ColliderId(4));
        assert_eq!(world.point_lights().len(), 1);
        assert_eq!(world.volume("Level1").unwrap().size().y, 4.0);
        assert!(world.volume("Level2").is_none());
    }

    #[test]
    fn aabb_validity() {
        let good = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0));
        assert!(good.is_valid());
        assert!(good.contains(Vec3::new(0.5, 0.5, 0.5)));
        let inverted = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO);
        assert!(!inverted.is_valid());
        let infinite = Aabb::new(Vec3::ZERO, Vec3::new(f32::INFINITY, 1.0, 1.0));
        assert!(!infinite.is_valid());
    }
}
