// Core types shared across the navigation library.
//
// Defines world-space positions (`Vec3`), the quantized position key used
// for node identity (`NodeKey`), compact integer identifiers for nodes,
// colliders, agents and path requests, and surface layer tags. All types
// derive `Serialize` and `Deserialize` so they can appear in persisted meshes,
// scene files and configs.
//
// See also: `nav.rs` for the mesh that keys nodes by `NodeKey`, `world.rs`
// for the collision geometry that carries `SurfaceLayer`s, `worker.rs` for
// `AgentId`/`RequestToken`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Positions closer than this (per axis, in world units) are the same node.
pub const POSITION_TOLERANCE: f32 = 0.001;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A point or direction in world space.
///
/// Y is up. The sampling grid lies in the X/Z plane and rays are cast along
/// negative Y.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const DOWN: Self = Self::new(0.0, -1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or `None` for a (near-)zero vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Quantize to the node identity key.
    pub fn key(self) -> NodeKey {
        NodeKey::from_position(self)
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Parses `"x,y,z"` (whitespace around components is allowed).
impl FromStr for Vec3 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected x,y,z but got {s:?}"));
        }
        let mut out = [0.0f32; 3];
        for (slot, part) in out.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| format!("bad component {part:?}: {e}"))?;
        }
        Ok(Self::new(out[0], out[1], out[2]))
    }
}

/// A position quantized to `POSITION_TOLERANCE`. Node identity within a
/// mesh is by key, so float noise below the tolerance never creates
/// duplicate nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl NodeKey {
    pub fn from_position(p: Vec3) -> Self {
        let q = |v: f32| (v / POSITION_TOLERANCE).round() as i32;
        Self {
            x: q(p.x),
            y: q(p.y),
            z: q(p.z),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers: simple integers for compactness.
// ---------------------------------------------------------------------------

/// Compact identifier for a nav mesh node. Equal to the node's index in the
/// mesh's node list, so ids are dense and iteration order is id order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NavNodeId(pub u32);

impl NavNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a collider in a `CollisionWorld`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderId(pub u32);

/// Surface classification of a collider (the engine's physics layer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceLayer(pub u32);

/// Identifies the agent a path request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Sequence token attached to every path request. Strictly increasing per
/// worker; a response is current only if its token is the latest one issued
/// for its agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

impl fmt::Display for NavNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}
