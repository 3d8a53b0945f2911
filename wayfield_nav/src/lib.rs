// wayfield_nav: navigation mesh building and path search.
//
// This crate contains all navigation logic for Wayfield: sampling collision
// geometry into a nav mesh, baking illumination, persisting meshes, and
// searching them (A* and jump point search) on background threads. It has no
// engine dependencies; a host plugs its physics scene in through the
// `CollisionWorld` trait and drives everything else through plain calls.
//
// Module overview:
// - `types.rs`:       Vec3, NodeKey (quantized position identity), ids, surface layers.
// - `error.rs`:       SearchError (per-request codes) and NavError (everything else).
// - `config.rs`:      NavConfig = BuildConfig + SearchConfig, loaded from JSON.
// - `world.rs`:       CollisionWorld trait + BoxWorld, an AABB scene with lights and build volumes.
// - `nav.rs`:         NavMesh, SpatialNode, adjacency, position resolution, persisted schema.
// - `builder.rs`:     MeshBuilder: raycast sampling, pruning, adjacency, edge fix-up.
// - `lighting.rs`:    Point-light illumination pass.
// - `pathfinding.rs`: PathFinder contract, PathAlgorithm, SearchBudget, A*.
// - `jps.rs`:         Jump point search.
// - `repository.rs`:  MeshRepository: named meshes, active level, save/load.
// - `worker.rs`:      PathWorker: threaded searches with per-agent request tokens.
//
// The companion crate `wayfield_cli` drives this library from the command
// line; `pipeline_tests` exercises it end to end.
//
// Once built, a mesh is shared as `Arc<NavMesh>` and never mutated again.
// Searches read it without locking.

pub mod builder;
pub mod config;
pub mod error;
pub mod jps;
pub mod lighting;
pub mod nav;
pub mod pathfinding;
pub mod repository;
pub mod types;
pub mod worker;
pub mod world;

pub use builder::{BuildReport, MeshBuilder};
pub use config::{BuildConfig, NavConfig, SearchConfig};
pub use error::{NavError, NavResult, SearchError};
pub use jps::JumpPointSearch;
pub use nav::{NavMesh, SpatialNode};
pub use pathfinding::{AStarSearch, Path, PathAlgorithm, PathFinder, SearchBudget};
pub use repository::MeshRepository;
pub use types::{AgentId, ColliderId, NavNodeId, RequestToken, SurfaceLayer, Vec3};
pub use worker::{PathRequest, PathResponse, PathWorker};
pub use world::{Aabb, BoxWorld, CollisionWorld};
