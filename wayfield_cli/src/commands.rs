// The three CLI commands, as plain functions over argument structs.
//
// - `build`: load a `BoxWorld` scene and optional `NavConfig`, build the
//   mesh for one named volume, and insert it into the store (creating the
//   store if needed). Other meshes in the store are kept.
// - `path`: load the store, activate one mesh, and search between two
//   positions.
// - `inspect`: summarize every mesh in a store.
//
// Each returns a serializable value; `main.rs` prints it as JSON.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use wayfield_nav::pathfinding::find_path_between;
use wayfield_nav::{
    BoxWorld, BuildReport, MeshBuilder, MeshRepository, NavConfig, NavError, NavResult,
    PathAlgorithm, SearchBudget, Vec3,
};

#[derive(Clone, Debug)]
pub struct BuildArgs {
    pub scene: PathBuf,
    /// Name of the build volume in the scene.
    pub volume: String,
    pub store: PathBuf,
    pub config: Option<PathBuf>,
    /// Mesh name; defaults to the volume name.
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PathArgs {
    pub store: PathBuf,
    pub mesh: String,
    pub from: Vec3,
    pub to: Vec3,
    pub algorithm: PathAlgorithm,
    /// `None` disables the deadline.
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PathOutput {
    pub mesh: String,
    pub algorithm: PathAlgorithm,
    pub waypoints: Vec<Vec3>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeshSummary {
    pub name: String,
    pub nodes: usize,
    pub walkable: usize,
    pub lit: usize,
    pub cell_size: f32,
    pub origin: Vec3,
}

pub fn build(args: &BuildArgs) -> NavResult<BuildReport> {
    let config = match &args.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };
    let world = BoxWorld::load(&args.scene)?;
    let name = args.name.as_deref().unwrap_or(&args.volume);

    let builder = MeshBuilder::new(config.build)?;
    let (mesh, report) = builder.build(&world, world.volume(&args.volume), name)?;

    let mut repo = MeshRepository::load_or_empty(&args.store)?;
    repo.insert(mesh);
    repo.save(&args.store)?;
    info!(mesh = name, store = %args.store.display(), "mesh stored");
    Ok(report)
}

pub fn path(args: &PathArgs) -> NavResult<PathOutput> {
    let mut repo = MeshRepository::load(&args.store)?;
    let mesh = repo.activate(&args.mesh)?;
    let budget = SearchBudget::with_timeout(args.timeout);
    let waypoints = find_path_between(&mesh, args.from, args.to, &args.algorithm, &budget)
        .map_err(NavError::from)?;
    Ok(PathOutput {
        mesh: args.mesh.clone(),
        algorithm: args.algorithm,
        waypoints,
    })
}

pub fn inspect(store: &std::path::Path) -> NavResult<Vec<MeshSummary>> {
    let repo = MeshRepository::load(store)?;
    Ok(repo
        .meshes()
        .map(|mesh| MeshSummary {
            name: mesh.name.clone(),
            nodes: mesh.node_count(),
            walkable: mesh.walkable_count(),
            lit: mesh.nodes().iter().filter(|n| n.illumination > 0.0).count(),
            cell_size: mesh.cell_size,
            origin: mesh.origin,
        })
        .collect())
}
