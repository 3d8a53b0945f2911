// Test-only fixtures for the end-to-end pipeline tests.
//
// Builds small `BoxWorld` scenes in code, runs them through the real
// `MeshBuilder`, and wraps `PathWorker::poll()` in a blocking wait. The only
// test-specific code here is the scene layout and the polling loop; meshes,
// persistence and searches all go through the library's own code paths.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::thread;
use std::time::{Duration, Instant};

use wayfield_nav::{
    Aabb, AgentId, BoxWorld, BuildConfig, BuildReport, MeshBuilder, NavMesh, PathResponse,
    PathWorker, SurfaceLayer, Vec3,
};

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Volume name used by every fixture world.
pub const VOLUME: &str = "Level";

/// A `size` x `size` floor with its top at y = 0, one unit thick, and a
/// build volume three units tall over it.
pub fn flat_world(size: f32) -> BoxWorld {
    let mut world = BoxWorld::new();
    world.add_box(Vec3::new(0.0, -1.0, 0.0), Vec3::new(size, 0.0, size), SurfaceLayer(0));
    world.add_volume(VOLUME, Aabb::new(Vec3::ZERO, Vec3::new(size, 3.0, size)));
    world
}

/// A 12 x 12 floor with a 4 x 4 platform floating over its middle
/// (x and z in 4..8, top at y = 4). A light hangs above the platform.
///
/// The floor under the platform is still sampled through the
/// under-obstacle probe. Nothing connects the two surfaces.
pub fn two_level_world() -> BoxWorld {
    let mut world = BoxWorld::new();
    world.add_box(Vec3::new(0.0, -1.0, 0.0), Vec3::new(12.0, 0.0, 12.0), SurfaceLayer(0));
    world.add_box(Vec3::new(4.0, 3.0, 4.0), Vec3::new(8.0, 4.0, 8.0), SurfaceLayer(0));
    world.add_light(Vec3::new(6.0, 6.0, 6.0), 1.0, 3.0);
    world.add_volume(VOLUME, Aabb::new(Vec3::ZERO, Vec3::new(12.0, 8.0, 12.0)));
    world
}

/// Build the fixture volume of `world` with default settings.
pub fn build(world: &BoxWorld, name: &str) -> (NavMesh, BuildReport) {
    let builder = MeshBuilder::new(BuildConfig::default()).expect("default config is valid");
    builder
        .build(world, world.volume(VOLUME), name)
        .expect("fixture build failed")
}

/// Poll `worker` until a response for `agent` arrives or `timeout` passes.
/// Every other response polled along the way, including the rest of the
/// batch the match arrived in, is returned alongside.
pub fn wait_for_response(
    worker: &mut PathWorker,
    agent: AgentId,
    timeout: Duration,
) -> (Option<PathResponse>, Vec<PathResponse>) {
    let deadline = Instant::now() + timeout;
    let mut found = None;
    let mut others = Vec::new();
    while Instant::now() < deadline {
        for response in worker.poll() {
            if found.is_none() && response.agent == agent {
                found = Some(response);
            } else {
                others.push(response);
            }
        }
        if found.is_some() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    (found, others)
}
