// Benchmarks for mesh building and both search algorithms.
//
// Builds a square floor with a field of pillars, then measures the full
// build pipeline and corner-to-corner searches with A* and jump point
// search on the resulting mesh.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use wayfield_nav::{
    Aabb, BoxWorld, BuildConfig, MeshBuilder, NavMesh, PathAlgorithm, PathFinder, SearchBudget,
    SurfaceLayer, Vec3,
};

fn pillar_world(size: f32) -> (BoxWorld, Aabb) {
    let mut world = BoxWorld::new();
    world.add_box(
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(size, 0.0, size),
        SurfaceLayer(0),
    );
    let mut x = 4.0;
    while x < size - 4.0 {
        let mut z = 4.0;
        while z < size - 4.0 {
            world.add_box(
                Vec3::new(x, 0.0, z),
                Vec3::new(x + 1.0, 2.0, z + 1.0),
                SurfaceLayer(1),
            );
            z += 6.0;
        }
        x += 6.0;
    }
    world.add_light(Vec3::new(size / 2.0, 2.0, size / 2.0), 4.0, size / 2.0);
    let volume = Aabb::new(Vec3::ZERO, Vec3::new(size, 4.0, size));
    (world, volume)
}

fn build(size: f32) -> NavMesh {
    let (world, volume) = pillar_world(size);
    let builder = MeshBuilder::new(BuildConfig::default()).expect("default config is valid");
    builder
        .build(&world, Some(&volume), "bench")
        .expect("bench scene builds")
        .0
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [32.0f32, 64.0] {
        let (world, volume) = pillar_world(size);
        let builder = MeshBuilder::new(BuildConfig::default()).expect("default config is valid");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| builder.build(black_box(&world), Some(&volume), "bench"))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mesh = build(64.0);
    let start = mesh.resolve(Vec3::new(1.5, 0.0, 1.5)).expect("mesh not empty");
    let goal = mesh.resolve(Vec3::new(62.5, 0.0, 62.5)).expect("mesh not empty");
    let mut group = c.benchmark_group("search");
    for algorithm in [PathAlgorithm::AStar, PathAlgorithm::JumpPoint] {
        group.bench_function(format!("{algorithm:?}"), |b| {
            b.iter(|| {
                algorithm.find_path(
                    black_box(&mesh),
                    start,
                    goal,
                    &SearchBudget::unbounded(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
