// Smoke test for the CLI commands.
//
// Writes a small scene and config into a temp dir, then runs build, path
// and inspect through the library API the binary uses. Checks that a second
// build adds to the store instead of replacing it, and that bad input comes
// back as errors rather than panics.

use std::fs;
use std::path::Path;
use std::time::Duration;

use wayfield_cli::commands::{self, BuildArgs, PathArgs};
use wayfield_nav::{NavError, PathAlgorithm, SearchError, Vec3};

const SCENE: &str = r#"{
    "colliders": [
        { "id": 0, "bounds": { "min": {"x": 0, "y": -1, "z": 0}, "max": {"x": 10, "y": 0, "z": 10} }, "layer": 0 },
        { "id": 1, "bounds": { "min": {"x": 20, "y": -1, "z": 0}, "max": {"x": 28, "y": 0, "z": 8} }, "layer": 0 }
    ],
    "lights": [ { "position": {"x": 5, "y": 1, "z": 5}, "intensity": 2.0, "range": 4.0 } ],
    "volumes": {
        "Level1": { "min": {"x": 0, "y": 0, "z": 0}, "max": {"x": 10, "y": 3, "z": 10} },
        "Level2": { "min": {"x": 20, "y": 0, "z": 0}, "max": {"x": 28, "y": 3, "z": 8} }
    }
}"#;

fn build_args(dir: &Path, volume: &str) -> BuildArgs {
    BuildArgs {
        scene: dir.join("scene.json"),
        volume: volume.to_string(),
        store: dir.join("meshes.bin"),
        config: None,
        name: None,
    }
}

#[test]
fn build_path_inspect() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scene.json"), SCENE).unwrap();

    let report = commands::build(&build_args(dir.path(), "Level1")).unwrap();
    assert_eq!(report.sampled, 100);
    assert_eq!(report.walkable, 64);
    assert_eq!(report.lights, 1);
    commands::build(&build_args(dir.path(), "Level2")).unwrap();

    let summaries = commands::inspect(&dir.path().join("meshes.bin")).unwrap();
    let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Level1", "Level2"]);
    assert_eq!(summaries[0].nodes, 100);
    assert!(summaries[0].lit > 0);
    assert_eq!(summaries[1].nodes, 64);

    for algorithm in [PathAlgorithm::AStar, PathAlgorithm::JumpPoint] {
        let output = commands::path(&PathArgs {
            store: dir.path().join("meshes.bin"),
            mesh: "Level1".into(),
            from: Vec3::new(1.5, 0.0, 1.5),
            to: Vec3::new(8.5, 0.0, 6.5),
            algorithm,
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap();
        assert_eq!(output.waypoints.first(), Some(&Vec3::new(1.5, 0.0, 1.5)));
        assert_eq!(output.waypoints.last(), Some(&Vec3::new(8.5, 0.0, 6.5)));
    }
}

#[test]
fn config_file_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scene.json"), SCENE).unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{ "build": { "walkable_layers": [7] } }"#,
    )
    .unwrap();
    let args = BuildArgs {
        config: Some(dir.path().join("config.json")),
        name: Some("Dark".into()),
        ..build_args(dir.path(), "Level1")
    };
    let report = commands::build(&args).unwrap();
    assert_eq!(report.walkable, 0);
    let summaries = commands::inspect(&dir.path().join("meshes.bin")).unwrap();
    assert_eq!(summaries[0].name, "Dark");
}

#[test]
fn errors_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scene.json"), SCENE).unwrap();

    let missing_volume = commands::build(&build_args(dir.path(), "Level9"));
    assert!(matches!(missing_volume, Err(NavError::Configuration(_))));

    commands::build(&build_args(dir.path(), "Level1")).unwrap();
    let unknown_mesh = commands::path(&PathArgs {
        store: dir.path().join("meshes.bin"),
        mesh: "Level9".into(),
        from: Vec3::ZERO,
        to: Vec3::ZERO,
        algorithm: PathAlgorithm::AStar,
        timeout: None,
    });
    assert!(matches!(unknown_mesh, Err(NavError::Configuration(_))));

    // Corner nodes are edge-fixed, so they can't be a goal.
    let unreachable = commands::path(&PathArgs {
        store: dir.path().join("meshes.bin"),
        mesh: "Level1".into(),
        from: Vec3::new(4.5, 0.0, 4.5),
        to: Vec3::new(0.5, 0.0, 0.5),
        algorithm: PathAlgorithm::AStar,
        timeout: None,
    });
    assert!(matches!(
        unreachable,
        Err(NavError::Search(SearchError::NoPathFound))
    ));

    assert!(commands::inspect(&dir.path().join("absent.bin")).is_err());
}
