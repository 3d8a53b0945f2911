// Named collection of nav meshes, one per level.
//
// `MeshRepository` is the explicit owner of every built mesh, keyed by level
// name, plus the name of the currently active level. Callers pass it to
// whatever needs meshes (the CLI, a host engine's level loader) instead of
// reaching for process-wide state. Meshes are stored as `Arc<NavMesh>` so a
// level's mesh can be handed to a `PathWorker` while the repository keeps
// its own reference; a rebuilt mesh replaces the entry without disturbing
// searches still running on the old one.
//
// The whole collection is persisted as one file. The format is chosen by
// extension: `.json` is pretty-printed JSON (handy for inspection and
// diffs), anything else is bincode. Both carry `STORE_VERSION`. Saves write
// a temporary sibling file and rename it into place.
//
// See also: `nav.rs` for the per-mesh persisted schema, `worker.rs` which
// consumes `Arc<NavMesh>`.

use crate::error::{NavError, NavResult};
use crate::nav::NavMesh;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bumped whenever the persisted layout changes.
pub const STORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct MeshCollection {
    version: u32,
    meshes: BTreeMap<String, Arc<NavMesh>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StoreFormat {
    Json,
    Binary,
}

impl StoreFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => StoreFormat::Json,
            _ => StoreFormat::Binary,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MeshRepository {
    meshes: BTreeMap<String, Arc<NavMesh>>,
    active: Option<String>,
}

impl MeshRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a mesh under its own name, replacing any previous mesh for that
    /// level. Returns the shared handle.
    pub fn insert(&mut self, mesh: NavMesh) -> Arc<NavMesh> {
        let mesh = Arc::new(mesh);
        if self.meshes.insert(mesh.name.clone(), Arc::clone(&mesh)).is_some() {
            debug!(mesh = %mesh.name, "replaced existing nav mesh");
        }
        mesh
    }

    pub fn get(&self, name: &str) -> Option<Arc<NavMesh>> {
        self.meshes.get(name).cloned()
    }

    /// Remove a level's mesh. Clears the active selection if it pointed at
    /// that level.
    pub fn remove(&mut self, name: &str) -> Option<Arc<NavMesh>> {
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.meshes.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.meshes.keys().map(String::as_str)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Arc<NavMesh>> {
        self.meshes.values()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Make `level` the active level. Fails if no mesh exists for it.
    pub fn activate(&mut self, level: &str) -> NavResult<Arc<NavMesh>> {
        let mesh = self
            .get(level)
            .ok_or_else(|| NavError::config(format!("no nav mesh for level {level:?}")))?;
        self.active = Some(level.to_string());
        info!(level, "activated nav mesh");
        Ok(mesh)
    }

    /// The active level's mesh, if a level is active.
    pub fn current(&self) -> Option<Arc<NavMesh>> {
        self.active.as_deref().and_then(|name| self.get(name))
    }

    pub fn active_level(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Write every mesh to `path`.
    pub fn save(&self, path: &Path) -> NavResult<()> {
        let collection = MeshCollection {
            version: STORE_VERSION,
            meshes: self.meshes.clone(),
        };
        let bytes = match StoreFormat::for_path(path) {
            StoreFormat::Json => serde_json::to_vec_pretty(&collection)?,
            StoreFormat::Binary => bincode::serialize(&collection)?,
        };
        let tmp = temp_sibling(path);
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        info!(path = %path.display(), meshes = self.len(), bytes = bytes.len(), "saved nav meshes");
        Ok(())
    }

    /// Read a collection written by `save`. Nothing is active afterwards.
    pub fn load(path: &Path) -> NavResult<Self> {
        let bytes = fs::read(path)?;
        let collection: MeshCollection = match StoreFormat::for_path(path) {
            StoreFormat::Json => serde_json::from_slice(&bytes).map_err(|e| malformed(path, e))?,
            StoreFormat::Binary => bincode::deserialize(&bytes).map_err(|e| malformed(path, e))?,
        };
        if collection.version != STORE_VERSION {
            return Err(NavError::config(format!(
                "mesh store {} has version {}, expected {STORE_VERSION}",
                path.display(),
                collection.version
            )));
        }
        for (key, mesh) in &collection.meshes {
            if *key != mesh.name {
                return Err(NavError::config(format!(
                    "mesh store {}: entry {key:?} holds mesh named {:?}",
                    path.display(),
                    mesh.name
                )));
            }
        }
        info!(path = %path.display(), meshes = collection.meshes.len(), "loaded nav meshes");
        Ok(Self {
            meshes: collection.meshes,
            active: None,
        })
    }

    /// Like `load`, but a missing file yields an empty repository.
    pub fn load_or_empty(path: &Path) -> NavResult<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "mesh store not found, starting empty");
            return Ok(Self::new());
        }
        Self::load(path)
    }
}

fn malformed(path: &Path, err: impl std::fmt::Display) -> NavError {
    NavError::config(format!("malformed mesh store {}: {err}", path.display()))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
