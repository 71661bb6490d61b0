//! Asset manager.
//!
//! Assets are requested by path up front, which hands out a stable `AssetRef`,
//! and decoded in one batch by `load()`. Data is only available after the batch
//! that contains it has run.
//!
//! - `mesh`: CPU mesh data and procedural shapes
//! - `obj`: Wavefront OBJ reader
//! - `texture`: PNG/JPEG decoding to RGBA8

mod mesh;
mod obj;
mod texture;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::time::Stopwatch;

pub use mesh::MeshData;
pub use obj::parse_obj;
pub use texture::TextureData;

/// Stable handle to a requested asset.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AssetRef(pub u32);

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("obj line {line}: {message}")]
    Obj { line: usize, message: String },

    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot tell the asset kind of {0}")]
    UnknownKind(PathBuf),

    #[error("{0} is not loaded")]
    NotLoaded(AssetRef),

    #[error("{asset} is not a {expected} asset")]
    KindMismatch {
        asset: AssetRef,
        expected: &'static str,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AssetKind {
    Mesh,
    Image,
    Text,
}

impl AssetKind {
    /// Infers the kind from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(AssetKind::Mesh),
            "png" | "jpg" | "jpeg" => Some(AssetKind::Image),
            "txt" | "wgsl" | "json" => Some(AssetKind::Text),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            AssetKind::Mesh => "mesh",
            AssetKind::Image => "image",
            AssetKind::Text => "text",
        }
    }
}

#[derive(Debug)]
enum AssetData {
    Mesh(MeshData),
    Image(TextureData),
    Text(String),
}

#[derive(Debug)]
enum Slot {
    Pending,
    Loaded(AssetData),
    Failed(String),
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    kind: Option<AssetKind>,
    slot: Slot,
}

/// Outcome of one `load()` batch.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: Vec<(AssetRef, String)>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct AssetManager {
    root: PathBuf,
    entries: Vec<Entry>,
    by_path: HashMap<PathBuf, AssetRef>,
}

impl AssetManager {
    /// Creates a manager resolving relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the handle for `path`, registering it on first request.
    pub fn require_asset_ref(&mut self, path: impl AsRef<Path>) -> AssetRef {
        let path = path.as_ref();
        if let Some(existing) = self.by_path.get(path) {
            return *existing;
        }
        let r = AssetRef(self.entries.len() as u32);
        self.entries.push(Entry {
            path: path.to_path_buf(),
            kind: AssetKind::from_path(path),
            slot: Slot::Pending,
        });
        self.by_path.insert(path.to_path_buf(), r);
        r
    }

    /// Registers an in-memory mesh under `name`; it is available immediately.
    pub fn insert_mesh(&mut self, name: impl AsRef<Path>, mesh: MeshData) -> AssetRef {
        let r = self.require_asset_ref(name);
        let entry = &mut self.entries[r.0 as usize];
        entry.kind = Some(AssetKind::Mesh);
        entry.slot = Slot::Loaded(AssetData::Mesh(mesh));
        r
    }

    /// Registers an in-memory image under `name`; it is available immediately.
    pub fn insert_image(&mut self, name: impl AsRef<Path>, image: TextureData) -> AssetRef {
        let r = self.require_asset_ref(name);
        let entry = &mut self.entries[r.0 as usize];
        entry.kind = Some(AssetKind::Image);
        entry.slot = Slot::Loaded(AssetData::Image(image));
        r
    }

    /// Decodes every asset still pending.
    pub fn load(&mut self) -> LoadReport {
        let stopwatch = Stopwatch::start();
        let mut report = LoadReport::default();

        for (i, entry) in self.entries.iter_mut().enumerate() {
            if !matches!(entry.slot, Slot::Pending) {
                continue;
            }
            let r = AssetRef(i as u32);
            match load_entry(&self.root, entry) {
                Ok(data) => {
                    log::debug!("loaded {} ({})", entry.path.display(), r);
                    entry.slot = Slot::Loaded(data);
                    report.loaded += 1;
                }
                Err(err) => {
                    log::error!("failed to load {}: {err}", entry.path.display());
                    let reason = err.to_string();
                    entry.slot = Slot::Failed(reason.clone());
                    report.failed.push((r, reason));
                }
            }
        }

        report.elapsed = stopwatch.elapsed();
        log::info!(
            "asset load: {} loaded, {} failed in {:.1} ms",
            report.loaded,
            report.failed.len(),
            report.elapsed.as_secs_f64() * 1000.0
        );
        report
    }

    pub fn path(&self, r: AssetRef) -> Option<&Path> {
        self.entries.get(r.0 as usize).map(|e| e.path.as_path())
    }

    pub fn is_loaded(&self, r: AssetRef) -> bool {
        matches!(
            self.entries.get(r.0 as usize).map(|e| &e.slot),
            Some(Slot::Loaded(_))
        )
    }

    /// Reason the asset failed to load, if it did.
    pub fn failure(&self, r: AssetRef) -> Option<&str> {
        match &self.entries.get(r.0 as usize)?.slot {
            Slot::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn mesh(&self, r: AssetRef) -> Result<&MeshData, AssetError> {
        match self.data(r)? {
            AssetData::Mesh(m) => Ok(m),
            _ => Err(mismatch(r, AssetKind::Mesh)),
        }
    }

    pub fn image(&self, r: AssetRef) -> Result<&TextureData, AssetError> {
        match self.data(r)? {
            AssetData::Image(t) => Ok(t),
            _ => Err(mismatch(r, AssetKind::Image)),
        }
    }

    pub fn text(&self, r: AssetRef) -> Result<&str, AssetError> {
        match self.data(r)? {
            AssetData::Text(s) => Ok(s),
            _ => Err(mismatch(r, AssetKind::Text)),
        }
    }

    fn data(&self, r: AssetRef) -> Result<&AssetData, AssetError> {
        match self.entries.get(r.0 as usize).map(|e| &e.slot) {
            Some(Slot::Loaded(data)) => Ok(data),
            _ => Err(AssetError::NotLoaded(r)),
        }
    }
}

fn mismatch(asset: AssetRef, expected: AssetKind) -> AssetError {
    AssetError::KindMismatch {
        asset,
        expected: expected.name(),
    }
}

fn load_entry(root: &Path, entry: &Entry) -> Result<AssetData, AssetError> {
    let kind = entry
        .kind
        .ok_or_else(|| AssetError::UnknownKind(entry.path.clone()))?;
    let full = root.join(&entry.path);
    let bytes = std::fs::read(&full).map_err(|source| AssetError::Io {
        path: full.clone(),
        source,
    })?;

    match kind {
        AssetKind::Image => Ok(AssetData::Image(TextureData::decode(&bytes)?)),
        AssetKind::Mesh | AssetKind::Text => {
            let text = String::from_utf8(bytes).map_err(|e| AssetError::Io {
                path: full,
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
            if kind == AssetKind::Mesh {
                Ok(AssetData::Mesh(parse_obj(&text)?))
            } else {
                Ok(AssetData::Text(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ember-assets-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn refs_are_deduplicated_by_path() {
        let mut assets = AssetManager::new(".");
        let a = assets.require_asset_ref("models/pistol.obj");
        let b = assets.require_asset_ref("textures/pistol.png");
        let c = assets.require_asset_ref("models/pistol.obj");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(assets.path(b), Some(Path::new("textures/pistol.png")));
    }

    #[test]
    fn data_is_unavailable_before_load() {
        let mut assets = AssetManager::new(".");
        let r = assets.require_asset_ref("missing.obj");
        assert!(matches!(assets.mesh(r), Err(AssetError::NotLoaded(_))));
        assert!(!assets.is_loaded(r));
    }

    #[test]
    fn load_reads_meshes_and_text() {
        let dir = scratch_dir("load");
        std::fs::write(dir.join("tri.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "hello").unwrap();

        let mut assets = AssetManager::new(&dir);
        let mesh = assets.require_asset_ref("tri.obj");
        let text = assets.require_asset_ref("notes.txt");
        let report = assets.load();

        assert!(report.is_ok());
        assert_eq!(report.loaded, 2);
        assert_eq!(assets.mesh(mesh).unwrap().vertex_count(), 3);
        assert_eq!(assets.text(text).unwrap(), "hello");
        assert!(matches!(
            assets.image(mesh),
            Err(AssetError::KindMismatch { expected: "image", .. })
        ));

        // A second batch has nothing left to do.
        assert_eq!(assets.load().loaded, 0);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn failures_are_reported_not_fatal() {
        let dir = scratch_dir("fail");
        let mut assets = AssetManager::new(&dir);
        let missing = assets.require_asset_ref("nope.obj");
        let unknown = assets.require_asset_ref("data.bin");
        let inline = assets.insert_mesh("builtin/cube", MeshData::cube());

        let report = assets.load();
        assert_eq!(report.loaded, 0);
        assert_eq!(report.failed.len(), 2);
        assert!(assets.failure(missing).is_some());
        assert!(assets.failure(unknown).unwrap().contains("data.bin"));
        assert_eq!(assets.mesh(inline).unwrap().vertex_count(), 36);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn inserted_images_skip_loading() {
        let mut assets = AssetManager::new("unused");
        let r = assets.insert_image("generated/pattern", TextureData::solid(4, 2, [9, 9, 9, 255]));

        assert!(assets.is_loaded(r));
        assert_eq!(assets.image(r).unwrap().pixels.len(), 4 * 2 * 4);
        assert!(matches!(assets.mesh(r), Err(AssetError::KindMismatch { .. })));
        assert_eq!(assets.load().loaded, 0);
    }
}
