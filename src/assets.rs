//! Asynchronous asset loading.
//!
//! Loads are started through an [`AssetLoader`] and surface as
//! [`PendingAsset`] handles that the owning scene polls once per frame.
//! The filesystem loader decodes on a worker thread; nothing it produces is
//! touched outside the frame tick.

use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use glam::Vec3;
use log::debug;

use crate::error::AssetError;

/// The material model an asset asks for. Emissive tinting only applies to
/// lit materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    Basic,
    Standard,
    Physical,
}

impl MaterialKind {
    pub fn is_lit(self) -> bool {
        matches!(self, MaterialKind::Standard | MaterialKind::Physical)
    }
}

/// Texture slots a material can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Map,
    LightMap,
    BumpMap,
    NormalMap,
    SpecularMap,
    EnvMap,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialAsset {
    pub kind: MaterialKind,
    pub color: Vec3,
    pub textures: Vec<TextureSlot>,
}

impl Default for MaterialAsset {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Standard,
            color: Vec3::splat(0.8),
            textures: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub material: MaterialAsset,
}

/// A decoded model: its meshes and an axis-aligned bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelAsset {
    pub path: String,
    pub meshes: Vec<MeshAsset>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl ModelAsset {
    pub fn center(&self) -> Vec3 {
        (self.bounds_min + self.bounds_max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.bounds_max - self.bounds_min
    }

    /// Decode an STL model (binary or ASCII).
    pub fn from_stl<R: Read + Seek>(path: &str, reader: &mut R) -> Result<Self, AssetError> {
        let stl = stl_io::read_stl(reader).map_err(|e| AssetError::decode(path, e))?;
        if stl.faces.is_empty() {
            return Err(AssetError::decode(path, "model has no triangles"));
        }

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for vertex in &stl.vertices {
            let position: [f32; 3] = (*vertex).into();
            let position = Vec3::from(position);
            min = min.min(position);
            max = max.max(position);
        }

        let name = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_owned());

        Ok(Self {
            path: path.to_owned(),
            meshes: vec![MeshAsset {
                name,
                vertex_count: stl.faces.len() * 3,
                triangle_count: stl.faces.len(),
                material: MaterialAsset::default(),
            }],
            bounds_min: min,
            bounds_max: max,
        })
    }

    pub fn from_stl_bytes(path: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        Self::from_stl(path, &mut Cursor::new(bytes))
    }
}

/// Six decoded cubemap faces, kept as their size and average colour.
#[derive(Clone, Debug, PartialEq)]
pub struct CubemapAsset {
    pub face_size: (u32, u32),
    pub average: Vec3,
}

impl CubemapAsset {
    pub fn from_faces(dir: &str, faces: &[image::RgbaImage]) -> Result<Self, AssetError> {
        let Some(first) = faces.first() else {
            return Err(AssetError::decode(dir, "cubemap has no faces"));
        };
        let size = first.dimensions();
        if faces.iter().any(|f| f.dimensions() != size) {
            return Err(AssetError::decode(dir, "cubemap faces differ in size"));
        }

        let mut sum = Vec3::ZERO;
        let mut count = 0u64;
        for face in faces {
            // Every 16th pixel is plenty for a tint.
            for pixel in face.pixels().step_by(16) {
                sum += Vec3::new(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
                count += 1;
            }
        }
        let average = if count > 0 {
            sum / (count as f32 * 255.0)
        } else {
            Vec3::ZERO
        };

        Ok(Self {
            face_size: size,
            average,
        })
    }
}

/// Sending half of a pending asset.
pub struct AssetSender<T>(Sender<Result<T, AssetError>>);

impl<T> AssetSender<T> {
    /// Settle the asset. Dropping the sender instead settles it with
    /// [`AssetError::Disconnected`].
    pub fn send(self, result: Result<T, AssetError>) {
        // The receiver may already be gone if its scene was torn down.
        let _ = self.0.send(result);
    }
}

/// An asset load in flight.
///
/// Poll it once per frame. It yields its result exactly once.
pub struct PendingAsset<T> {
    label: String,
    rx: Option<Receiver<Result<T, AssetError>>>,
}

impl<T> PendingAsset<T> {
    pub fn channel(label: impl Into<String>) -> (AssetSender<T>, Self) {
        let (tx, rx) = mpsc::channel();
        (
            AssetSender(tx),
            Self {
                label: label.into(),
                rx: Some(rx),
            },
        )
    }

    /// An asset that is already settled.
    pub fn ready(label: impl Into<String>, result: Result<T, AssetError>) -> Self {
        let (tx, pending) = Self::channel(label);
        tx.send(result);
        pending
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_settled(&self) -> bool {
        self.rx.is_none()
    }

    /// Returns the result the first time the load has settled, `None`
    /// while it is still running and after the result was taken.
    pub fn poll(&mut self) -> Option<Result<T, AssetError>> {
        let rx = self.rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(AssetError::Disconnected(self.label.clone())),
        };
        self.rx = None;
        Some(result)
    }
}

/// Starts asset loads.
pub trait AssetLoader {
    fn load_model(&mut self, path: &str) -> PendingAsset<ModelAsset>;
    fn load_cubemap(&mut self, dir: &str, faces: &[String; 6]) -> PendingAsset<CubemapAsset>;
}

/// Loads models and cubemaps from disk on worker threads.
#[derive(Clone, Debug)]
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_model(path: &Path, label: &str) -> Result<ModelAsset, AssetError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("stl") => {
                let file = std::fs::File::open(path).map_err(|e| AssetError::io(label, e))?;
                ModelAsset::from_stl(label, &mut BufReader::new(file))
            }
            other => Err(AssetError::UnsupportedFormat(
                other.unwrap_or_default().to_owned(),
            )),
        }
    }

    fn read_cubemap(dir: &Path, faces: &[String; 6], label: &str) -> Result<CubemapAsset, AssetError> {
        let mut images = Vec::with_capacity(6);
        for face in faces {
            let path = dir.join(face);
            let image = image::open(&path)
                .map_err(|e| AssetError::decode(path.display().to_string(), e))?
                .to_rgba8();
            images.push(image);
        }
        CubemapAsset::from_faces(label, &images)
    }
}

impl AssetLoader for FsAssetLoader {
    fn load_model(&mut self, path: &str) -> PendingAsset<ModelAsset> {
        let (tx, pending) = PendingAsset::channel(path);
        let full = self.root.join(path);
        let label = path.to_owned();
        debug!("loading model {}", full.display());
        thread::spawn(move || tx.send(Self::read_model(&full, &label)));
        pending
    }

    fn load_cubemap(&mut self, dir: &str, faces: &[String; 6]) -> PendingAsset<CubemapAsset> {
        let (tx, pending) = PendingAsset::channel(dir);
        let full = self.root.join(dir);
        let faces = faces.clone();
        let label = dir.to_owned();
        debug!("loading cubemap {}", full.display());
        thread::spawn(move || tx.send(Self::read_cubemap(&full, &faces, &label)));
        pending
    }
}
