//! Error types for scene construction, asset loading and GPU setup.
//!
//! Only construction-time failures are errors. Missing host anchors and
//! failed optional assets are logged and swallowed where they happen.

use thiserror::Error;

use crate::scene::SceneId;

/// Failure while loading or decoding an asset.
///
/// Cloneable so a single failed load can be reported to the log and kept
/// on the pending handle at the same time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("io error reading '{path}': {message}")]
    Io { path: String, message: String },
    #[error("failed to decode '{path}': {message}")]
    Decode { path: String, message: String },
    #[error("unsupported asset format '{0}'")]
    UnsupportedFormat(String),
    #[error("loader for '{0}' went away before the asset settled")]
    Disconnected(String),
}

impl AssetError {
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn decode(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failure to construct a scene or to bring it to readiness.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// The host could not provide a render surface. Construction is
    /// rejected before anything else is created.
    #[error("no render surface available for {0}")]
    SurfaceUnavailable(SceneId),
    /// A model the scene cannot exist without failed to load.
    #[error("required asset '{path}' failed: {source}")]
    RequiredAsset {
        path: String,
        #[source]
        source: AssetError,
    },
}

/// Failure while bringing up the wgpu device and window surface.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

/// Failure that ends the desktop runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}
