//! The two scenes and what they share.
//!
//! Each scene owns a [`SceneContext`]: its render surface, camera, scene
//! graph, the listeners it installed and the timers it armed. A context is
//! built once, torn down once, and never rendered after teardown.
//!
//! - [`desk`]: the room with the embedded page and the approaching model.
//! - [`world`]: the navigable world with the popups.

pub mod context;
pub mod desk;
pub mod graph;
pub mod world;

use std::fmt;

use glam::Vec3;

use crate::camera::Camera;

pub use context::{Listener, SceneContext};
pub use desk::DeskScene;
pub use graph::{DisposalReport, SceneGraph};
pub use world::WorldScene;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneId {
    Desk,
    World,
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneId::Desk => write!(f, "desk scene"),
            SceneId::World => write!(f, "world scene"),
        }
    }
}

/// A model drawn as a simple marker by the presenter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub emissive: Vec3,
}

/// Everything a render surface needs to draw one frame of a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneFrame {
    pub scene: SceneId,
    pub time: f32,
    pub camera: Camera,
    pub background: Vec3,
    /// Environment/background intensity, 0 to 1.
    pub environment: f32,
    pub light: f32,
    pub markers: Vec<Marker>,
    pub ground_grid: bool,
    /// Whether the embedded page is still projected.
    pub embed: bool,
}

/// A render target owned by one scene.
///
/// Released exactly once at teardown, after which the scene never calls it
/// again.
pub trait RenderSurface {
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, frame: &SceneFrame);
    /// Drop every GPU resource behind the surface.
    fn release(&mut self);
}
