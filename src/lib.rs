//! # Faceplug
//!
//! **A timed two-scene 3D experience.**
//!
//! A desk with an embedded page. When the page asks for it, the page goes
//! dark, a model approaches the camera, the screen glitches and the eyelids
//! close. Behind them the desk is torn down and a navigable world is built.
//! The eyes open on the world, popups start arriving, and a confirmed
//! payment ends in a barrage, a completion page and a reload.
//!
//! ## Quick Start
//!
//! ```no_run
//! use faceplug::{AppConfig, SessionConfig};
//!
//! fn main() -> Result<(), faceplug::RunError> {
//!     let session = SessionConfig::new().asset_root("assets").idle_timeout(120.0);
//!     faceplug::run(AppConfig::new().size(1280, 720).session(session))
//! }
//! ```
//!
//! ## Driving a session yourself
//!
//! [`Session`] does not need a window. Give it a [`Host`] and an
//! [`AssetLoader`], push events as they arrive and call
//! [`Session::tick`] with the current time once per frame:
//!
//! ```ignore
//! let mut session = Session::new(SessionConfig::default(), host, loader, 0.0, 7)?;
//! session.push_message(r#"{"type":"startTransitionGlitch"}"#);
//! session.tick(now);
//! ```
//!
//! The desk-to-world hand-over and the payment sequence are plain state
//! machines in [`orchestrator`], stepped by the session.

mod activity;
mod app;
mod assets;
mod camera;
mod config;
mod desktop;
mod error;
mod event;
mod gpu;
mod host;
mod hud;
mod input;
mod message;
mod navigation;
pub mod orchestrator;
mod overlay;
mod presenter;
pub mod scene;
mod session;
mod timer;
mod tween;

#[cfg(test)]
pub(crate) mod testing;

pub use activity::ActivityMonitor;
pub use app::{AppConfig, run};
pub use assets::{
    AssetLoader, AssetSender, CubemapAsset, FsAssetLoader, MaterialAsset, MaterialKind, MeshAsset,
    ModelAsset, PendingAsset, TextureSlot,
};
pub use camera::Camera;
pub use config::{
    AssetPaths, DeskConfig, FlickerConfig, NavigationConfig, OverlayTimings, PaymentTimings,
    SessionConfig, TransitionTimings, WorldConfig,
};
pub use desktop::{DesktopHost, SharedStage, Stage};
pub use error::{AssetError, GpuError, RunError, SceneError};
pub use event::{SessionEvent, TimerEvent};
pub use gpu::GpuContext;
pub use host::{Anchor, Host, HostEvent};
pub use hud::{CloseStart, Disruption, Eyelid, EyelidState, Eyelids};
pub use input::{InputEvent, InputTranslator};
pub use message::{Action, Message, MessageBridge, MessageKind};
pub use navigation::{FirstPersonController, Intent, LateralMapping};
pub use overlay::{BarragePopup, Completion, OverlayDescriptor, OverlayKind, OverlayManager};
pub use presenter::{HudLayer, HudPanel, Presenter};
pub use scene::{RenderSurface, SceneFrame, SceneId};
pub use session::Session;
pub use timer::{TimerId, Timers};
pub use tween::{Animation, Easing, Step, Tween};

// Re-export glam math types for convenience
pub use glam::{Vec2, Vec3};

// Re-export the winit key codes used by `InputEvent`
pub use winit::keyboard::KeyCode;
