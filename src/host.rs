//! The host page: everything outside the scenes that the session drives.
//!
//! The session talks to the world through [`Host`]. The desktop runner
//! implements it on top of a window, and tests implement it with a
//! recorder. Operations on anchors that do not exist are skipped by the
//! caller after checking [`Host::has_anchor`].

use glam::Vec2;

use crate::hud::Eyelid;
use crate::overlay::{BarragePopup, OverlayKind};
use crate::scene::{RenderSurface, SceneId};

/// Page shown over everything while the world loads.
pub const LOADER_PAGE: &str = "loader.html";
/// Taskbar shown while the world is active.
pub const MAIN_HUD_PAGE: &str = "HUD.html";
/// Page projected onto the desk screen.
pub const EMBED_PAGE: &str = "desktop.html";

/// Named elements of the host page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anchor {
    Loader,
    Glitch,
    Eyelid(Eyelid),
    Indicator,
    MainHud,
    Overlay(OverlayKind),
    BarrageContainer,
}

/// Notifications from the host, delivered through the session queue.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// A CSS-style transition finished on an eyelid.
    TransitionEnd { eyelid: Eyelid, property: String },
    PointerCaptureChanged(bool),
    PointerCaptureError,
}

pub trait Host {
    fn has_anchor(&self, anchor: Anchor) -> bool;

    /// Viewport size in pixels.
    fn viewport(&self) -> Vec2;

    /// Create a fresh render surface for a scene. `None` means the
    /// container is missing or the context could not be created.
    fn create_surface(&mut self, scene: SceneId) -> Option<Box<dyn RenderSurface>>;

    /// Hard reload. Nothing after this call is expected to matter.
    fn reload(&mut self);

    fn set_loader(&mut self, visible: bool);
    fn set_glitch(&mut self, active: bool);
    /// Start the eyelid transition toward closed or open.
    fn set_eyelids(&mut self, closed: bool, duration: f32);
    fn set_indicator(&mut self, text: Option<&str>);
    fn set_main_hud(&mut self, visible: bool);

    fn request_pointer_capture(&mut self);
    fn release_pointer_capture(&mut self);

    fn load_overlay(&mut self, kind: OverlayKind, url: &str);
    fn unload_overlay(&mut self, kind: OverlayKind);
    fn spawn_barrage(&mut self, popup: &BarragePopup);
    /// Fade out and remove one barrage popup.
    fn dismiss_barrage(&mut self, id: u32);
}
