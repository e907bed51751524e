//! The host page for the desktop runner.
//!
//! [`DesktopHost`] keeps the HUD state the session drives (eyelids, glitch,
//! loader, overlays, barrage) and turns it into a [`HudLayer`] each frame.
//! Scene surfaces write their latest frame into a shared [`Stage`] which
//! the presenter reads. Requests that need the window (pointer capture,
//! title, reload) are queued here and applied by the app loop.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use log::{debug, info};

use crate::host::{Anchor, Host, HostEvent};
use crate::hud::{EYELID_PROPERTY, Eyelid};
use crate::overlay::{BarragePopup, OverlayKind};
use crate::presenter::{HudLayer, HudPanel};
use crate::scene::{RenderSurface, SceneFrame, SceneId};

/// The embedded page occupies this fraction of the window, centred.
const EMBED_FRACTION: f32 = 0.4;
const MAIN_HUD_HEIGHT: f32 = 40.0;

/// The frame most recently submitted by a live scene surface.
#[derive(Debug, Default)]
pub struct Stage {
    pub frame: Option<SceneFrame>,
    pub size: (u32, u32),
}

pub type SharedStage = Rc<RefCell<Stage>>;

/// A scene's handle onto the shared stage.
struct StageSurface {
    scene: SceneId,
    stage: SharedStage,
    released: bool,
}

impl RenderSurface for StageSurface {
    fn resize(&mut self, width: u32, height: u32) {
        if !self.released {
            self.stage.borrow_mut().size = (width, height);
        }
    }

    fn render(&mut self, frame: &SceneFrame) {
        if !self.released {
            self.stage.borrow_mut().frame = Some(frame.clone());
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut stage = self.stage.borrow_mut();
        if stage.frame.as_ref().is_some_and(|f| f.scene == self.scene) {
            stage.frame = None;
        }
        debug!("released stage surface for {}", self.scene);
    }
}

/// A running eyelid height transition, 0 open to 1 closed.
#[derive(Clone, Copy, Debug)]
struct LidMotion {
    from: f32,
    to: f32,
    started: f32,
    duration: f32,
    reported: bool,
}

impl LidMotion {
    fn value(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = ((now - self.started) / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn finished(&self, now: f32) -> bool {
        now - self.started >= self.duration
    }
}

pub fn embed_rect(viewport: Vec2) -> [f32; 4] {
    let size = viewport * EMBED_FRACTION;
    let origin = (viewport - size) * 0.5;
    [origin.x, origin.y, size.x, size.y]
}

pub fn embed_contains(viewport: Vec2, point: Vec2) -> bool {
    let [x, y, w, h] = embed_rect(viewport);
    point.x >= x && point.x <= x + w && point.y >= y && point.y <= y + h
}

fn overlay_panel(kind: OverlayKind, viewport: Vec2) -> HudPanel {
    let (size, color) = match kind {
        OverlayKind::Ad => (Vec2::new(0.5, 0.5), [0.95, 0.75, 0.2, 0.95]),
        OverlayKind::Subscription => (Vec2::new(0.6, 0.6), [0.3, 0.6, 0.95, 0.95]),
        OverlayKind::CardEntry => (Vec2::new(0.45, 0.55), [0.9, 0.9, 0.92, 0.97]),
        OverlayKind::ApparelAd => (Vec2::new(0.3, 0.4), [0.85, 0.3, 0.6, 0.95]),
        OverlayKind::Completion => (Vec2::ONE, [0.05, 0.05, 0.08, 1.0]),
    };
    let size = viewport * size;
    let origin = match kind {
        OverlayKind::ApparelAd => Vec2::new(viewport.x - size.x - 20.0, 20.0),
        _ => (viewport - size) * 0.5,
    };
    HudPanel {
        rect: [origin.x, origin.y, size.x, size.y],
        color,
    }
}

pub struct DesktopHost {
    now: f32,
    viewport: Vec2,
    stage: SharedStage,
    loader: bool,
    glitch: bool,
    lids: LidMotion,
    indicator: Option<String>,
    title_changed: bool,
    main_hud: bool,
    overlays: Vec<(OverlayKind, String)>,
    barrage: Vec<BarragePopup>,
    capture_request: Option<bool>,
    reload: bool,
}

impl DesktopHost {
    pub fn new(viewport: Vec2, stage: SharedStage) -> Self {
        Self {
            now: 0.0,
            viewport,
            stage,
            loader: false,
            glitch: false,
            lids: LidMotion {
                from: 0.0,
                to: 0.0,
                started: 0.0,
                duration: 0.0,
                reported: true,
            },
            indicator: None,
            title_changed: false,
            main_hud: false,
            overlays: Vec::new(),
            barrage: Vec::new(),
            capture_request: None,
            reload: false,
        }
    }

    /// Move the host clock forward. Returns the transition-end reports of
    /// any eyelid motion that finished, one per eyelid.
    pub fn advance(&mut self, now: f32) -> Vec<HostEvent> {
        self.now = now;
        if self.lids.reported || !self.lids.finished(now) {
            return Vec::new();
        }
        self.lids.reported = true;
        [Eyelid::Top, Eyelid::Bottom]
            .into_iter()
            .map(|eyelid| HostEvent::TransitionEnd {
                eyelid,
                property: EYELID_PROPERTY.to_owned(),
            })
            .collect()
    }

    pub fn set_viewport(&mut self, viewport: Vec2) {
        self.viewport = viewport;
    }

    pub fn take_capture_request(&mut self) -> Option<bool> {
        self.capture_request.take()
    }

    pub fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload)
    }

    /// The indicator text, once per change.
    pub fn take_indicator(&mut self) -> Option<Option<String>> {
        if std::mem::take(&mut self.title_changed) {
            Some(self.indicator.clone())
        } else {
            None
        }
    }

    pub fn visible_overlays(&self) -> impl Iterator<Item = OverlayKind> + '_ {
        self.overlays.iter().map(|(kind, _)| *kind)
    }

    pub fn hud_layer(&self, embed: bool) -> HudLayer {
        let mut panels = Vec::new();
        if embed {
            panels.push(HudPanel {
                rect: embed_rect(self.viewport),
                color: [0.12, 0.16, 0.3, 0.85],
            });
        }
        if self.main_hud {
            panels.push(HudPanel {
                rect: [
                    0.0,
                    self.viewport.y - MAIN_HUD_HEIGHT,
                    self.viewport.x,
                    MAIN_HUD_HEIGHT,
                ],
                color: [0.15, 0.15, 0.18, 0.9],
            });
        }
        for (kind, _) in &self.overlays {
            panels.push(overlay_panel(*kind, self.viewport));
        }
        for popup in &self.barrage {
            panels.push(HudPanel {
                rect: [popup.position.x, popup.position.y, popup.size.x, popup.size.y],
                color: [0.9, 0.2, 0.2, 0.9],
            });
        }
        HudLayer {
            eyelids: self.lids.value(self.now),
            glitch: self.glitch,
            loader: self.loader,
            panels,
        }
    }
}

impl Host for DesktopHost {
    fn has_anchor(&self, _anchor: Anchor) -> bool {
        true
    }

    fn viewport(&self) -> Vec2 {
        self.viewport
    }

    fn create_surface(&mut self, scene: SceneId) -> Option<Box<dyn RenderSurface>> {
        self.stage.borrow_mut().frame = None;
        Some(Box::new(StageSurface {
            scene,
            stage: Rc::clone(&self.stage),
            released: false,
        }))
    }

    fn reload(&mut self) {
        info!("reload requested");
        self.reload = true;
    }

    fn set_loader(&mut self, visible: bool) {
        self.loader = visible;
    }

    fn set_glitch(&mut self, active: bool) {
        self.glitch = active;
    }

    fn set_eyelids(&mut self, closed: bool, duration: f32) {
        self.lids = LidMotion {
            from: self.lids.value(self.now),
            to: if closed { 1.0 } else { 0.0 },
            started: self.now,
            duration,
            reported: false,
        };
    }

    fn set_indicator(&mut self, text: Option<&str>) {
        let text = text.map(str::to_owned);
        if text != self.indicator {
            self.indicator = text;
            self.title_changed = true;
        }
    }

    fn set_main_hud(&mut self, visible: bool) {
        self.main_hud = visible;
    }

    fn request_pointer_capture(&mut self) {
        self.capture_request = Some(true);
    }

    fn release_pointer_capture(&mut self) {
        self.capture_request = Some(false);
    }

    fn load_overlay(&mut self, kind: OverlayKind, url: &str) {
        self.overlays.retain(|(k, _)| *k != kind);
        self.overlays.push((kind, url.to_owned()));
        info!("overlay {kind:?} -> {url}");
    }

    fn unload_overlay(&mut self, kind: OverlayKind) {
        self.overlays.retain(|(k, _)| *k != kind);
    }

    fn spawn_barrage(&mut self, popup: &BarragePopup) {
        self.barrage.push(popup.clone());
    }

    fn dismiss_barrage(&mut self, id: u32) {
        self.barrage.retain(|p| p.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use glam::Vec3;

    fn host() -> DesktopHost {
        DesktopHost::new(Vec2::new(1000.0, 500.0), SharedStage::default())
    }

    fn frame(scene: SceneId) -> SceneFrame {
        SceneFrame {
            scene,
            time: 0.0,
            camera: Camera::new(),
            background: Vec3::ZERO,
            environment: 1.0,
            light: 1.0,
            markers: Vec::new(),
            ground_grid: false,
            embed: false,
        }
    }

    #[test]
    fn eyelids_report_both_lids_once() {
        let mut host = host();
        host.advance(1.0);
        host.set_eyelids(true, 1.5);
        assert!(host.advance(2.0).is_empty());
        assert!((host.hud_layer(false).eyelids - 2.0 / 3.0).abs() < 1e-5);

        let events = host.advance(2.5);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(
            e,
            HostEvent::TransitionEnd { property, .. } if property == EYELID_PROPERTY
        )));
        assert!(host.advance(3.0).is_empty());
        assert_eq!(host.hud_layer(false).eyelids, 1.0);
    }

    #[test]
    fn released_surface_clears_its_frame_only() {
        let stage = SharedStage::default();
        let mut host = DesktopHost::new(Vec2::new(100.0, 100.0), Rc::clone(&stage));
        let mut desk = host.create_surface(SceneId::Desk).unwrap();
        desk.render(&frame(SceneId::Desk));
        let mut world = host.create_surface(SceneId::World).unwrap();
        world.render(&frame(SceneId::World));

        desk.release();
        assert_eq!(stage.borrow().frame.as_ref().map(|f| f.scene), Some(SceneId::World));
        desk.render(&frame(SceneId::Desk));
        assert_eq!(stage.borrow().frame.as_ref().map(|f| f.scene), Some(SceneId::World));
        world.release();
        assert!(stage.borrow().frame.is_none());
    }

    #[test]
    fn overlays_and_barrage_become_panels() {
        let mut host = host();
        host.set_main_hud(true);
        host.load_overlay(OverlayKind::Ad, "hudpopup.html");
        host.spawn_barrage(&BarragePopup {
            id: 3,
            position: Vec2::new(10.0, 20.0),
            size: Vec2::new(300.0, 200.0),
            url: "random_popup.html",
            interactive: false,
        });
        let layer = host.hud_layer(false);
        assert_eq!(layer.panels.len(), 3);
        assert_eq!(layer.panels[2].rect, [10.0, 20.0, 300.0, 200.0]);

        host.dismiss_barrage(3);
        host.unload_overlay(OverlayKind::Ad);
        assert_eq!(host.hud_layer(false).panels.len(), 1);
    }

    #[test]
    fn indicator_changes_are_reported_once() {
        let mut host = host();
        host.set_indicator(Some("Click to move camera"));
        assert_eq!(host.take_indicator(), Some(Some("Click to move camera".into())));
        assert_eq!(host.take_indicator(), None);
        host.set_indicator(Some("Click to move camera"));
        assert_eq!(host.take_indicator(), None);
    }

    #[test]
    fn embed_region_is_centred() {
        let viewport = Vec2::new(1000.0, 500.0);
        assert!(embed_contains(viewport, viewport * 0.5));
        assert!(!embed_contains(viewport, Vec2::new(10.0, 10.0)));
    }
}
