//! Test doubles: a host that records every call and an asset loader the
//! test settles by hand.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::assets::{
    AssetLoader, AssetSender, CubemapAsset, MaterialAsset, MeshAsset, ModelAsset, PendingAsset,
};
use crate::error::AssetError;
use crate::host::{Anchor, Host};
use crate::overlay::{BarragePopup, OverlayKind};
use crate::scene::{RenderSurface, SceneFrame, SceneId};

#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    CreateSurface(SceneId),
    Reload,
    Loader(bool),
    Glitch(bool),
    Eyelids { closed: bool },
    Indicator(Option<String>),
    MainHud(bool),
    CapturePointer,
    ReleasePointer,
    LoadOverlay(OverlayKind, String),
    UnloadOverlay(OverlayKind),
    SpawnBarrage(u32),
    DismissBarrage(u32),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceLog {
    pub renders: usize,
    pub resizes: usize,
    pub released: bool,
    pub last_frame: Option<SceneFrame>,
}

type SurfaceLogs = Rc<RefCell<HashMap<SceneId, SurfaceLog>>>;

struct RecordingSurface {
    scene: SceneId,
    logs: SurfaceLogs,
}

impl RenderSurface for RecordingSurface {
    fn resize(&mut self, _width: u32, _height: u32) {
        self.logs.borrow_mut().entry(self.scene).or_default().resizes += 1;
    }

    fn render(&mut self, frame: &SceneFrame) {
        let mut logs = self.logs.borrow_mut();
        let log = logs.entry(self.scene).or_default();
        assert!(!log.released, "rendered {} after release", self.scene);
        log.renders += 1;
        log.last_frame = Some(frame.clone());
    }

    fn release(&mut self) {
        self.logs.borrow_mut().entry(self.scene).or_default().released = true;
    }
}

pub struct RecordingHost {
    pub calls: Vec<HostCall>,
    pub missing: HashSet<Anchor>,
    pub viewport: Vec2,
    pub surfaces_available: bool,
    surfaces: SurfaceLogs,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            missing: HashSet::new(),
            viewport: Vec2::new(1280.0, 720.0),
            surfaces_available: true,
            surfaces: Rc::default(),
        }
    }

    pub fn without(mut self, anchor: Anchor) -> Self {
        self.missing.insert(anchor);
        self
    }

    pub fn surface_log(&self, scene: SceneId) -> SurfaceLog {
        self.surfaces
            .borrow()
            .get(&scene)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, call: &HostCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &HostCall) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

impl Host for RecordingHost {
    fn has_anchor(&self, anchor: Anchor) -> bool {
        !self.missing.contains(&anchor)
    }

    fn viewport(&self) -> Vec2 {
        self.viewport
    }

    fn create_surface(&mut self, scene: SceneId) -> Option<Box<dyn RenderSurface>> {
        if !self.surfaces_available {
            return None;
        }
        self.calls.push(HostCall::CreateSurface(scene));
        self.surfaces.borrow_mut().insert(scene, SurfaceLog::default());
        Some(Box::new(RecordingSurface {
            scene,
            logs: Rc::clone(&self.surfaces),
        }))
    }

    fn reload(&mut self) {
        self.calls.push(HostCall::Reload);
    }

    fn set_loader(&mut self, visible: bool) {
        self.calls.push(HostCall::Loader(visible));
    }

    fn set_glitch(&mut self, active: bool) {
        self.calls.push(HostCall::Glitch(active));
    }

    fn set_eyelids(&mut self, closed: bool, _duration: f32) {
        self.calls.push(HostCall::Eyelids { closed });
    }

    fn set_indicator(&mut self, text: Option<&str>) {
        self.calls.push(HostCall::Indicator(text.map(str::to_owned)));
    }

    fn set_main_hud(&mut self, visible: bool) {
        self.calls.push(HostCall::MainHud(visible));
    }

    fn request_pointer_capture(&mut self) {
        self.calls.push(HostCall::CapturePointer);
    }

    fn release_pointer_capture(&mut self) {
        self.calls.push(HostCall::ReleasePointer);
    }

    fn load_overlay(&mut self, kind: OverlayKind, url: &str) {
        self.calls.push(HostCall::LoadOverlay(kind, url.to_owned()));
    }

    fn unload_overlay(&mut self, kind: OverlayKind) {
        self.calls.push(HostCall::UnloadOverlay(kind));
    }

    fn spawn_barrage(&mut self, popup: &BarragePopup) {
        self.calls.push(HostCall::SpawnBarrage(popup.id));
    }

    fn dismiss_barrage(&mut self, id: u32) {
        self.calls.push(HostCall::DismissBarrage(id));
    }
}

pub fn model(path: &str) -> ModelAsset {
    ModelAsset {
        path: path.to_owned(),
        meshes: vec![MeshAsset {
            name: path.trim_end_matches(".stl").to_owned(),
            vertex_count: 36,
            triangle_count: 12,
            material: MaterialAsset::default(),
        }],
        bounds_min: Vec3::splat(-1.0),
        bounds_max: Vec3::splat(1.0),
    }
}

/// Asset loader whose loads stay pending until the test settles them.
#[derive(Default)]
pub struct ScriptedLoader {
    models: HashMap<String, AssetSender<ModelAsset>>,
    cubemaps: HashMap<String, AssetSender<CubemapAsset>>,
    pub requested: Vec<String>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&mut self, path: &str) -> bool {
        self.resolve(path, Ok(model(path)))
    }

    pub fn fail(&mut self, path: &str) -> bool {
        self.resolve(path, Err(AssetError::UnsupportedFormat("test".into())))
    }

    pub fn resolve(&mut self, path: &str, result: Result<ModelAsset, AssetError>) -> bool {
        match self.models.remove(path) {
            Some(tx) => {
                tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn succeed_cubemap(&mut self, dir: &str) -> bool {
        self.resolve_cubemap(
            dir,
            Ok(CubemapAsset {
                face_size: (16, 16),
                average: Vec3::new(0.2, 0.3, 0.5),
            }),
        )
    }

    pub fn fail_cubemap(&mut self, dir: &str) -> bool {
        self.resolve_cubemap(dir, Err(AssetError::decode(dir, "test")))
    }

    fn resolve_cubemap(&mut self, dir: &str, result: Result<CubemapAsset, AssetError>) -> bool {
        match self.cubemaps.remove(dir) {
            Some(tx) => {
                tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, path: &str) -> bool {
        self.models.contains_key(path) || self.cubemaps.contains_key(path)
    }
}

impl AssetLoader for ScriptedLoader {
    fn load_model(&mut self, path: &str) -> PendingAsset<ModelAsset> {
        let (tx, pending) = PendingAsset::channel(path);
        self.models.insert(path.to_owned(), tx);
        self.requested.push(path.to_owned());
        pending
    }

    fn load_cubemap(&mut self, dir: &str, _faces: &[String; 6]) -> PendingAsset<CubemapAsset> {
        let (tx, pending) = PendingAsset::channel(dir);
        self.cubemaps.insert(dir.to_owned(), tx);
        self.requested.push(dir.to_owned());
        pending
    }
}
