//! Scene B: the navigable world.
//!
//! Readiness waits for two model loads. The world model is required; the
//! inside model may fail without blocking anything. The cubemap loads on
//! the side and only affects the background.

use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use winit::keyboard::KeyCode;

use super::context::{Listener, SceneContext};
use super::graph::{DisposalReport, Emissive, Light, LightKind, Role};
use super::{Marker, SceneFrame, SceneId};
use crate::assets::{AssetLoader, CubemapAsset, ModelAsset, PendingAsset};
use crate::camera::Camera;
use crate::config::{PaymentTimings, SessionConfig, WorldConfig};
use crate::error::SceneError;
use crate::event::TimerEvent;
use crate::host::{Anchor, Host};
use crate::navigation::FirstPersonController;
use crate::timer::{TimerId, Timers};
use crate::tween::{Animation, Tween};

const SKY_LIGHT: Vec3 = Vec3::new(0.0, 50.0, 0.0);
const SUN_LIGHT: Vec3 = Vec3::new(10.0, 20.0, 15.0);

/// A required or optional model load and whether it has settled.
struct ModelLoad {
    path: String,
    pending: PendingAsset<ModelAsset>,
    settled: bool,
}

impl ModelLoad {
    fn start(loader: &mut dyn AssetLoader, path: &str) -> Self {
        Self {
            path: path.to_owned(),
            pending: loader.load_model(path),
            settled: false,
        }
    }
}

pub struct WorldScene {
    ctx: SceneContext,
    config: WorldConfig,
    payment: PaymentTimings,
    nav: FirstPersonController,
    world: Option<ModelLoad>,
    inside: Option<ModelLoad>,
    cubemap: Option<PendingAsset<CubemapAsset>>,
    world_error: Option<SceneError>,
    readiness_reported: bool,
    background: Vec3,
    environment: f32,
    brighten: Option<Animation<f32>>,
    descent: Option<Animation<f32>>,
    emissive_applied: bool,
    indicator_timer: Option<TimerId>,
    indicator_visible: bool,
    main_hud: bool,
    last_update: Option<f32>,
}

impl WorldScene {
    /// Create the surface, camera, lights and listeners, show the taskbar,
    /// arm the indicator reveal and start the loads.
    pub fn build(
        config: &SessionConfig,
        now: f32,
        host: &mut dyn Host,
        loader: &mut dyn AssetLoader,
        timers: &mut Timers<TimerEvent>,
    ) -> Result<Self, SceneError> {
        let world = config.world.clone();
        let camera = Camera::new()
            .at(world.camera_start)
            .with_fov(world.fov)
            .clip_planes(0.1, world.far);
        let mut ctx = SceneContext::create(SceneId::World, camera, host)?;
        let viewport = host.viewport();
        ctx.camera.set_aspect(viewport.x as u32, viewport.y as u32);

        ctx.graph.spawn_light(
            "sky",
            Light {
                kind: LightKind::Hemisphere,
                intensity: world.hemisphere_intensity,
                shadow_map: None,
            },
            SKY_LIGHT,
        );
        ctx.graph.spawn_light(
            "sun",
            Light {
                kind: LightKind::Directional,
                intensity: world.directional_intensity,
                shadow_map: Some(world.shadow_map_size),
            },
            SUN_LIGHT,
        );

        for listener in [
            Listener::Activity,
            Listener::Resize,
            Listener::Pointer,
            Listener::Keyboard,
            Listener::PointerCapture,
        ] {
            ctx.listen(listener);
        }

        let indicator_timer = if host.has_anchor(Anchor::Indicator) {
            Some(ctx.arm(
                now,
                config.navigation.indicator_delay,
                TimerEvent::IndicatorReveal,
                timers,
            ))
        } else {
            warn!("capture indicator missing");
            None
        };

        let main_hud = host.has_anchor(Anchor::MainHud);
        if main_hud {
            host.set_main_hud(true);
        } else {
            warn!("main HUD anchor missing, no taskbar");
        }

        let paths = &config.assets;
        let mut scene = Self {
            nav: FirstPersonController::new(world.camera_start, config.navigation.clone()),
            world: Some(ModelLoad::start(loader, &paths.world)),
            inside: Some(ModelLoad::start(loader, &paths.inside)),
            cubemap: Some(loader.load_cubemap(&paths.cubemap_dir, &paths.cubemap_faces)),
            background: world.background,
            ctx,
            config: world,
            payment: config.payment.clone(),
            world_error: None,
            readiness_reported: false,
            environment: 0.0,
            brighten: None,
            descent: None,
            emissive_applied: false,
            indicator_timer,
            indicator_visible: false,
            main_hud,
            last_update: None,
        };
        scene.ctx.activate();
        info!("world scene built, waiting for models");
        Ok(scene)
    }

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn is_disposed(&self) -> bool {
        self.ctx.is_disposed()
    }

    pub fn navigation(&self) -> &FirstPersonController {
        &self.nav
    }

    pub fn background(&self) -> Vec3 {
        self.background
    }

    pub fn environment_intensity(&self) -> f32 {
        self.environment
    }

    pub fn emissive_applied(&self) -> bool {
        self.emissive_applied
    }

    pub fn inside_position(&self) -> Option<Vec3> {
        self.ctx.graph.position(Role::InsideModel)
    }

    pub fn indicator_visible(&self) -> bool {
        self.indicator_visible
    }

    /// Poll the loads. Returns the readiness result exactly once, when the
    /// world and inside loads have both settled.
    pub fn poll(&mut self) -> Option<Result<(), SceneError>> {
        if self.ctx.is_disposed() {
            return None;
        }
        self.poll_cubemap();

        if let Some(load) = self.world.as_mut().filter(|l| !l.settled) {
            if let Some(result) = load.pending.poll() {
                load.settled = true;
                match result {
                    Ok(model) => {
                        self.ctx.graph.spawn_model(Role::WorldModel, &model, Vec3::ZERO);
                        debug!("world model added");
                    }
                    Err(source) => {
                        self.world_error = Some(SceneError::RequiredAsset {
                            path: load.path.clone(),
                            source,
                        });
                    }
                }
            }
        }

        if let Some(load) = self.inside.as_mut().filter(|l| !l.settled) {
            if let Some(result) = load.pending.poll() {
                load.settled = true;
                match result {
                    Ok(model) => {
                        self.ctx.graph.spawn_model(Role::InsideModel, &model, Vec3::ZERO);
                        debug!("inside model added");
                    }
                    Err(err) => warn!("continuing without {}: {err}", load.path),
                }
            }
        }

        let settled = |load: &Option<ModelLoad>| load.as_ref().is_none_or(|l| l.settled);
        if self.readiness_reported || !settled(&self.world) || !settled(&self.inside) {
            return None;
        }
        self.readiness_reported = true;
        Some(match self.world_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        })
    }

    fn poll_cubemap(&mut self) {
        let Some(result) = self.cubemap.as_mut().and_then(PendingAsset::poll) else {
            return;
        };
        self.cubemap = None;
        match result {
            Ok(cubemap) => {
                self.background = cubemap.average;
                self.ctx.graph.spawn_environment(cubemap.face_size);
                debug!("environment map loaded");
            }
            Err(err) => {
                warn!("environment map failed, using a flat background: {err}");
                self.background = self.config.fallback_background;
            }
        }
    }

    /// A click on the render surface asks for pointer capture. The capture
    /// only takes effect once the host reports it.
    pub fn click(&mut self, host: &mut dyn Host) {
        if !self.nav.is_captured() {
            host.request_pointer_capture();
        }
    }

    pub fn capture_changed(&mut self, captured: bool, host: &mut dyn Host) {
        self.nav.set_captured(captured);
        debug!("pointer capture {}", if captured { "on" } else { "off" });
        if self.indicator_visible {
            host.set_indicator(Some(self.nav.indicator_text()));
        }
    }

    pub fn capture_failed(&mut self) {
        warn!("pointer capture request was refused");
    }

    pub fn key(&mut self, key: KeyCode, pressed: bool) -> bool {
        self.nav.key(key, pressed)
    }

    pub fn look(&mut self, delta: Vec2) {
        self.nav.look(delta);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    /// Handle a scene-owned timer. Returns `false` if it is not ours.
    pub fn timer_fired(&mut self, id: TimerId, event: TimerEvent, host: &mut dyn Host) -> bool {
        if !self.ctx.timer_fired(id) {
            return false;
        }
        if event == TimerEvent::IndicatorReveal && self.indicator_timer == Some(id) {
            self.indicator_timer = None;
            self.indicator_visible = true;
            host.set_indicator(Some(self.nav.indicator_text()));
        }
        true
    }

    /// Start brightening the environment and lowering the inside model,
    /// both at once. Returns `false` if they were already started.
    pub fn start_payment_effects(&mut self, now: f32) -> bool {
        if self.brighten.is_some() {
            return false;
        }
        self.brighten = Some(Animation::new(Tween::new(
            self.environment,
            1.0,
            now,
            self.payment.brighten_duration,
        )));
        match self.inside_position() {
            Some(start) => {
                self.descent = Some(Animation::new(Tween::new(
                    start.y,
                    self.payment.descent_target_y,
                    now,
                    self.payment.descent_duration,
                )));
            }
            None => warn!("inside model missing, nothing to lower"),
        }
        info!("payment effects started");
        true
    }

    /// Advance navigation and the payment effects, then place the camera.
    pub fn update(&mut self, now: f32) {
        if self.ctx.is_disposed() {
            return;
        }
        let dt = self.last_update.map_or(0.0, |last| (now - last).max(0.0));
        self.last_update = Some(now);

        if let Some(brighten) = self.brighten.as_mut() {
            self.environment = brighten.advance(now).value;
        }

        if let Some(descent) = self.descent.as_mut() {
            let step = descent.advance(now);
            if let Some(mut position) = self.inside_position() {
                position.y = step.value;
                self.ctx.graph.set_position(Role::InsideModel, position);
            }
            if step.just_completed && !self.emissive_applied {
                let changed = self.ctx.graph.apply_emissive(
                    Role::InsideModel,
                    Emissive {
                        color: self.payment.emissive_color,
                        intensity: self.payment.emissive_intensity,
                    },
                );
                self.emissive_applied = true;
                info!("inside model settled, emissive applied to {changed} materials");
            }
        }

        self.nav.update(dt);
        self.nav.apply(&mut self.ctx.camera);
    }

    pub fn frame(&self, now: f32) -> SceneFrame {
        let mut markers = Vec::new();
        if let Some(position) = self.inside_position() {
            let emissive = self
                .ctx
                .graph
                .emissive(Role::InsideModel)
                .map_or(Vec3::ZERO, |e| e.color * e.intensity);
            markers.push(Marker {
                position,
                radius: 3.0,
                color: Vec3::new(0.35, 0.4, 0.45),
                emissive,
            });
        }
        SceneFrame {
            scene: SceneId::World,
            time: now,
            camera: self.ctx.camera,
            background: self.background,
            environment: self.environment,
            light: 1.0,
            markers,
            ground_grid: self.ctx.graph.has_role(Role::WorldModel),
            embed: false,
        }
    }

    pub fn render(&mut self, now: f32) -> bool {
        let frame = self.frame(now);
        self.ctx.render(&frame)
    }

    /// Hide the taskbar and indicator, let go of the pointer and dispose
    /// the scene. Overlays are the caller's to hide.
    pub fn teardown(&mut self, host: &mut dyn Host, timers: &mut Timers<TimerEvent>) -> DisposalReport {
        if self.ctx.is_disposed() {
            return DisposalReport::default();
        }
        if self.main_hud {
            host.set_main_hud(false);
            self.main_hud = false;
        }
        if self.indicator_visible {
            host.set_indicator(None);
            self.indicator_visible = false;
        }
        if self.nav.is_captured() {
            host.release_pointer_capture();
            self.nav.set_captured(false);
        }
        self.world = None;
        self.inside = None;
        self.cubemap = None;
        self.brighten = None;
        self.descent = None;
        self.indicator_timer = None;
        self.ctx.teardown(timers)
    }
}
