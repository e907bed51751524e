//! Scene A: the desk, the room around it and the page on the screen.

use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use rand::Rng;

use super::context::{Listener, SceneContext};
use super::graph::{DisposalReport, Light, LightKind, Role};
use super::{Marker, SceneFrame, SceneId};
use crate::assets::{AssetLoader, ModelAsset, PendingAsset};
use crate::camera::Camera;
use crate::config::{DeskConfig, SessionConfig, TransitionTimings};
use crate::error::SceneError;
use crate::event::TimerEvent;
use crate::host::Host;
use crate::timer::{TimerId, Timers};
use crate::tween::{Animation, Easing, Tween};

const OVERHEAD_LIGHT: Vec3 = Vec3::new(0.0, 5.0, 2.0);
const EMBED_DEPTH_OFFSET: f32 = 0.02;
/// Fraction of the gap closed per frame when the light settles back.
const LIGHT_RETURN: f32 = 0.1;

/// Overhead light flicker. Each check toggles flickering with a small
/// probability; a flicker also ends on its own after a fixed duration.
#[derive(Debug, Default)]
struct Flicker {
    active: bool,
    end: Option<TimerId>,
}

pub struct DeskScene {
    ctx: SceneContext,
    config: DeskConfig,
    timings: TransitionTimings,
    loads: Vec<(Role, PendingAsset<ModelAsset>)>,
    embed_attached: bool,
    approach: Option<Animation<Vec3>>,
    pointer: Vec2,
    zoomed: bool,
    yaw: f32,
    pitch: f32,
    fov: f32,
    light: f32,
    flicker: Flicker,
}

impl DeskScene {
    /// Create the surface, camera and lights, start the three model loads
    /// and arm the first flicker check. All three models are optional.
    pub fn build(
        config: &SessionConfig,
        now: f32,
        host: &mut dyn Host,
        loader: &mut dyn AssetLoader,
        timers: &mut Timers<TimerEvent>,
        rng: &mut impl Rng,
    ) -> Result<Self, SceneError> {
        let desk = config.desk.clone();
        let camera = Camera::new()
            .at(desk.camera_start)
            .with_fov(desk.fov)
            .clip_planes(0.1, 1000.0);
        let mut ctx = SceneContext::create(SceneId::Desk, camera, host)?;
        let viewport = host.viewport();
        ctx.camera.set_aspect(viewport.x as u32, viewport.y as u32);

        ctx.graph.spawn_light(
            "overhead",
            Light {
                kind: LightKind::Spot,
                intensity: desk.light_intensity,
                shadow_map: Some(1024),
            },
            OVERHEAD_LIGHT,
        );
        ctx.graph.spawn_pass("bloom");

        for listener in [Listener::Activity, Listener::Resize, Listener::Pointer] {
            ctx.listen(listener);
        }

        let paths = &config.assets;
        let loads = vec![
            (Role::Screen, loader.load_model(&paths.screen)),
            (Role::Room, loader.load_model(&paths.room)),
            (Role::ApproachModel, loader.load_model(&paths.approach_model)),
        ];

        let mut scene = Self {
            ctx,
            fov: desk.fov,
            light: desk.light_intensity,
            config: desk,
            timings: config.transition.clone(),
            loads,
            embed_attached: true,
            approach: None,
            pointer: Vec2::ZERO,
            zoomed: false,
            yaw: 0.0,
            pitch: 0.0,
            flicker: Flicker::default(),
        };
        scene.arm_flicker_check(now, timers, rng);
        scene.ctx.activate();
        info!("desk scene built");
        Ok(scene)
    }

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn is_disposed(&self) -> bool {
        self.ctx.is_disposed()
    }

    pub fn embed_attached(&self) -> bool {
        self.embed_attached
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoomed
    }

    pub fn light_intensity(&self) -> f32 {
        self.light
    }

    pub fn is_flickering(&self) -> bool {
        self.flicker.active
    }

    pub fn approach_position(&self) -> Option<Vec3> {
        self.ctx.graph.position(Role::ApproachModel)
    }

    /// Add any models that finished loading. Failures are logged and the
    /// scene carries on without that model.
    pub fn poll_assets(&mut self) {
        let mut index = 0;
        while index < self.loads.len() {
            let (role, pending) = &mut self.loads[index];
            let role = *role;
            let Some(result) = pending.poll() else {
                index += 1;
                continue;
            };
            self.loads.swap_remove(index);
            match result {
                Ok(model) => self.add_model(role, &model),
                Err(err) => warn!("desk scene continues without {role:?}: {err}"),
            }
        }
    }

    fn add_model(&mut self, role: Role, model: &ModelAsset) {
        self.ctx.graph.spawn_model(role, model, Vec3::ZERO);
        debug!("{role:?} model added ({} meshes)", model.meshes.len());
        if role == Role::Screen && self.embed_attached {
            let size = model.size();
            let center = model.center() + Vec3::Z * EMBED_DEPTH_OFFSET;
            self.ctx.graph.spawn_embed(Vec2::new(size.x, size.y), center);
        }
    }

    /// Remove the embedded page and its glass pane. Safe to call when they
    /// are already gone.
    pub fn detach_embed(&mut self) -> DisposalReport {
        let mut report = self.ctx.graph.remove_role(Role::EmbedProjection);
        report.merge(self.ctx.graph.remove_role(Role::Glass));
        if self.embed_attached {
            info!("embedded page detached");
        }
        self.embed_attached = false;
        self.zoomed = false;
        report
    }

    /// Start moving the approach model toward the camera. Returns `false`
    /// when the model is not loaded or the approach already started.
    pub fn start_approach(&mut self, now: f32) -> bool {
        if self.approach.is_some() {
            return false;
        }
        let Some(start) = self.approach_position() else {
            warn!("approach model not loaded, nothing to animate");
            return false;
        };
        let tween = Tween::new(
            start,
            self.timings.approach_target,
            now,
            self.timings.approach_duration,
        )
        .easing(Easing::EaseInOut);
        self.approach = Some(Animation::new(tween));
        debug!("approach started from {start}");
        true
    }

    pub fn approach_started(&self) -> bool {
        self.approach.is_some()
    }

    pub fn approach_completed(&self) -> bool {
        self.approach.as_ref().is_some_and(Animation::is_completed)
    }

    pub fn pointer_moved(&mut self, position: Vec2, viewport: Vec2) {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }
        self.pointer = (position / viewport) * 2.0 - Vec2::ONE;
    }

    /// The pointer entered or left the embedded page. Entering zooms in;
    /// leaving keeps the zoom until a click lands elsewhere.
    pub fn hover_embed(&mut self, over: bool) {
        if over && self.embed_attached {
            self.zoomed = true;
        }
        self.pointer = Vec2::ZERO;
    }

    pub fn click(&mut self, on_embed: bool) {
        if !on_embed {
            self.zoomed = false;
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    fn arm_flicker_check(&mut self, now: f32, timers: &mut Timers<TimerEvent>, rng: &mut impl Rng) {
        let flicker = &self.config.flicker;
        let delay = rng.gen_range(flicker.min_interval..=flicker.max_interval);
        self.ctx.arm(now, delay, TimerEvent::FlickerCheck, timers);
    }

    /// Handle a flicker timer. Returns `false` if the timer is not ours.
    pub fn timer_fired(
        &mut self,
        id: TimerId,
        event: TimerEvent,
        now: f32,
        timers: &mut Timers<TimerEvent>,
        rng: &mut impl Rng,
    ) -> bool {
        if !self.ctx.timer_fired(id) {
            return false;
        }
        match event {
            TimerEvent::FlickerCheck => {
                if rng.gen_bool(self.config.flicker.probability) {
                    self.toggle_flicker(now, timers);
                }
                self.arm_flicker_check(now, timers, rng);
            }
            TimerEvent::FlickerEnd => {
                if self.flicker.end == Some(id) {
                    self.flicker = Flicker::default();
                    self.light = self.config.light_intensity;
                }
            }
            _ => {}
        }
        true
    }

    fn toggle_flicker(&mut self, now: f32, timers: &mut Timers<TimerEvent>) {
        if self.flicker.active {
            if let Some(end) = self.flicker.end.take() {
                timers.cancel(end);
                self.ctx.timer_fired(end);
            }
            self.flicker.active = false;
            self.light = self.config.light_intensity;
            debug!("overhead flicker stopped");
        } else {
            let end = self
                .ctx
                .arm(now, self.config.flicker.duration, TimerEvent::FlickerEnd, timers);
            self.flicker = Flicker {
                active: true,
                end: Some(end),
            };
            debug!("overhead flicker started");
        }
    }

    /// Advance the approach, the camera and the light for one frame.
    /// Returns `true` on the single frame the approach reaches its target.
    pub fn update(&mut self, now: f32, rng: &mut impl Rng) -> bool {
        if self.ctx.is_disposed() {
            return false;
        }
        let mut arrived = false;
        if let Some(approach) = self.approach.as_mut() {
            let step = approach.advance(now);
            self.ctx.graph.set_position(Role::ApproachModel, step.value);
            if step.just_completed {
                info!("approach model reached {}", step.value);
                arrived = true;
            }
        }

        self.update_camera();
        self.update_light(rng);
        arrived
    }

    fn update_camera(&mut self) {
        let cfg = &self.config;
        let (target_y, target_z, target_fov) = if self.zoomed {
            (cfg.zoom_y, cfg.zoom_z, cfg.zoom_fov)
        } else {
            (cfg.camera_start.y, cfg.camera_start.z, cfg.fov)
        };
        let position = &mut self.ctx.camera.position;
        position.y += (target_y - position.y) * cfg.zoom_speed;
        position.z += (target_z - position.z) * cfg.zoom_speed;

        let (target_yaw, target_pitch) = if self.zoomed {
            (0.0, cfg.zoom_tilt)
        } else {
            (
                self.pointer.x * cfg.rotation_range,
                -self.pointer.y * cfg.rotation_range,
            )
        };
        self.yaw += (target_yaw - self.yaw) * cfg.rotation_smoothing;
        self.pitch += (target_pitch - self.pitch) * cfg.rotation_smoothing;
        self.ctx.camera.set_yaw_pitch(self.yaw, self.pitch);

        self.fov += (target_fov - self.fov) * cfg.fov_smoothing;
        self.ctx.camera.fov = self.fov.to_radians();
    }

    fn update_light(&mut self, rng: &mut impl Rng) {
        let base = self.config.light_intensity;
        if self.flicker.active {
            let flicker = &self.config.flicker;
            self.light = base * rng.gen_range(flicker.min_factor..=flicker.max_factor);
        } else {
            self.light += (base - self.light) * LIGHT_RETURN;
        }
        self.ctx.graph.set_light_intensity(LightKind::Spot, self.light);
    }

    pub fn frame(&self, now: f32) -> SceneFrame {
        let markers = [
            (Role::Screen, 1.2, Vec3::splat(0.15)),
            (Role::ApproachModel, 0.6, Vec3::new(0.85, 0.8, 0.75)),
        ]
        .into_iter()
        .filter_map(|(role, radius, color)| {
            self.ctx.graph.position(role).map(|position| Marker {
                position,
                radius,
                color,
                emissive: Vec3::ZERO,
            })
        })
        .collect();

        SceneFrame {
            scene: SceneId::Desk,
            time: now,
            camera: self.ctx.camera,
            background: self.config.background,
            environment: 1.0,
            light: self.light / self.config.light_intensity.max(f32::EPSILON),
            markers,
            ground_grid: false,
            embed: self.embed_attached,
        }
    }

    pub fn render(&mut self, now: f32) -> bool {
        let frame = self.frame(now);
        self.ctx.render(&frame)
    }

    /// Dispose everything. Loads still in flight are abandoned.
    pub fn teardown(&mut self, timers: &mut Timers<TimerEvent>) -> DisposalReport {
        self.loads.clear();
        self.approach = None;
        self.flicker = Flicker::default();
        self.embed_attached = false;
        self.ctx.teardown(timers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHost, ScriptedLoader};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Fixture {
        scene: DeskScene,
        host: RecordingHost,
        loader: ScriptedLoader,
        timers: Timers<TimerEvent>,
        rng: StdRng,
    }

    fn fixture() -> Fixture {
        let config = SessionConfig::default();
        let mut host = RecordingHost::new();
        let mut loader = ScriptedLoader::new();
        let mut timers = Timers::new();
        let mut rng = StdRng::seed_from_u64(7);
        let scene =
            DeskScene::build(&config, 0.0, &mut host, &mut loader, &mut timers, &mut rng).unwrap();
        Fixture {
            scene,
            host,
            loader,
            timers,
            rng,
        }
    }

    #[test]
    fn screen_load_projects_the_embed() {
        let mut f = fixture();
        assert!(f.loader.succeed("screenwarp.stl"));
        f.scene.poll_assets();
        assert!(f.scene.context().graph.has_role(Role::EmbedProjection));
        assert!(f.scene.context().graph.has_role(Role::Glass));

        let report = f.scene.detach_embed();
        assert_eq!(report.entities, 2);
        assert!(!f.scene.embed_attached());
        assert_eq!(f.scene.detach_embed(), DisposalReport::default());
    }

    #[test]
    fn failed_optional_models_do_not_stop_the_scene() {
        let mut f = fixture();
        f.loader.fail("room.stl");
        f.loader.fail("faceplug.stl");
        f.scene.poll_assets();
        assert!(!f.scene.start_approach(0.0));
        assert!(f.scene.render(0.0));
    }

    #[test]
    fn approach_eases_to_the_target_and_reports_once() {
        let mut f = fixture();
        f.loader.succeed("faceplug.stl");
        f.scene.poll_assets();
        assert!(f.scene.start_approach(1.0));
        assert!(!f.scene.start_approach(1.2));

        assert!(!f.scene.update(2.75, &mut f.rng));
        let halfway = f.scene.approach_position().unwrap();
        assert!((halfway.z - 1.65).abs() < 1e-4);

        assert!(f.scene.update(4.5, &mut f.rng));
        assert!(!f.scene.update(4.6, &mut f.rng));
        assert_eq!(f.scene.approach_position(), Some(Vec3::new(0.0, 0.0, 3.3)));
        assert!(f.scene.approach_completed());
    }

    #[test]
    fn hover_zooms_until_clicking_elsewhere() {
        let mut f = fixture();
        f.scene.hover_embed(true);
        f.scene.hover_embed(false);
        assert!(f.scene.is_zoomed());
        for _ in 0..200 {
            f.scene.update(0.0, &mut f.rng);
        }
        assert!(f.scene.context().camera.position.z < 4.0);

        f.scene.click(false);
        assert!(!f.scene.is_zoomed());
    }

    #[test]
    fn flicker_checks_rearm_and_die_with_the_scene() {
        let mut f = fixture();
        let (id, event) = f.timers.pop_due(45.0).unwrap();
        assert_eq!(event, TimerEvent::FlickerCheck);
        assert!(f.scene.timer_fired(id, event, 45.0, &mut f.timers, &mut f.rng));
        assert!(!f.timers.is_empty());

        let report = f.scene.teardown(&mut f.timers);
        assert!(report.timers_cancelled >= 1);
        assert!(f.timers.is_empty());
        assert!(f.host.surface_log(SceneId::Desk).released);
    }

    #[test]
    fn late_assets_after_teardown_are_dropped() {
        let mut f = fixture();
        f.scene.teardown(&mut f.timers);
        f.loader.succeed("room.stl");
        f.scene.poll_assets();
        assert!(f.scene.context().graph.is_empty());
        assert!(!f.scene.render(1.0));
    }
}
