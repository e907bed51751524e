use std::collections::HashSet;

use log::{debug, info};

use super::graph::{DisposalReport, SceneGraph};
use super::{RenderSurface, SceneFrame, SceneId};
use crate::camera::Camera;
use crate::error::SceneError;
use crate::event::TimerEvent;
use crate::host::Host;
use crate::timer::{TimerId, Timers};

/// Input a scene has subscribed to. The session only delivers events of a
/// kind the active scene is listening for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Listener {
    Activity,
    Resize,
    Pointer,
    Keyboard,
    PointerCapture,
}

/// Lifecycle state shared by both scenes.
pub struct SceneContext {
    id: SceneId,
    surface: Option<Box<dyn RenderSurface>>,
    pub camera: Camera,
    pub graph: SceneGraph,
    active: bool,
    disposed: bool,
    listeners: HashSet<Listener>,
    timers: Vec<TimerId>,
    frames: u64,
}

impl SceneContext {
    /// Ask the host for a surface. Fails before creating anything else if
    /// no surface is available.
    pub fn create(id: SceneId, camera: Camera, host: &mut dyn Host) -> Result<Self, SceneError> {
        let surface = host
            .create_surface(id)
            .ok_or(SceneError::SurfaceUnavailable(id))?;
        debug!("created render surface for {id}");
        Ok(Self {
            id,
            surface: Some(surface),
            camera,
            graph: SceneGraph::new(),
            active: false,
            disposed: false,
            listeners: HashSet::new(),
            timers: Vec::new(),
            frames: 0,
        })
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn activate(&mut self) {
        if !self.disposed {
            self.active = true;
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn listen(&mut self, listener: Listener) {
        self.listeners.insert(listener);
    }

    pub fn is_listening(&self, listener: Listener) -> bool {
        self.listeners.contains(&listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Arm a timer owned by this scene. It is cancelled at teardown if it
    /// has not fired by then.
    pub fn arm(
        &mut self,
        now: f32,
        delay: f32,
        event: TimerEvent,
        timers: &mut Timers<TimerEvent>,
    ) -> TimerId {
        let id = timers.schedule(now, delay, event);
        self.timers.push(id);
        id
    }

    pub fn owns_timer(&self, id: TimerId) -> bool {
        self.timers.contains(&id)
    }

    /// Drop a timer that fired from the owned list.
    pub fn timer_fired(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| *t != id);
        self.timers.len() != before
    }

    pub fn armed_timers(&self) -> &[TimerId] {
        &self.timers
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.is_listening(Listener::Resize) {
            return;
        }
        self.camera.set_aspect(width, height);
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(width, height);
        }
    }

    /// Render a frame. Inactive or disposed contexts skip silently and
    /// return `false`.
    pub fn render(&mut self, frame: &SceneFrame) -> bool {
        if self.disposed || !self.active {
            return false;
        }
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        surface.render(frame);
        self.frames += 1;
        true
    }

    /// Cancel owned timers, drop listeners, dispose the scene graph and
    /// release the surface. A second call does nothing.
    pub fn teardown(&mut self, timers: &mut Timers<TimerEvent>) -> DisposalReport {
        if self.disposed {
            return DisposalReport::default();
        }
        self.active = false;

        let mut report = DisposalReport {
            timers_cancelled: timers.cancel_all(self.timers.drain(..)),
            listeners_removed: self.listeners.len(),
            ..DisposalReport::default()
        };
        self.listeners.clear();
        report.merge(self.graph.dispose_all());

        if let Some(mut surface) = self.surface.take() {
            surface.release();
            report.surface_released = true;
        }
        self.disposed = true;
        info!(
            "{} torn down: {} entities, {} textures, {} shadow maps, {} timers cancelled",
            self.id, report.entities, report.textures, report.shadow_maps, report.timers_cancelled
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHost;

    fn frame(id: SceneId) -> SceneFrame {
        SceneFrame {
            scene: id,
            time: 0.0,
            camera: Camera::new(),
            background: glam::Vec3::ZERO,
            environment: 1.0,
            light: 1.0,
            markers: Vec::new(),
            ground_grid: false,
            embed: false,
        }
    }

    #[test]
    fn missing_surface_rejects_construction() {
        let mut host = RecordingHost::new();
        host.surfaces_available = false;
        let result = SceneContext::create(SceneId::World, Camera::new(), &mut host);
        assert!(matches!(result, Err(SceneError::SurfaceUnavailable(SceneId::World))));
    }

    #[test]
    fn render_after_teardown_is_skipped() {
        let mut host = RecordingHost::new();
        let mut timers = Timers::new();
        let mut ctx = SceneContext::create(SceneId::Desk, Camera::new(), &mut host).unwrap();
        ctx.activate();
        assert!(ctx.render(&frame(SceneId::Desk)));

        let report = ctx.teardown(&mut timers);
        assert!(report.surface_released);
        assert!(!ctx.render(&frame(SceneId::Desk)));
        assert_eq!(ctx.frames_rendered(), 1);
        assert_eq!(host.surface_log(SceneId::Desk).renders, 1);
        assert!(host.surface_log(SceneId::Desk).released);
    }

    #[test]
    fn teardown_cancels_every_owned_timer_and_listener() {
        let mut host = RecordingHost::new();
        let mut timers = Timers::new();
        let mut ctx = SceneContext::create(SceneId::World, Camera::new(), &mut host).unwrap();
        ctx.listen(Listener::Keyboard);
        ctx.listen(Listener::Resize);
        let fired = ctx.arm(0.0, 1.0, TimerEvent::IndicatorReveal, &mut timers);
        ctx.arm(0.0, 8.0, TimerEvent::AdDue, &mut timers);
        ctx.arm(0.0, 9.0, TimerEvent::FlickerCheck, &mut timers);
        let unrelated = timers.schedule(0.0, 2.0, TimerEvent::IdleTimeout);

        let (id, _) = timers.pop_due(1.0).unwrap();
        assert_eq!(id, fired);
        assert!(ctx.timer_fired(id));

        let report = ctx.teardown(&mut timers);
        assert_eq!(report.timers_cancelled, 2);
        assert_eq!(report.listeners_removed, 2);
        assert_eq!(ctx.listener_count(), 0);
        assert!(ctx.armed_timers().is_empty());
        assert!(timers.is_pending(unrelated));
        assert_eq!(timers.len(), 1);
        assert_eq!(ctx.teardown(&mut timers), DisposalReport::default());
    }
}
