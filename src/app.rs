use std::io::BufRead;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant;

use glam::Vec2;
use log::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

use crate::assets::FsAssetLoader;
use crate::config::SessionConfig;
use crate::desktop::{self, DesktopHost, SharedStage};
use crate::error::{RunError, SceneError};
use crate::gpu::GpuContext;
use crate::host::HostEvent;
use crate::input::InputTranslator;
use crate::presenter::Presenter;
use crate::session::Session;

/// Configuration for the desktop runner.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Seed for popup placement and light flicker. Each reload uses the
    /// next seed.
    pub seed: u64,
    /// Read embedded-page messages as JSON lines from stdin.
    pub stdin_messages: bool,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Faceplug".to_string(),
            width: 1280,
            height: 720,
            seed: 0,
            stdin_messages: true,
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn stdin_messages(mut self, enabled: bool) -> Self {
        self.stdin_messages = enabled;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

/// Open a window and run sessions in it until the window closes.
///
/// A reload requested by a session (idle timeout, completion fallback)
/// replaces it with a fresh one in the same window.
pub fn run(config: AppConfig) -> Result<(), RunError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let messages = message_source(config.stdin_messages);
    let mut app = FaceplugApp::Pending {
        config,
        messages: Some(messages),
    };
    event_loop.run_app(&mut app)?;

    match app {
        FaceplugApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

/// Lines from stdin, forwarded as raw message text. With stdin disabled
/// the channel is closed from the start.
fn message_source(enabled: bool) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if enabled {
        thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_owned()).is_err() {
                    break;
                }
            }
            debug!("stdin closed, no more messages");
        });
    }
    rx
}

type DesktopSession = Session<DesktopHost, FsAssetLoader>;

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    presenter: Presenter,
    stage: SharedStage,
    session: DesktopSession,
    input: InputTranslator,
    messages: Receiver<String>,
    config: AppConfig,
    seed: u64,
    started: Instant,
    captured: bool,
}

enum FaceplugApp {
    Pending {
        config: AppConfig,
        messages: Option<Receiver<String>>,
    },
    Running(Box<Running>),
    Failed(RunError),
}

fn viewport_of(window: &Window) -> Vec2 {
    let size = window.inner_size();
    Vec2::new(size.width as f32, size.height as f32)
}

fn start_session(
    config: &AppConfig,
    viewport: Vec2,
    stage: &SharedStage,
    seed: u64,
) -> Result<DesktopSession, SceneError> {
    let host = DesktopHost::new(viewport, Rc::clone(stage));
    let loader = FsAssetLoader::new(&config.session.assets.root);
    info!("starting session (seed {seed})");
    Session::new(config.session.clone(), host, loader, 0.0, seed)
}

impl FaceplugApp {
    fn launch(
        event_loop: &ActiveEventLoop,
        config: AppConfig,
        messages: Receiver<String>,
    ) -> Result<Running, RunError> {
        let attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let gpu = GpuContext::new(Arc::clone(&window))?;
        let presenter = Presenter::new(&gpu);
        let stage = SharedStage::default();
        let seed = config.seed;
        let session = start_session(&config, viewport_of(&window), &stage, seed)?;

        Ok(Running {
            window,
            gpu,
            presenter,
            stage,
            session,
            input: InputTranslator::new(),
            messages,
            config,
            seed,
            started: Instant::now(),
            captured: false,
        })
    }
}

impl Running {
    fn now(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    fn set_capture(&mut self, captured: bool) {
        let window = &self.window;
        if captured {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            match grabbed {
                Ok(()) => {
                    window.set_cursor_visible(false);
                    self.captured = true;
                    self.session.push(HostEvent::PointerCaptureChanged(true));
                }
                Err(err) => {
                    warn!("pointer capture failed: {err}");
                    self.session.push(HostEvent::PointerCaptureError);
                }
            }
        } else {
            if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
                debug!("releasing cursor grab: {err}");
            }
            window.set_cursor_visible(true);
            if self.captured {
                self.captured = false;
                self.session.push(HostEvent::PointerCaptureChanged(false));
            }
        }
    }

    fn reload(&mut self) -> Result<(), SceneError> {
        self.set_capture(false);
        self.seed = self.seed.wrapping_add(1);
        self.session = start_session(
            &self.config,
            viewport_of(&self.window),
            &self.stage,
            self.seed,
        )?;
        self.started = Instant::now();
        self.captured = false;
        self.window.set_title(&self.config.title);
        Ok(())
    }

    fn frame(&mut self) -> Result<(), SceneError> {
        let now = self.now();

        while let Ok(raw) = self.messages.try_recv() {
            self.session.push_message(raw);
        }
        for event in self.session.host_mut().advance(now) {
            self.session.push(event);
        }

        self.session.tick(now);

        if let Some(captured) = self.session.host_mut().take_capture_request() {
            self.set_capture(captured);
        }
        if let Some(indicator) = self.session.host_mut().take_indicator() {
            let title = match indicator {
                Some(text) => format!("{} | {text}", self.config.title),
                None => self.config.title.clone(),
            };
            self.window.set_title(&title);
        }
        if self.session.host_mut().take_reload() {
            return self.reload();
        }

        let hud = self.session.host().hud_layer(self.session.embed_visible());
        let stage = self.stage.borrow();
        match self
            .presenter
            .present(&self.gpu, stage.frame.as_ref(), &hud, now)
        {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => self.gpu.reconfigure(),
            Err(err) => warn!("skipping frame: {err}"),
        }
        Ok(())
    }
}

impl ApplicationHandler for FaceplugApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let FaceplugApp::Pending { config, messages } = self else {
            return;
        };
        let Some(messages) = messages.take() else {
            return;
        };
        match Self::launch(event_loop, config.clone(), messages) {
            Ok(running) => {
                running.window.request_redraw();
                *self = FaceplugApp::Running(Box::new(running));
            }
            Err(err) => {
                error!("{err}");
                *self = FaceplugApp::Failed(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let FaceplugApp::Running(running) = self else {
            return;
        };

        match &event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(size) => {
                running.gpu.resize(size.width, size.height);
                running
                    .session
                    .host_mut()
                    .set_viewport(Vec2::new(size.width as f32, size.height as f32));
            }
            WindowEvent::KeyboardInput { event: key, .. }
                if running.captured
                    && key.state == ElementState::Pressed
                    && key.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                running.set_capture(false);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = running.frame() {
                    error!("session restart failed: {err}");
                    *self = FaceplugApp::Failed(err.into());
                    event_loop.exit();
                    return;
                }
                running.window.request_redraw();
                return;
            }
            _ => {}
        }

        let viewport = viewport_of(&running.window);
        let embed = running.session.embed_visible();
        let inputs = running
            .input
            .translate(&event, |p| embed && desktop::embed_contains(viewport, p));
        for input in inputs {
            running.session.push(input);
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        let FaceplugApp::Running(running) = self else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta } = event {
            if running.captured {
                let motion = running.input.motion(delta);
                running.session.push(motion);
            }
        }
    }
}
