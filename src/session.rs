//! One page load, from the desk to the final reload.
//!
//! A [`Session`] owns every piece of state: both scenes, the timer table,
//! the overlay table, the eyelids, the activity monitor and the two state
//! machines. Nothing runs on its own. The runner pushes events as they
//! arrive and calls [`Session::tick`] once per frame, which
//!
//! 1. drains the event queue in arrival order,
//! 2. fires due timers, earliest first,
//! 3. polls asset loads,
//! 4. advances animations,
//! 5. renders the active scene.

use std::collections::VecDeque;

use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::activity::ActivityMonitor;
use crate::assets::AssetLoader;
use crate::config::SessionConfig;
use crate::error::SceneError;
use crate::event::{SessionEvent, TimerEvent};
use crate::host::{Anchor, Host, HostEvent};
use crate::hud::{CloseStart, Disruption, Eyelids};
use crate::input::InputEvent;
use crate::message::{Action, Message, MessageBridge};
use crate::orchestrator::{
    PaymentCommand, PaymentEvent, PaymentSequence, SceneTransition, TransitionCommand,
    TransitionEvent,
};
use crate::overlay::{Completion, OverlayKind, OverlayManager};
use crate::scene::{DeskScene, Listener, SceneId, WorldScene};
use crate::timer::{TimerId, Timers};

pub struct Session<H: Host, L: AssetLoader> {
    config: SessionConfig,
    host: H,
    loader: L,
    rng: StdRng,
    now: f32,
    queue: VecDeque<SessionEvent>,
    timers: Timers<TimerEvent>,
    activity: ActivityMonitor,
    bridge: MessageBridge,
    overlays: OverlayManager,
    eyelids: Eyelids,
    disruption: Disruption,
    transition: SceneTransition,
    payment: PaymentSequence,
    desk: DeskScene,
    world: Option<WorldScene>,
    eyes_close_timer: Option<TimerId>,
    gate_timer: Option<TimerId>,
    payment_timer: Option<TimerId>,
}

impl<H: Host, L: AssetLoader> Session<H, L> {
    /// Build the desk scene, hand it the message channel and start the
    /// idle countdown. Fails if the host has no surface for the desk.
    pub fn new(
        config: SessionConfig,
        mut host: H,
        mut loader: L,
        now: f32,
        seed: u64,
    ) -> Result<Self, SceneError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut timers = Timers::new();
        let desk = DeskScene::build(&config, now, &mut host, &mut loader, &mut timers, &mut rng)?;

        let mut bridge = MessageBridge::new();
        bridge.install(SceneId::Desk);
        let mut activity = ActivityMonitor::new(config.idle_timeout);
        activity.record_activity(now, &mut timers);

        Ok(Self {
            overlays: OverlayManager::new(config.overlays.clone()),
            config,
            host,
            loader,
            rng,
            now,
            queue: VecDeque::new(),
            timers,
            activity,
            bridge,
            eyelids: Eyelids::new(),
            disruption: Disruption::new(),
            transition: SceneTransition::new(),
            payment: PaymentSequence::new(),
            desk,
            world: None,
            eyes_close_timer: None,
            gate_timer: None,
            payment_timer: None,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn now(&self) -> f32 {
        self.now
    }

    pub fn timers(&self) -> &Timers<TimerEvent> {
        &self.timers
    }

    pub fn activity(&self) -> &ActivityMonitor {
        &self.activity
    }

    pub fn bridge(&self) -> &MessageBridge {
        &self.bridge
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn eyelids(&self) -> &Eyelids {
        &self.eyelids
    }

    pub fn disruption(&self) -> &Disruption {
        &self.disruption
    }

    pub fn transition(&self) -> &SceneTransition {
        &self.transition
    }

    pub fn payment(&self) -> &PaymentSequence {
        &self.payment
    }

    pub fn desk(&self) -> &DeskScene {
        &self.desk
    }

    pub fn world(&self) -> Option<&WorldScene> {
        self.world.as_ref()
    }

    /// The scene currently receiving input, if any.
    pub fn active_scene(&self) -> Option<SceneId> {
        if !self.desk.is_disposed() {
            Some(SceneId::Desk)
        } else if self.world.as_ref().is_some_and(|w| !w.is_disposed()) {
            Some(SceneId::World)
        } else {
            None
        }
    }

    /// Whether the embedded page is still on the desk screen.
    pub fn embed_visible(&self) -> bool {
        !self.desk.is_disposed() && self.desk.embed_attached()
    }

    fn listening(&self, listener: Listener) -> bool {
        match self.active_scene() {
            Some(SceneId::Desk) => self.desk.context().is_listening(listener),
            Some(SceneId::World) => self
                .world
                .as_ref()
                .is_some_and(|w| w.context().is_listening(listener)),
            None => false,
        }
    }

    pub fn push(&mut self, event: impl Into<SessionEvent>) {
        self.queue.push_back(event.into());
    }

    /// Queue raw message text from an embedded page.
    pub fn push_message(&mut self, raw: impl Into<String>) {
        self.queue.push_back(SessionEvent::Message(raw.into()));
    }

    pub fn tick(&mut self, now: f32) {
        self.now = now;

        while let Some(event) = self.queue.pop_front() {
            self.handle_event(event);
        }

        while let Some((id, event)) = self.timers.pop_due(now) {
            self.handle_timer(id, event);
        }

        if !self.desk.is_disposed() {
            self.desk.poll_assets();
        }
        let readiness = self.world.as_mut().and_then(WorldScene::poll);
        if let Some(result) = readiness {
            if let Err(err) = &result {
                error!("world scene is not ready: {err}");
            }
            self.transition_event(TransitionEvent::WorldSettled {
                ready: result.is_ok(),
            });
        }

        if !self.desk.is_disposed() && self.desk.update(now, &mut self.rng) {
            self.transition_event(TransitionEvent::ApproachCompleted);
        }
        if let Some(world) = self.world.as_mut() {
            world.update(now);
        }

        self.desk.render(now);
        if let Some(world) = self.world.as_mut() {
            world.render(now);
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Input(input) => self.handle_input(input),
            SessionEvent::Message(raw) => self.handle_message(&raw),
            SessionEvent::Host(host) => self.handle_host_event(host),
        }
    }

    fn handle_input(&mut self, input: InputEvent) {
        if input.is_activity() && self.listening(Listener::Activity) {
            self.activity.record_activity(self.now, &mut self.timers);
        }
        let Some(scene) = self.active_scene() else {
            return;
        };
        match (scene, input) {
            (_, InputEvent::Resized { width, height }) => {
                if self.listening(Listener::Resize) {
                    match scene {
                        SceneId::Desk => self.desk.resize(width, height),
                        SceneId::World => {
                            if let Some(world) = self.world.as_mut() {
                                world.resize(width, height);
                            }
                        }
                    }
                }
            }
            (SceneId::Desk, InputEvent::PointerMoved { position }) => {
                let viewport = self.host.viewport();
                self.desk.pointer_moved(position, viewport);
            }
            (SceneId::Desk, InputEvent::EmbedHover(over)) => self.desk.hover_embed(over),
            (SceneId::Desk, InputEvent::Click { on_embed, .. }) => self.desk.click(on_embed),
            (SceneId::World, input) => {
                let Some(world) = self.world.as_mut() else {
                    return;
                };
                match input {
                    InputEvent::PointerDelta(delta) => world.look(delta),
                    InputEvent::Click { .. } => world.click(&mut self.host),
                    InputEvent::KeyDown(key) => {
                        world.key(key, true);
                    }
                    InputEvent::KeyUp(key) => {
                        world.key(key, false);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn handle_message(&mut self, raw: &str) {
        let Some(message) = Message::parse(raw) else {
            return;
        };
        self.activity.record_activity(self.now, &mut self.timers);
        let Some(action) = self.bridge.dispatch(&message) else {
            debug!("{:?} needs no action", message.kind);
            return;
        };
        debug!("{:?} -> {action:?}", message.kind);
        self.handle_action(action);
    }

    fn handle_action(&mut self, action: Action) {
        let now = self.now;
        let (host, timers) = (&mut self.host, &mut self.timers);
        match action {
            Action::BeginTransition => self.transition_event(TransitionEvent::Requested),
            Action::ShortGlitch => {
                let duration = self.config.transition.payment_glitch;
                self.disruption.trigger(now, duration, host, timers);
            }
            Action::CloseAd => {
                self.overlays.hide(OverlayKind::Ad, true, now, host, timers);
            }
            Action::CloseApparelAd => {
                self.overlays.hide(OverlayKind::ApparelAd, false, now, host, timers);
            }
            Action::OpenSubscription => {
                self.overlays.advance(OverlayKind::Ad, now, host, timers);
            }
            Action::CloseSubscription => {
                self.overlays.hide(OverlayKind::Subscription, false, now, host, timers);
            }
            Action::OpenCardEntry => {
                self.overlays.advance(OverlayKind::Subscription, now, host, timers);
            }
            Action::ConfirmPayment => {
                if self.overlays.is_visible(OverlayKind::CardEntry) {
                    self.payment_event(PaymentEvent::CardEntryClosed);
                } else {
                    debug!("card entry is not showing, ignoring confirmation");
                }
            }
        }
    }

    fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::TransitionEnd { eyelid, property } => {
                if self
                    .eyelids
                    .transition_ended(eyelid, &property, &mut self.timers)
                {
                    self.transition_event(TransitionEvent::EyesClosed);
                }
            }
            HostEvent::PointerCaptureChanged(captured) => {
                if self.listening(Listener::PointerCapture) {
                    if let Some(world) = self.world.as_mut() {
                        world.capture_changed(captured, &mut self.host);
                    }
                }
            }
            HostEvent::PointerCaptureError => {
                if let Some(world) = self.world.as_mut() {
                    world.capture_failed();
                }
            }
        }
    }

    fn handle_timer(&mut self, id: TimerId, event: TimerEvent) {
        let now = self.now;
        if self.desk.context().owns_timer(id) {
            self.desk
                .timer_fired(id, event, now, &mut self.timers, &mut self.rng);
            return;
        }
        if let Some(world) = self.world.as_mut() {
            if world.context().owns_timer(id) {
                world.timer_fired(id, event, &mut self.host);
                return;
            }
        }

        match event {
            TimerEvent::IdleTimeout => {
                if self.activity.expire(id) {
                    self.host.reload();
                }
            }
            TimerEvent::EyesCloseDue => {
                if self.eyes_close_timer == Some(id) {
                    self.eyes_close_timer = None;
                    self.transition_event(TransitionEvent::EyesCloseDue);
                }
            }
            TimerEvent::DisruptionEnd => self.disruption.ended(id, &mut self.host),
            TimerEvent::EyelidFallback => {
                if self.eyelids.fallback_fired(id) {
                    self.transition_event(TransitionEvent::EyesClosed);
                }
            }
            TimerEvent::LoadingGateElapsed => {
                if self.gate_timer == Some(id) {
                    self.gate_timer = None;
                    self.transition_event(TransitionEvent::MinimumElapsed);
                }
            }
            TimerEvent::AdDue | TimerEvent::ApparelAdDue => {
                self.overlays.timer_fired(id);
                let kind = match event {
                    TimerEvent::ApparelAdDue => OverlayKind::ApparelAd,
                    _ => OverlayKind::Ad,
                };
                self.overlays.show(kind, &mut self.host, &mut self.timers);
            }
            TimerEvent::BarrageExpired => {
                self.overlays.timer_fired(id);
                self.overlays.clear_barrage(&mut self.host, &mut self.timers);
            }
            TimerEvent::BarrageDue | TimerEvent::BarrageFinished => {
                if self.payment_timer == Some(id) {
                    self.payment_timer = None;
                    let event = match event {
                        TimerEvent::BarrageDue => PaymentEvent::BarrageDue,
                        _ => PaymentEvent::BarrageFinished,
                    };
                    self.payment_event(event);
                }
            }
            TimerEvent::FallbackReload => self.payment_event(PaymentEvent::ReloadDue),
            TimerEvent::IndicatorReveal | TimerEvent::FlickerCheck | TimerEvent::FlickerEnd => {
                debug!("{event:?} {id} outlived its scene");
            }
        }
    }

    /// Feed one event into the transition machine, then every follow-up
    /// event its commands produce, in order.
    fn transition_event(&mut self, event: TransitionEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let (next, commands) = self.transition.step(self.now, event);
            self.transition = next;
            for command in commands {
                pending.extend(self.run_transition(command));
            }
        }
    }

    fn run_transition(&mut self, command: TransitionCommand) -> Option<TransitionEvent> {
        let now = self.now;
        let timings = &self.config.transition;
        match command {
            TransitionCommand::DetachEmbed => {
                self.desk.detach_embed();
                Some(TransitionEvent::EmbedDetached)
            }
            TransitionCommand::ScheduleEyesClose => {
                let id = self
                    .timers
                    .schedule(now, timings.eyes_close_delay, TimerEvent::EyesCloseDue);
                self.eyes_close_timer = Some(id);
                None
            }
            TransitionCommand::StartApproach => {
                self.desk.start_approach(now);
                None
            }
            TransitionCommand::StartDisruption => {
                let duration = timings.disruption_duration;
                self.disruption
                    .trigger(now, duration, &mut self.host, &mut self.timers);
                None
            }
            TransitionCommand::CloseEyes => {
                let (duration, margin) = (timings.eyelid_transition, timings.eyelid_fallback_margin);
                match self
                    .eyelids
                    .close(now, duration, margin, &mut self.host, &mut self.timers)
                {
                    CloseStart::Immediate => Some(TransitionEvent::EyesClosed),
                    CloseStart::Started | CloseStart::AlreadyStarted => None,
                }
            }
            TransitionCommand::ShowLoader => {
                self.set_loader(true);
                None
            }
            TransitionCommand::TeardownDesk => {
                self.bridge.remove(SceneId::Desk);
                if let Some(id) = self.eyes_close_timer.take() {
                    self.timers.cancel(id);
                }
                self.desk.teardown(&mut self.timers);
                Some(TransitionEvent::TeardownComplete)
            }
            TransitionCommand::StartGate => {
                let id = self.timers.schedule(
                    now,
                    timings.minimum_loading,
                    TimerEvent::LoadingGateElapsed,
                );
                self.gate_timer = Some(id);
                None
            }
            TransitionCommand::BuildWorld => {
                match WorldScene::build(
                    &self.config,
                    now,
                    &mut self.host,
                    &mut self.loader,
                    &mut self.timers,
                ) {
                    Ok(world) => {
                        self.bridge.install(SceneId::World);
                        self.world = Some(world);
                        None
                    }
                    Err(err) => {
                        error!("world scene construction failed: {err}");
                        Some(TransitionEvent::WorldSettled { ready: false })
                    }
                }
            }
            TransitionCommand::HideLoader => {
                if let Some(id) = self.gate_timer.take() {
                    self.timers.cancel(id);
                }
                self.set_loader(false);
                None
            }
            TransitionCommand::FinishWorld { ready } => {
                if ready {
                    let delay = self.config.overlays.ad_first_delay;
                    self.overlays
                        .schedule(OverlayKind::Ad, now, delay, &mut self.timers);
                }
                Some(TransitionEvent::WorldFinished)
            }
            TransitionCommand::OpenEyes => {
                let duration = timings.eyelid_transition;
                self.eyelids.open(duration, &mut self.host, &mut self.timers);
                Some(TransitionEvent::EyesOpened)
            }
            TransitionCommand::RearmActivity => {
                self.activity.record_activity(now, &mut self.timers);
                None
            }
        }
    }

    fn set_loader(&mut self, visible: bool) {
        if self.host.has_anchor(Anchor::Loader) {
            self.host.set_loader(visible);
        } else {
            warn!("loader anchor missing");
        }
    }

    fn payment_event(&mut self, event: PaymentEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let (next, commands) = self.payment.step(self.now, event);
            self.payment = next;
            for command in commands {
                pending.extend(self.run_payment(command));
            }
        }
    }

    fn run_payment(&mut self, command: PaymentCommand) -> Option<PaymentEvent> {
        let now = self.now;
        let (host, timers) = (&mut self.host, &mut self.timers);
        match command {
            PaymentCommand::HideCardEntry => {
                self.overlays
                    .hide(OverlayKind::CardEntry, false, now, host, timers);
                None
            }
            PaymentCommand::StartEffects => {
                if let Some(world) = self.world.as_mut() {
                    world.start_payment_effects(now);
                }
                None
            }
            PaymentCommand::ScheduleApparelAd => {
                let delay = self.config.overlays.apparel_ad_delay;
                self.overlays
                    .schedule(OverlayKind::ApparelAd, now, delay, timers);
                None
            }
            PaymentCommand::ScheduleBarrage => {
                let delay = self.config.payment.barrage_delay;
                self.payment_timer = Some(timers.schedule(now, delay, TimerEvent::BarrageDue));
                None
            }
            PaymentCommand::StartBarrage => {
                self.overlays.start_barrage(now, &mut self.rng, host, timers);
                let lifetime = self.config.overlays.barrage_lifetime;
                self.payment_timer =
                    Some(timers.schedule(now, lifetime, TimerEvent::BarrageFinished));
                None
            }
            PaymentCommand::ClearBarrage => {
                self.overlays.clear_barrage(host, timers);
                None
            }
            PaymentCommand::TeardownWorld => {
                self.overlays.hide_all(now, host, timers);
                self.bridge.remove(SceneId::World);
                if let Some(id) = self.payment_timer.take() {
                    timers.cancel(id);
                }
                if let Some(world) = self.world.as_mut() {
                    world.teardown(host, timers);
                }
                Some(PaymentEvent::WorldTornDown)
            }
            PaymentCommand::ShowCompletion => match self.overlays.show_completion(now, host, timers) {
                Completion::Shown => {
                    info!("completion overlay up, its page reloads the session");
                    None
                }
                Completion::FallbackReload(_) => Some(PaymentEvent::CompletionUnavailable),
            },
            PaymentCommand::Reload => {
                host.reload();
                None
            }
        }
    }
}
