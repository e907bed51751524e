//! The two scripted sequences, as pure state machines.
//!
//! [`SceneTransition`] takes the session from the desk to the world;
//! [`PaymentSequence`] takes the world from the confirmed payment to the
//! final reload. Neither touches the host, a scene or a timer. Each
//! [`step`](SceneTransition::step) consumes the current state and one
//! event and returns the next state plus the commands the session has to
//! carry out. Commands that finish on the spot hand a follow-up event back
//! to the session, which feeds it into the same machine.
//!
//! ```text
//! Idle ─Requested─▶ ClosingEmbed ─EmbedDetached─▶ ApproachAnim
//!   ─ApproachCompleted─▶ DisruptEffect ─EyesCloseDue─▶ EyesClosing
//!   ─EyesClosed─▶ SceneTeardown ─TeardownComplete─▶ LoadingGate
//!   ─(MinimumElapsed + WorldSettled)─▶ SceneBuild ─WorldFinished─▶
//!   EyesOpening ─EyesOpened─▶ Steady
//! ```
//!
//! The eyes-close timer starts when the request arrives and the glitch
//! starts when the approach finishes, so `EyesCloseDue` usually arrives
//! before `ApproachCompleted`. Both orders are handled.

use log::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionState {
    #[default]
    Idle,
    ClosingEmbed,
    ApproachAnim,
    DisruptEffect,
    EyesClosing,
    SceneTeardown,
    LoadingGate,
    SceneBuild,
    EyesOpening,
    Steady,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionEvent {
    /// The desk received the trigger message.
    Requested,
    EmbedDetached,
    /// The approach animation reached its target.
    ApproachCompleted,
    /// The timer started with the request ran out.
    EyesCloseDue,
    /// Both eyelids finished closing, or their fallback fired.
    EyesClosed,
    TeardownComplete,
    MinimumElapsed,
    /// World readiness settled. `ready` is `false` when construction or a
    /// required asset failed.
    WorldSettled { ready: bool },
    WorldFinished,
    EyesOpened,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionCommand {
    DetachEmbed,
    /// Arm the eyes-close timer, measured from the request.
    ScheduleEyesClose,
    StartApproach,
    /// Start the glitch, measured from the approach finishing.
    StartDisruption,
    CloseEyes,
    ShowLoader,
    TeardownDesk,
    /// Arm the minimum loading timer.
    StartGate,
    BuildWorld,
    HideLoader,
    /// Hand the world over to the player. With `ready`, the first ad is
    /// armed as well.
    FinishWorld { ready: bool },
    OpenEyes,
    RearmActivity,
}

/// The desk-to-world transition. One instance lives for the whole session.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SceneTransition {
    state: TransitionState,
    entered_at: f32,
    animation_completed: bool,
    eyes_closing_started: bool,
    disruption_started: bool,
    minimum_elapsed: bool,
    world_settled: Option<bool>,
}

impl SceneTransition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// Session time at which the current state was entered.
    pub fn entered_at(&self) -> f32 {
        self.entered_at
    }

    pub fn animation_completed(&self) -> bool {
        self.animation_completed
    }

    pub fn eyes_closing_started(&self) -> bool {
        self.eyes_closing_started
    }

    pub fn disruption_started(&self) -> bool {
        self.disruption_started
    }

    /// Whether the transition has started and not yet finished.
    pub fn in_progress(&self) -> bool {
        !matches!(self.state, TransitionState::Idle | TransitionState::Steady)
    }

    fn enter(mut self, state: TransitionState, now: f32) -> Self {
        debug!("transition {:?} -> {state:?} at {now:.2}s", self.state);
        self.state = state;
        self.entered_at = now;
        self
    }

    pub fn step(self, now: f32, event: TransitionEvent) -> (Self, Vec<TransitionCommand>) {
        use TransitionCommand as C;
        use TransitionEvent as E;
        use TransitionState as S;

        let mut next = self;
        match (self.state, event) {
            (S::Idle, E::Requested) => {
                info!("transition requested");
                next.animation_completed = false;
                next.eyes_closing_started = false;
                (
                    next.enter(S::ClosingEmbed, now),
                    vec![C::DetachEmbed, C::ScheduleEyesClose],
                )
            }
            (S::ClosingEmbed, E::EmbedDetached) => {
                (next.enter(S::ApproachAnim, now), vec![C::StartApproach])
            }
            (S::ApproachAnim, E::ApproachCompleted) => {
                next.animation_completed = true;
                next.disruption_started = true;
                (next.enter(S::DisruptEffect, now), vec![C::StartDisruption])
            }
            (S::EyesClosing, E::ApproachCompleted) if !self.animation_completed => {
                next.animation_completed = true;
                next.disruption_started = true;
                (next, vec![C::StartDisruption])
            }
            (S::ApproachAnim | S::DisruptEffect, E::EyesCloseDue) if !self.eyes_closing_started => {
                next.eyes_closing_started = true;
                (next.enter(S::EyesClosing, now), vec![C::CloseEyes])
            }
            (S::EyesClosing, E::EyesClosed) => (
                next.enter(S::SceneTeardown, now),
                vec![C::ShowLoader, C::TeardownDesk],
            ),
            (S::SceneTeardown, E::TeardownComplete) => {
                next.minimum_elapsed = false;
                next.world_settled = None;
                (
                    next.enter(S::LoadingGate, now),
                    vec![C::StartGate, C::BuildWorld],
                )
            }
            (S::LoadingGate, E::MinimumElapsed) => {
                next.minimum_elapsed = true;
                next.leave_gate(now)
            }
            (S::LoadingGate, E::WorldSettled { ready }) => {
                if !ready {
                    warn!("world failed to build, continuing without waiting");
                }
                next.world_settled = Some(ready);
                next.leave_gate(now)
            }
            (S::SceneBuild, E::WorldFinished) => (
                next.enter(S::EyesOpening, now),
                vec![C::OpenEyes, C::RearmActivity],
            ),
            (S::EyesOpening, E::EyesOpened) => {
                info!("transition finished");
                (next.enter(S::Steady, now), Vec::new())
            }
            (state, event) => {
                debug!("transition ignores {event:?} in {state:?}");
                (self, Vec::new())
            }
        }
    }

    /// The loader stays up until the minimum time has passed and the world
    /// has settled. A failed world does not wait for the minimum.
    fn leave_gate(self, now: f32) -> (Self, Vec<TransitionCommand>) {
        match self.world_settled {
            Some(ready) if self.minimum_elapsed || !ready => (
                self.enter(TransitionState::SceneBuild, now),
                vec![
                    TransitionCommand::HideLoader,
                    TransitionCommand::FinishWorld { ready },
                ],
            ),
            _ => (self, Vec::new()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaymentState {
    #[default]
    Idle,
    Delay,
    Barrage,
    Scene2Teardown,
    CompletionPopup,
    Reload,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentEvent {
    /// The card-entry overlay was closed, which confirms the payment.
    CardEntryClosed,
    BarrageDue,
    BarrageFinished,
    WorldTornDown,
    CompletionUnavailable,
    ReloadDue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentCommand {
    HideCardEntry,
    /// Brighten the environment and lower the inside model together.
    StartEffects,
    ScheduleApparelAd,
    ScheduleBarrage,
    /// Spawn the barrage and arm the timer that ends this step.
    StartBarrage,
    ClearBarrage,
    TeardownWorld,
    ShowCompletion,
    Reload,
}

/// Everything that follows a confirmed payment inside the world.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PaymentSequence {
    state: PaymentState,
    entered_at: f32,
}

impl PaymentSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn entered_at(&self) -> f32 {
        self.entered_at
    }

    fn enter(mut self, state: PaymentState, now: f32) -> Self {
        debug!("payment {:?} -> {state:?} at {now:.2}s", self.state);
        self.state = state;
        self.entered_at = now;
        self
    }

    pub fn step(self, now: f32, event: PaymentEvent) -> (Self, Vec<PaymentCommand>) {
        use PaymentCommand as C;
        use PaymentEvent as E;
        use PaymentState as S;

        match (self.state, event) {
            (S::Idle, E::CardEntryClosed) => {
                info!("payment confirmed");
                (
                    self.enter(S::Delay, now),
                    vec![
                        C::HideCardEntry,
                        C::StartEffects,
                        C::ScheduleApparelAd,
                        C::ScheduleBarrage,
                    ],
                )
            }
            (S::Delay, E::BarrageDue) => (self.enter(S::Barrage, now), vec![C::StartBarrage]),
            (S::Barrage, E::BarrageFinished) => (
                self.enter(S::Scene2Teardown, now),
                vec![C::ClearBarrage, C::TeardownWorld],
            ),
            (S::Scene2Teardown, E::WorldTornDown) => {
                (self.enter(S::CompletionPopup, now), vec![C::ShowCompletion])
            }
            (S::CompletionPopup, E::CompletionUnavailable) => {
                (self.enter(S::Reload, now), Vec::new())
            }
            (S::Reload, E::ReloadDue) => (self, vec![C::Reload]),
            (state, event) => {
                debug!("payment ignores {event:?} in {state:?}");
                (self, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransitionCommand as C;
    use TransitionEvent as E;
    use TransitionState as S;

    fn run(events: &[(f32, E)]) -> (SceneTransition, Vec<C>) {
        let mut machine = SceneTransition::new();
        let mut all = Vec::new();
        for &(now, event) in events {
            let (next, commands) = machine.step(now, event);
            machine = next;
            all.extend(commands);
        }
        (machine, all)
    }

    #[test]
    fn request_detaches_and_arms_the_eyes_timer() {
        let (machine, commands) = run(&[(1.0, E::Requested)]);
        assert_eq!(machine.state(), S::ClosingEmbed);
        assert_eq!(commands, vec![C::DetachEmbed, C::ScheduleEyesClose]);
    }

    #[test]
    fn disruption_waits_for_the_approach() {
        let (machine, commands) = run(&[
            (0.0, E::Requested),
            (0.0, E::EmbedDetached),
            (2.0, E::EyesCloseDue),
        ]);
        assert_eq!(machine.state(), S::EyesClosing);
        assert!(!commands.contains(&C::StartDisruption));

        let (machine, commands) = machine.step(3.5, E::ApproachCompleted);
        assert_eq!(commands, vec![C::StartDisruption]);
        assert!(machine.animation_completed());
        let (_, commands) = machine.step(3.6, E::ApproachCompleted);
        assert!(commands.is_empty());
    }

    #[test]
    fn approach_first_then_eyes() {
        let (machine, commands) = run(&[
            (0.0, E::Requested),
            (0.0, E::EmbedDetached),
            (3.5, E::ApproachCompleted),
            (3.6, E::EyesCloseDue),
            (3.7, E::EyesCloseDue),
        ]);
        assert_eq!(machine.state(), S::EyesClosing);
        assert_eq!(commands.iter().filter(|c| **c == C::CloseEyes).count(), 1);
        assert_eq!(commands.iter().filter(|c| **c == C::StartDisruption).count(), 1);
    }

    #[test]
    fn teardown_comes_before_build() {
        let (machine, commands) = run(&[
            (0.0, E::Requested),
            (0.0, E::EmbedDetached),
            (3.0, E::EyesCloseDue),
            (4.5, E::EyesClosed),
            (4.5, E::TeardownComplete),
        ]);
        assert_eq!(machine.state(), S::LoadingGate);
        let teardown = commands.iter().position(|c| *c == C::TeardownDesk).unwrap();
        let build = commands.iter().position(|c| *c == C::BuildWorld).unwrap();
        assert!(teardown < build);
    }

    fn at_gate() -> SceneTransition {
        run(&[
            (0.0, E::Requested),
            (0.0, E::EmbedDetached),
            (3.0, E::EyesCloseDue),
            (4.5, E::EyesClosed),
            (4.5, E::TeardownComplete),
        ])
        .0
    }

    #[test]
    fn gate_waits_for_the_minimum_time() {
        let (machine, commands) = at_gate().step(6.5, E::WorldSettled { ready: true });
        assert_eq!(machine.state(), S::LoadingGate);
        assert!(commands.is_empty());

        let (machine, commands) = machine.step(9.5, E::MinimumElapsed);
        assert_eq!(machine.state(), S::SceneBuild);
        assert_eq!(commands, vec![C::HideLoader, C::FinishWorld { ready: true }]);
    }

    #[test]
    fn gate_waits_for_the_world() {
        let (machine, commands) = at_gate().step(9.5, E::MinimumElapsed);
        assert!(commands.is_empty());
        let (machine, commands) = machine.step(12.0, E::WorldSettled { ready: true });
        assert_eq!(machine.state(), S::SceneBuild);
        assert_eq!(machine.entered_at(), 12.0);
        assert_eq!(commands[0], C::HideLoader);
    }

    #[test]
    fn failed_world_still_opens_the_eyes() {
        let (machine, commands) = at_gate().step(5.0, E::WorldSettled { ready: false });
        assert_eq!(commands, vec![C::HideLoader, C::FinishWorld { ready: false }]);
        let (machine, commands) = machine.step(5.0, E::WorldFinished);
        assert_eq!(commands, vec![C::OpenEyes, C::RearmActivity]);
        let (machine, _) = machine.step(5.0, E::EyesOpened);
        assert_eq!(machine.state(), S::Steady);
        assert!(!machine.in_progress());
        let (_, commands) = machine.step(9.5, E::MinimumElapsed);
        assert!(commands.is_empty());
    }

    #[test]
    fn second_request_is_ignored() {
        let (machine, _) = run(&[(0.0, E::Requested)]);
        let (again, commands) = machine.step(1.0, E::Requested);
        assert_eq!(again, machine);
        assert!(commands.is_empty());
    }

    #[test]
    fn payment_runs_to_completion() {
        use PaymentCommand as P;
        use PaymentEvent as Pe;

        let steps = [
            (0.0, Pe::CardEntryClosed),
            (10.0, Pe::BarrageDue),
            (13.0, Pe::BarrageFinished),
            (13.0, Pe::WorldTornDown),
        ];
        let mut sequence = PaymentSequence::new();
        let mut commands = Vec::new();
        for (now, event) in steps {
            let (next, issued) = sequence.step(now, event);
            sequence = next;
            commands.extend(issued);
        }
        assert_eq!(sequence.state(), PaymentState::CompletionPopup);
        assert_eq!(
            commands,
            vec![
                P::HideCardEntry,
                P::StartEffects,
                P::ScheduleApparelAd,
                P::ScheduleBarrage,
                P::StartBarrage,
                P::ClearBarrage,
                P::TeardownWorld,
                P::ShowCompletion,
            ]
        );
    }

    #[test]
    fn payment_confirms_once_and_reloads_on_fallback() {
        use PaymentEvent as Pe;

        let (sequence, _) = PaymentSequence::new().step(0.0, Pe::CardEntryClosed);
        let (sequence, commands) = sequence.step(1.0, Pe::CardEntryClosed);
        assert!(commands.is_empty());
        assert_eq!(sequence.state(), PaymentState::Delay);

        let (sequence, _) = sequence.step(10.0, Pe::BarrageDue);
        let (sequence, _) = sequence.step(13.0, Pe::BarrageFinished);
        let (sequence, _) = sequence.step(13.0, Pe::WorldTornDown);
        let (sequence, commands) = sequence.step(13.0, Pe::CompletionUnavailable);
        assert!(commands.is_empty());
        let (_, commands) = sequence.step(14.0, Pe::ReloadDue);
        assert_eq!(commands, vec![PaymentCommand::Reload]);
    }
}
