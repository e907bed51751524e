//! Event vocabulary shared by the session and its components.

use crate::host::HostEvent;
use crate::input::InputEvent;

/// Everything that can arrive between two frames.
///
/// The session drains these in arrival order at the start of each tick.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Input(InputEvent),
    /// Raw message text posted by an embedded page.
    Message(String),
    Host(HostEvent),
}

impl From<InputEvent> for SessionEvent {
    fn from(event: InputEvent) -> Self {
        Self::Input(event)
    }
}

impl From<HostEvent> for SessionEvent {
    fn from(event: HostEvent) -> Self {
        Self::Host(event)
    }
}

/// Payload of every timer the session arms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    IdleTimeout,
    EyesCloseDue,
    DisruptionEnd,
    EyelidFallback,
    LoadingGateElapsed,
    AdDue,
    ApparelAdDue,
    IndicatorReveal,
    /// The post-payment delay is over; the barrage starts.
    BarrageDue,
    /// The barrage's own lifetime ran out.
    BarrageExpired,
    /// The payment sequence moves past the barrage.
    BarrageFinished,
    FallbackReload,
    FlickerCheck,
    FlickerEnd,
}
