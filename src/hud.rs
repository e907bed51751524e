//! Host-level effects that sit above both scenes: the eyelids and the
//! glitch overlay.

use log::{debug, warn};

use crate::event::TimerEvent;
use crate::host::{Anchor, Host};
use crate::timer::{TimerId, Timers};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eyelid {
    Top,
    Bottom,
}

impl Eyelid {
    fn index(self) -> usize {
        match self {
            Eyelid::Top => 0,
            Eyelid::Bottom => 1,
        }
    }
}

/// The only transition property that counts toward closing.
pub const EYELID_PROPERTY: &str = "height";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EyelidState {
    Open,
    Closing { ended: [bool; 2], fallback: TimerId },
    Closed,
}

/// What [`Eyelids::close`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseStart {
    /// The transition is running; completion will be reported later.
    Started,
    /// Closing already happened once this session.
    AlreadyStarted,
    /// The eyelid elements are missing; treat the eyes as closed now.
    Immediate,
}

/// Closing is one-shot per session. Completion needs both eyelids to
/// report the end of their height transition, with a fallback timer in
/// case either report never arrives.
#[derive(Debug)]
pub struct Eyelids {
    state: EyelidState,
    closing_started: bool,
}

impl Default for Eyelids {
    fn default() -> Self {
        Self {
            state: EyelidState::Open,
            closing_started: false,
        }
    }
}

impl Eyelids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EyelidState {
        self.state
    }

    pub fn closing_started(&self) -> bool {
        self.closing_started
    }

    pub fn close(
        &mut self,
        now: f32,
        duration: f32,
        fallback_margin: f32,
        host: &mut dyn Host,
        timers: &mut Timers<TimerEvent>,
    ) -> CloseStart {
        if self.closing_started {
            return CloseStart::AlreadyStarted;
        }
        self.closing_started = true;

        if !host.has_anchor(Anchor::Eyelid(Eyelid::Top))
            || !host.has_anchor(Anchor::Eyelid(Eyelid::Bottom))
        {
            warn!("eyelid elements missing, skipping the closing transition");
            self.state = EyelidState::Closed;
            return CloseStart::Immediate;
        }

        host.set_eyelids(true, duration);
        let fallback = timers.schedule(now, duration + fallback_margin, TimerEvent::EyelidFallback);
        self.state = EyelidState::Closing {
            ended: [false; 2],
            fallback,
        };
        CloseStart::Started
    }

    /// Record a transition-end report. Returns `true` on the report that
    /// completes closing.
    pub fn transition_ended(
        &mut self,
        eyelid: Eyelid,
        property: &str,
        timers: &mut Timers<TimerEvent>,
    ) -> bool {
        let EyelidState::Closing { mut ended, fallback } = self.state else {
            return false;
        };
        if property != EYELID_PROPERTY {
            return false;
        }
        ended[eyelid.index()] = true;
        if ended.iter().all(|e| *e) {
            timers.cancel(fallback);
            self.state = EyelidState::Closed;
            true
        } else {
            self.state = EyelidState::Closing { ended, fallback };
            false
        }
    }

    /// The fallback timer fired. Returns `true` if it completed closing.
    pub fn fallback_fired(&mut self, id: TimerId) -> bool {
        match self.state {
            EyelidState::Closing { fallback, .. } if fallback == id => {
                warn!("eyelid transition end not reported, closing by timeout");
                self.state = EyelidState::Closed;
                true
            }
            _ => false,
        }
    }

    /// Start opening. Nothing waits on this.
    pub fn open(&mut self, duration: f32, host: &mut dyn Host, timers: &mut Timers<TimerEvent>) {
        if let EyelidState::Closing { fallback, .. } = self.state {
            timers.cancel(fallback);
        }
        if host.has_anchor(Anchor::Eyelid(Eyelid::Top))
            && host.has_anchor(Anchor::Eyelid(Eyelid::Bottom))
        {
            host.set_eyelids(false, duration);
        }
        self.state = EyelidState::Open;
    }
}

/// The glitch overlay. Each trigger replaces any running glitch.
#[derive(Debug, Default)]
pub struct Disruption {
    end: Option<TimerId>,
    triggered: u32,
}

impl Disruption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(
        &mut self,
        now: f32,
        duration: f32,
        host: &mut dyn Host,
        timers: &mut Timers<TimerEvent>,
    ) -> bool {
        if !host.has_anchor(Anchor::Glitch) {
            warn!("glitch overlay missing, skipping {duration:.2}s glitch");
            return false;
        }
        if let Some(previous) = self.end.take() {
            timers.cancel(previous);
        }
        debug!("glitch for {duration:.2}s");
        host.set_glitch(true);
        self.end = Some(timers.schedule(now, duration, TimerEvent::DisruptionEnd));
        self.triggered += 1;
        true
    }

    pub fn ended(&mut self, id: TimerId, host: &mut dyn Host) {
        if self.end == Some(id) {
            self.end = None;
            host.set_glitch(false);
        }
    }

    pub fn is_active(&self) -> bool {
        self.end.is_some()
    }

    pub fn trigger_count(&self) -> u32 {
        self.triggered
    }
}
