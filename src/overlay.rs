//! Popup overlays in the world scene.
//!
//! One [`OverlayManager`] owns a descriptor per overlay kind and the
//! barrage pool. The ad → subscription → card-entry chain is a table here,
//! not a set of flags spread over handlers: at most one chain overlay is
//! visible, and the only way forward is [`OverlayManager::advance`].

use glam::Vec2;
use log::{debug, info, warn};
use rand::Rng;

use crate::config::OverlayTimings;
use crate::event::TimerEvent;
use crate::host::{Anchor, Host};
use crate::timer::{TimerId, Timers};

/// Page loaded into every barrage popup.
pub const BARRAGE_PAGE: &str = "random_popup.html";
/// Query appended to the ad page on its second appearance.
pub const SECOND_APPEARANCE: &str = "?appearance=second";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKind {
    Ad,
    Subscription,
    CardEntry,
    ApparelAd,
    Completion,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 5] = [
        OverlayKind::Ad,
        OverlayKind::Subscription,
        OverlayKind::CardEntry,
        OverlayKind::ApparelAd,
        OverlayKind::Completion,
    ];

    pub fn page(self) -> &'static str {
        match self {
            OverlayKind::Ad => "hudpopup.html",
            OverlayKind::Subscription => "sub.html",
            OverlayKind::CardEntry => "card_entry.html",
            OverlayKind::ApparelAd => "apparel_popup_ad.html",
            OverlayKind::Completion => "integration_complete.html",
        }
    }

    /// Chain overlays exclude each other.
    pub fn in_chain(self) -> bool {
        matches!(
            self,
            OverlayKind::Ad | OverlayKind::Subscription | OverlayKind::CardEntry
        )
    }

    /// The overlay the chain moves to from this one.
    pub fn successor(self) -> Option<OverlayKind> {
        match self {
            OverlayKind::Ad => Some(OverlayKind::Subscription),
            OverlayKind::Subscription => Some(OverlayKind::CardEntry),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayDescriptor {
    pub kind: OverlayKind,
    pub visible: bool,
    /// URL loaded on the most recent show.
    pub url: Option<String>,
    pub show_count: u32,
    /// Pending show for this overlay, if one is armed.
    pub timer: Option<TimerId>,
}

impl OverlayDescriptor {
    fn new(kind: OverlayKind) -> Self {
        Self {
            kind,
            visible: false,
            url: None,
            show_count: 0,
            timer: None,
        }
    }
}

/// One popup of the barrage. Popups never take input.
#[derive(Clone, Debug, PartialEq)]
pub struct BarragePopup {
    pub id: u32,
    pub position: Vec2,
    pub size: Vec2,
    pub url: &'static str,
    pub interactive: bool,
}

/// Result of trying to show the completion overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Shown,
    /// The overlay could not be shown; a reload is scheduled instead.
    FallbackReload(TimerId),
}

#[derive(Debug)]
pub struct OverlayManager {
    table: [OverlayDescriptor; 5],
    barrage: Vec<BarragePopup>,
    barrage_timer: Option<TimerId>,
    next_popup: u32,
    timings: OverlayTimings,
}

impl OverlayManager {
    pub fn new(timings: OverlayTimings) -> Self {
        Self {
            table: OverlayKind::ALL.map(OverlayDescriptor::new),
            barrage: Vec::new(),
            barrage_timer: None,
            next_popup: 0,
            timings,
        }
    }

    pub fn descriptor(&self, kind: OverlayKind) -> &OverlayDescriptor {
        &self.table[kind.index()]
    }

    fn entry(&mut self, kind: OverlayKind) -> &mut OverlayDescriptor {
        &mut self.table[kind.index()]
    }

    pub fn is_visible(&self, kind: OverlayKind) -> bool {
        self.descriptor(kind).visible
    }

    /// The chain overlay currently showing, if any.
    pub fn visible_chain(&self) -> Option<OverlayKind> {
        self.table
            .iter()
            .find(|d| d.kind.in_chain() && d.visible)
            .map(|d| d.kind)
    }

    pub fn barrage(&self) -> &[BarragePopup] {
        &self.barrage
    }

    /// Every timer this manager currently has armed.
    pub fn armed_timers(&self) -> Vec<TimerId> {
        self.table
            .iter()
            .filter_map(|d| d.timer)
            .chain(self.barrage_timer)
            .collect()
    }

    fn ad_retired(&self) -> bool {
        self.descriptor(OverlayKind::Ad).show_count >= self.timings.ad_max_appearances
    }

    /// Show an overlay. A no-op when it is already visible, when its anchor
    /// is missing, when another chain overlay is up, or when the ad has
    /// used up its appearances.
    pub fn show(&mut self, kind: OverlayKind, host: &mut dyn Host, timers: &mut Timers<TimerEvent>) -> bool {
        if let Some(pending) = self.entry(kind).timer.take() {
            timers.cancel(pending);
        }
        if self.is_visible(kind) {
            debug!("{kind:?} overlay already visible");
            return false;
        }
        if !host.has_anchor(Anchor::Overlay(kind)) {
            warn!("{kind:?} overlay anchor missing, not showing");
            return false;
        }
        if kind.in_chain() {
            if let Some(blocking) = self.visible_chain() {
                warn!("{kind:?} overlay blocked while {blocking:?} is showing");
                return false;
            }
        }
        if kind == OverlayKind::Ad && self.ad_retired() {
            debug!("ad overlay retired");
            return false;
        }

        let entry = self.entry(kind);
        let mut url = kind.page().to_owned();
        if kind == OverlayKind::Ad && entry.show_count == 1 {
            url.push_str(SECOND_APPEARANCE);
        }
        host.load_overlay(kind, &url);
        entry.visible = true;
        entry.show_count += 1;
        info!("showing {kind:?} overlay ({url})");
        entry.url = Some(url);
        true
    }

    /// Hide an overlay. With `respawn`, the ad comes back once after the
    /// respawn delay.
    pub fn hide(
        &mut self,
        kind: OverlayKind,
        respawn: bool,
        now: f32,
        host: &mut dyn Host,
        timers: &mut Timers<TimerEvent>,
    ) -> bool {
        if !self.is_visible(kind) {
            return false;
        }
        host.unload_overlay(kind);
        self.entry(kind).visible = false;
        debug!("hid {kind:?} overlay");

        if respawn && kind == OverlayKind::Ad {
            if self.ad_retired() {
                info!("ad overlay closed for the last time");
            } else {
                let delay = self.timings.ad_respawn_delay;
                let id = timers.schedule(now, delay, TimerEvent::AdDue);
                self.entry(kind).timer = Some(id);
                debug!("ad overlay returns in {delay}s");
            }
        }
        true
    }

    /// Move the chain forward from `from` to its successor. Only works
    /// while `from` is the visible chain overlay.
    pub fn advance(
        &mut self,
        from: OverlayKind,
        now: f32,
        host: &mut dyn Host,
        timers: &mut Timers<TimerEvent>,
    ) -> bool {
        let Some(next) = from.successor() else {
            return false;
        };
        if self.visible_chain() != Some(from) {
            debug!("ignoring {from:?} -> {next:?}, {from:?} is not showing");
            return false;
        }
        self.hide(from, false, now, host, timers);
        self.show(next, host, timers)
    }

    /// Arm a delayed show for `kind`, replacing any earlier one.
    pub fn schedule(
        &mut self,
        kind: OverlayKind,
        now: f32,
        delay: f32,
        timers: &mut Timers<TimerEvent>,
    ) -> TimerId {
        let event = match kind {
            OverlayKind::ApparelAd => TimerEvent::ApparelAdDue,
            _ => TimerEvent::AdDue,
        };
        let id = timers.schedule(now, delay, event);
        if let Some(previous) = self.entry(kind).timer.replace(id) {
            timers.cancel(previous);
        }
        id
    }

    /// Forget a fired timer so it is not cancelled later.
    pub fn timer_fired(&mut self, id: TimerId) {
        for entry in &mut self.table {
            if entry.timer == Some(id) {
                entry.timer = None;
            }
        }
        if self.barrage_timer == Some(id) {
            self.barrage_timer = None;
        }
    }

    /// Spawn the barrage at random positions that keep every popup fully
    /// on screen. Any earlier barrage is cleared first.
    pub fn start_barrage(
        &mut self,
        now: f32,
        rng: &mut impl Rng,
        host: &mut dyn Host,
        timers: &mut Timers<TimerEvent>,
    ) -> usize {
        if !host.has_anchor(Anchor::BarrageContainer) {
            warn!("barrage container missing, skipping barrage");
            return 0;
        }
        self.clear_barrage(host, timers);

        let size = self.timings.barrage_popup_size;
        let room = (host.viewport() - size).max(Vec2::ZERO);
        for _ in 0..self.timings.barrage_count {
            let popup = BarragePopup {
                id: self.next_popup,
                position: Vec2::new(rng.gen_range(0.0..=room.x), rng.gen_range(0.0..=room.y)),
                size,
                url: BARRAGE_PAGE,
                interactive: false,
            };
            self.next_popup += 1;
            host.spawn_barrage(&popup);
            self.barrage.push(popup);
        }
        self.barrage_timer = Some(timers.schedule(
            now,
            self.timings.barrage_lifetime,
            TimerEvent::BarrageExpired,
        ));
        info!("barrage of {} popups", self.barrage.len());
        self.barrage.len()
    }

    /// Fade and remove every barrage popup. Safe to call repeatedly.
    pub fn clear_barrage(&mut self, host: &mut dyn Host, timers: &mut Timers<TimerEvent>) -> usize {
        if let Some(id) = self.barrage_timer.take() {
            timers.cancel(id);
        }
        let count = self.barrage.len();
        for popup in self.barrage.drain(..) {
            host.dismiss_barrage(popup.id);
        }
        if count > 0 {
            debug!("cleared {count} barrage popups");
        }
        count
    }

    /// Show the completion overlay, or schedule a reload when that is not
    /// possible. The completion page is in charge of the final reload.
    pub fn show_completion(
        &mut self,
        now: f32,
        host: &mut dyn Host,
        timers: &mut Timers<TimerEvent>,
    ) -> Completion {
        let kind = OverlayKind::Completion;
        if self.is_visible(kind) || !host.has_anchor(Anchor::Overlay(kind)) {
            warn!("completion overlay unavailable, reloading directly");
            let delay = self.timings.completion_fallback_delay;
            return Completion::FallbackReload(timers.schedule(now, delay, TimerEvent::FallbackReload));
        }
        self.show(kind, host, timers);
        Completion::Shown
    }

    /// Hide everything and cancel every timer the manager armed.
    pub fn hide_all(&mut self, now: f32, host: &mut dyn Host, timers: &mut Timers<TimerEvent>) {
        for kind in OverlayKind::ALL {
            if let Some(id) = self.entry(kind).timer.take() {
                timers.cancel(id);
            }
            self.hide(kind, false, now, host, timers);
        }
        self.clear_barrage(host, timers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HostCall, RecordingHost};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (OverlayManager, RecordingHost, Timers<TimerEvent>) {
        (
            OverlayManager::new(OverlayTimings::default()),
            RecordingHost::new(),
            Timers::new(),
        )
    }

    #[test]
    fn show_is_idempotent() {
        let (mut overlays, mut host, mut timers) = setup();
        assert!(overlays.show(OverlayKind::Ad, &mut host, &mut timers));
        assert!(!overlays.show(OverlayKind::Ad, &mut host, &mut timers));
        let loads = host
            .calls
            .iter()
            .filter(|c| matches!(c, HostCall::LoadOverlay(OverlayKind::Ad, _)))
            .count();
        assert_eq!(loads, 1);
        assert_eq!(overlays.descriptor(OverlayKind::Ad).show_count, 1);
        assert!(timers.is_empty());
    }

    #[test]
    fn missing_anchor_is_a_silent_no_op() {
        let (mut overlays, _, mut timers) = setup();
        let mut host = RecordingHost::new().without(Anchor::Overlay(OverlayKind::Subscription));
        assert!(!overlays.show(OverlayKind::Subscription, &mut host, &mut timers));
        assert!(!overlays.is_visible(OverlayKind::Subscription));
        assert!(host.calls.is_empty());
    }

    #[test]
    fn ad_respawns_once_with_the_second_marker() {
        let (mut overlays, mut host, mut timers) = setup();
        overlays.show(OverlayKind::Ad, &mut host, &mut timers);
        overlays.hide(OverlayKind::Ad, true, 10.0, &mut host, &mut timers);

        let (id, event) = timers.pop_due(15.0).unwrap();
        assert_eq!(event, TimerEvent::AdDue);
        overlays.timer_fired(id);
        assert!(overlays.show(OverlayKind::Ad, &mut host, &mut timers));
        assert_eq!(
            overlays.descriptor(OverlayKind::Ad).url.as_deref(),
            Some("hudpopup.html?appearance=second")
        );

        overlays.hide(OverlayKind::Ad, true, 20.0, &mut host, &mut timers);
        assert!(timers.is_empty());
        assert!(!overlays.show(OverlayKind::Ad, &mut host, &mut timers));
    }

    #[test]
    fn chain_moves_forward_one_step_at_a_time() {
        let (mut overlays, mut host, mut timers) = setup();
        assert!(!overlays.advance(OverlayKind::Ad, 0.0, &mut host, &mut timers));

        overlays.show(OverlayKind::Ad, &mut host, &mut timers);
        assert!(!overlays.advance(OverlayKind::Subscription, 0.0, &mut host, &mut timers));
        assert!(overlays.advance(OverlayKind::Ad, 0.0, &mut host, &mut timers));
        assert_eq!(overlays.visible_chain(), Some(OverlayKind::Subscription));
        assert!(overlays.advance(OverlayKind::Subscription, 0.0, &mut host, &mut timers));
        assert_eq!(overlays.visible_chain(), Some(OverlayKind::CardEntry));
        assert!(!overlays.is_visible(OverlayKind::Ad));
        assert!(!overlays.is_visible(OverlayKind::Subscription));
        assert!(timers.is_empty());
    }

    #[test]
    fn chain_overlays_exclude_each_other() {
        let (mut overlays, mut host, mut timers) = setup();
        overlays.show(OverlayKind::Subscription, &mut host, &mut timers);
        assert!(!overlays.show(OverlayKind::Ad, &mut host, &mut timers));
        assert!(overlays.show(OverlayKind::ApparelAd, &mut host, &mut timers));
    }

    #[test]
    fn barrage_stays_on_screen() {
        let (mut overlays, mut host, mut timers) = setup();
        let mut rng = StdRng::seed_from_u64(7);
        for (w, h) in [(1280.0, 720.0), (281.0, 181.0), (200.0, 100.0), (1920.0, 1080.0)] {
            host.viewport = Vec2::new(w, h);
            for round in 0..20 {
                assert_eq!(overlays.start_barrage(round as f32, &mut rng, &mut host, &mut timers), 15);
                for popup in overlays.barrage() {
                    assert!(!popup.interactive);
                    assert!(popup.position.x >= 0.0 && popup.position.x <= (w - 280.0).max(0.0));
                    assert!(popup.position.y >= 0.0 && popup.position.y <= (h - 180.0).max(0.0));
                }
            }
        }
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn clearing_the_barrage_is_idempotent() {
        let (mut overlays, mut host, mut timers) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        overlays.start_barrage(0.0, &mut rng, &mut host, &mut timers);
        assert_eq!(overlays.clear_barrage(&mut host, &mut timers), 15);
        assert_eq!(overlays.clear_barrage(&mut host, &mut timers), 0);
        let dismissed = host
            .calls
            .iter()
            .filter(|c| matches!(c, HostCall::DismissBarrage(_)))
            .count();
        assert_eq!(dismissed, 15);
        assert!(timers.is_empty());
    }

    #[test]
    fn completion_falls_back_to_reload_without_anchor() {
        let (mut overlays, _, mut timers) = setup();
        let mut host = RecordingHost::new().without(Anchor::Overlay(OverlayKind::Completion));
        let outcome = overlays.show_completion(5.0, &mut host, &mut timers);
        let Completion::FallbackReload(id) = outcome else {
            panic!("expected fallback, got {outcome:?}");
        };
        assert_eq!(timers.deadline(id), Some(6.0));
    }

    #[test]
    fn hide_all_cancels_every_armed_timer() {
        let (mut overlays, mut host, mut timers) = setup();
        let mut rng = StdRng::seed_from_u64(3);
        overlays.schedule(OverlayKind::Ad, 0.0, 5.0, &mut timers);
        overlays.schedule(OverlayKind::ApparelAd, 0.0, 3.0, &mut timers);
        overlays.start_barrage(0.0, &mut rng, &mut host, &mut timers);
        overlays.show(OverlayKind::CardEntry, &mut host, &mut timers);
        assert_eq!(overlays.armed_timers().len(), 3);

        overlays.hide_all(1.0, &mut host, &mut timers);
        assert!(timers.is_empty());
        assert!(overlays.armed_timers().is_empty());
        assert!(overlays.visible_chain().is_none());
        assert!(overlays.barrage().is_empty());
    }
}
