//! Cooperative one-shot timers.
//!
//! Nothing here runs on its own: the session asks for due timers once per
//! frame and handles them one at a time, so a handler can cancel or
//! schedule other timers before they are looked at.

use std::fmt;

/// Handle to a scheduled timer. Handles are never reused within a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Debug)]
struct Entry<E> {
    id: TimerId,
    deadline: f32,
    event: E,
}

/// A table of pending one-shot timers carrying an event payload.
///
/// Times are seconds since session start, the same clock the frame loop
/// passes to `tick`.
#[derive(Debug)]
pub struct Timers<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
}

impl<E> Default for Timers<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<E> Timers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer that fires `delay` seconds after `now`.
    pub fn schedule(&mut self, now: f32, delay: f32, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            deadline: now + delay.max(0.0),
            event,
        });
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Cancel every timer in `ids`, returning how many were still pending.
    pub fn cancel_all(&mut self, ids: impl IntoIterator<Item = TimerId>) -> usize {
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<f32> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.deadline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over pending events with their deadlines.
    pub fn pending(&self) -> impl Iterator<Item = (TimerId, f32, &E)> {
        self.entries.iter().map(|e| (e.id, e.deadline, &e.event))
    }

    /// Remove and return the earliest timer whose deadline is at or before
    /// `now`. Timers sharing a deadline fire in the order they were armed.
    pub fn pop_due(&mut self, now: f32) -> Option<(TimerId, E)> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= now)
            .min_by(|(_, a), (_, b)| {
                a.deadline
                    .total_cmp(&b.deadline)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|(i, _)| i)?;
        let entry = self.entries.remove(index);
        Some((entry.id, entry.event))
    }
}
