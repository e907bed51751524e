//! Time-driven interpolation.
//!
//! Tweens are polled, not pushed: each frame samples them with the current
//! time and they report where they are and whether they are done.

use glam::Vec3;

/// Easing functions for tweens.
///
/// These control the acceleration curve of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed throughout.
    #[default]
    Linear,
    /// Start slow, accelerate.
    EaseIn,
    /// Start fast, decelerate.
    EaseOut,
    /// Quadratic: slow, fast, slow.
    EaseInOut,
}

impl Easing {
    /// Apply the easing function to a linear progress value (0.0 to 1.0).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// Values a tween can interpolate.
pub trait Lerp: Copy {
    fn lerp(self, to: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp(self, to: Self, t: f32) -> Self {
        Vec3::lerp(self, to, t)
    }
}

/// One interpolation from `from` to `to`, started at a recorded time.
#[derive(Clone, Copy, Debug)]
pub struct Tween<T> {
    pub from: T,
    pub to: T,
    pub started_at: f32,
    pub duration: f32,
    pub easing: Easing,
}

impl<T: Lerp> Tween<T> {
    pub fn new(from: T, to: T, started_at: f32, duration: f32) -> Self {
        Self {
            from,
            to,
            started_at,
            duration,
            easing: Easing::Linear,
        }
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Linear progress in `[0, 1]`. A zero-length tween is complete
    /// immediately.
    pub fn raw_progress(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0)
    }

    /// Eased progress in `[0, 1]`.
    pub fn progress(&self, now: f32) -> f32 {
        self.easing.apply(self.raw_progress(now))
    }

    pub fn sample(&self, now: f32) -> T {
        self.from.lerp(self.to, self.progress(now))
    }

    pub fn is_finished(&self, now: f32) -> bool {
        self.raw_progress(now) >= 1.0
    }
}

/// A tween plus a latch that reports its completion exactly once.
#[derive(Clone, Copy, Debug)]
pub struct Animation<T> {
    tween: Tween<T>,
    completed: bool,
}

/// What one call to [`Animation::advance`] produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step<T> {
    pub value: T,
    /// `true` only on the frame the animation reached its end.
    pub just_completed: bool,
}

impl<T: Lerp> Animation<T> {
    pub fn new(tween: Tween<T>) -> Self {
        Self {
            tween,
            completed: false,
        }
    }

    pub fn advance(&mut self, now: f32) -> Step<T> {
        let value = self.tween.sample(now);
        let just_completed = !self.completed && self.tween.is_finished(now);
        if just_completed {
            self.completed = true;
        }
        Step {
            value,
            just_completed,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn tween(&self) -> &Tween<T> {
        &self.tween
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn ease_in_out_endpoints_and_midpoint() {
        let e = Easing::EaseInOut;
        assert_eq!(e.apply(0.0), 0.0);
        assert_eq!(e.apply(1.0), 1.0);
        assert!((e.apply(0.5) - 0.5).abs() < EPS);
        assert!((e.apply(0.25) - 0.125).abs() < EPS);
    }

    #[test]
    fn progress_is_monotonic_over_the_duration() {
        let tween = Tween::new(0.0f32, 1.0, 2.0, 3.5).easing(Easing::EaseInOut);
        assert_eq!(tween.progress(2.0), 0.0);
        assert_eq!(tween.progress(5.5), 1.0);

        let mut previous = tween.progress(1.0);
        for step in 0..=700 {
            let now = 1.0 + step as f32 * 0.01;
            let p = tween.progress(now);
            assert!(p + EPS >= previous, "progress went backwards at {now}");
            assert!((0.0..=1.0).contains(&p));
            previous = p;
        }
    }

    #[test]
    fn sampled_position_matches_eased_lerp() {
        let start = Vec3::new(0.2, -0.4, 9.0);
        let target = Vec3::new(0.0, 0.0, 3.3);
        let tween = Tween::new(start, target, 0.0, 3.5).easing(Easing::EaseInOut);
        for step in 0..=35 {
            let now = step as f32 * 0.1;
            let expected = start.lerp(target, Easing::EaseInOut.apply(now / 3.5));
            assert!(tween.sample(now).distance(expected) < 1e-4);
        }
    }

    #[test]
    fn animation_reports_completion_once() {
        let mut anim = Animation::new(Tween::new(0.0f32, 10.0, 0.0, 1.0));
        assert!(!anim.advance(0.5).just_completed);
        assert!(anim.advance(1.0).just_completed);
        assert!(!anim.advance(1.5).just_completed);
        assert!(anim.is_completed());
        assert_eq!(anim.advance(2.0).value, 10.0);
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let tween = Tween::new(1.0f32, 2.0, 5.0, 0.0);
        assert!(tween.is_finished(5.0));
        assert_eq!(tween.sample(5.0), 2.0);
    }
}
