use std::time::Instant;

use super::{Animator, Completion, TweenHost};

/// Owns the tween scheduler and the liveness of the render loop.
///
/// Once [`stop`](Self::stop) has been called every later frame is refused, so
/// a frame callback that was already scheduled cannot touch freed resources.
#[derive(Debug)]
pub struct AnimationLifecycle {
    pub animator: Animator,
    destroyed: bool,
    last_frame: Option<Instant>,
    frames: u64,
}

impl Default for AnimationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationLifecycle {
    /// Longest step fed to the tweens; keeps a stalled window from skipping
    /// whole animations.
    pub const MAX_STEP: f32 = 0.1;

    pub fn new() -> Self {
        Self {
            animator: Animator::new(),
            destroyed: false,
            last_frame: None,
            frames: 0,
        }
    }

    /// Seconds since the previous frame, or `None` once destroyed.
    pub fn begin_frame(&mut self, now: Instant) -> Option<f32> {
        if self.destroyed {
            return None;
        }
        let dt = self
            .last_frame
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.frames += 1;
        Some(dt.min(Self::MAX_STEP))
    }

    pub fn advance(&mut self, dt: f32, host: &mut dyn TweenHost) -> Vec<Completion> {
        if self.destroyed {
            return Vec::new();
        }
        self.animator.advance(dt, host)
    }

    /// Stops the loop. Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        !std::mem::replace(&mut self.destroyed, true)
    }

    /// Cancels looping animations, then everything else. Returns the number
    /// of looping handles cancelled.
    pub fn cancel_animations(&mut self) -> usize {
        let loops = self.animator.cancel_looping();
        self.animator.clear();
        loops
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::test_support::Values;
    use crate::anim::{Property, Repeat, TweenSpec, TweenValue};
    use crate::scene::LightId;
    use std::time::Duration;

    #[test]
    fn first_frame_has_zero_step_and_steps_are_capped() {
        let mut lifecycle = AnimationLifecycle::new();
        let t0 = Instant::now();
        assert_eq!(lifecycle.begin_frame(t0), Some(0.0));
        let dt = lifecycle.begin_frame(t0 + Duration::from_millis(16)).unwrap();
        assert!((dt - 0.016).abs() < 1e-4);
        let dt = lifecycle.begin_frame(t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(dt, AnimationLifecycle::MAX_STEP);
    }

    #[test]
    fn stop_refuses_later_frames_and_is_idempotent() {
        let mut lifecycle = AnimationLifecycle::new();
        let prop = Property::LightIntensity(LightId(1));
        lifecycle.animator.start(
            TweenSpec::to(prop, 1.0)
                .repeat(Repeat::Infinite)
                .yoyo(true),
        );
        lifecycle.animator.start(TweenSpec::to(Property::Exposure, 1.0));

        assert!(lifecycle.stop());
        assert_eq!(lifecycle.begin_frame(Instant::now()), None);
        assert!(!lifecycle.stop());
        assert_eq!(lifecycle.cancel_animations(), 1);
        assert!(lifecycle.animator.is_empty());

        let mut host = Values::default();
        host.0.insert(prop, TweenValue::Scalar(0.0));
        assert!(lifecycle.advance(1.0, &mut host).is_empty());
    }
}
