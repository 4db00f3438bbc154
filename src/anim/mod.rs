//! Tween scheduler.
//!
//! Tweens are keyed by the exact property they write. Starting a tween on a
//! property replaces whatever was running there, so two tweens can never
//! fight over one value. Infinite tweens are additionally tracked in a loop
//! registry so they can be cancelled in bulk at teardown.

pub mod ease;
pub mod intro;
pub mod lifecycle;

pub use ease::Ease;

use glam::Vec3;
use std::collections::BTreeSet;

use crate::scene::{LightId, MeshId, SpriteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn get(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    pub fn set(self, v: &mut Vec3, value: f32) {
        match self {
            Axis::X => v.x = value,
            Axis::Y => v.y = value,
            Axis::Z => v.z = value,
        }
    }
}

/// An animatable object. Cancellation works at this granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Light(LightId),
    MeshPosition(MeshId),
    MeshRotation(MeshId),
    MeshScale(MeshId),
    Material(MeshId),
    Sprite(SpriteId),
    Camera,
    OrbitTarget,
    Renderer,
    Timer,
}

/// One animatable value on a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    LightIntensity(LightId),
    MeshPosition(MeshId, Axis),
    MeshRotation(MeshId, Axis),
    MeshScale(MeshId),
    MaterialOpacity(MeshId),
    MaterialEmissive(MeshId),
    SpriteOpacity(SpriteId),
    CameraPosition,
    OrbitTarget,
    Exposure,
    /// Writes nothing; fires its completion once the delay has run out.
    Timer(Completion),
}

impl Property {
    pub fn target(self) -> Target {
        match self {
            Property::LightIntensity(id) => Target::Light(id),
            Property::MeshPosition(id, _) => Target::MeshPosition(id),
            Property::MeshRotation(id, _) => Target::MeshRotation(id),
            Property::MeshScale(id) => Target::MeshScale(id),
            Property::MaterialOpacity(id) | Property::MaterialEmissive(id) => Target::Material(id),
            Property::SpriteOpacity(id) => Target::Sprite(id),
            Property::CameraPosition => Target::Camera,
            Property::OrbitTarget => Target::OrbitTarget,
            Property::Exposure => Target::Renderer,
            Property::Timer(_) => Target::Timer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenValue {
    Scalar(f32),
    Vector(Vec3),
}

impl TweenValue {
    fn lerp(self, to: TweenValue, t: f32) -> Option<TweenValue> {
        match (self, to) {
            (TweenValue::Scalar(a), TweenValue::Scalar(b)) => {
                Some(TweenValue::Scalar(a + (b - a) * t))
            }
            (TweenValue::Vector(a), TweenValue::Vector(b)) => Some(TweenValue::Vector(a.lerp(b, t))),
            _ => None,
        }
    }

    fn offset(self, delta: TweenValue) -> Option<TweenValue> {
        match (self, delta) {
            (TweenValue::Scalar(a), TweenValue::Scalar(b)) => Some(TweenValue::Scalar(a + b)),
            (TweenValue::Vector(a), TweenValue::Vector(b)) => Some(TweenValue::Vector(a + b)),
            _ => None,
        }
    }

    pub fn as_scalar(self) -> Option<f32> {
        match self {
            TweenValue::Scalar(v) => Some(v),
            TweenValue::Vector(_) => None,
        }
    }

    pub fn as_vector(self) -> Option<Vec3> {
        match self {
            TweenValue::Vector(v) => Some(v),
            TweenValue::Scalar(_) => None,
        }
    }
}

impl From<f32> for TweenValue {
    fn from(v: f32) -> Self {
        TweenValue::Scalar(v)
    }
}

impl From<Vec3> for TweenValue {
    fn from(v: Vec3) -> Self {
        TweenValue::Vector(v)
    }
}

/// Follow-up work a finished tween asks the controller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Completion {
    ZoomInSettled,
    ZoomOutSettled,
    AssemblyFinished,
    StartButtonPulse(LightId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Count(u32),
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Goal {
    Absolute(TweenValue),
    Relative(TweenValue),
}

/// Builder for a tween; hand it to [`Animator::start`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenSpec {
    property: Property,
    goal: Goal,
    from: Option<TweenValue>,
    duration: f32,
    delay: f32,
    ease: Ease,
    repeat: Repeat,
    yoyo: bool,
    on_complete: Option<Completion>,
}

impl TweenSpec {
    pub fn to(property: Property, value: impl Into<TweenValue>) -> Self {
        Self {
            property,
            goal: Goal::Absolute(value.into()),
            from: None,
            duration: 0.5,
            delay: 0.0,
            ease: Ease::default(),
            repeat: Repeat::Count(0),
            yoyo: false,
            on_complete: None,
        }
    }

    /// Reports `completion` after `secs` without touching any value. Hover
    /// and lighting cancellations never reach it.
    pub fn after(secs: f32, completion: Completion) -> Self {
        Self::to(Property::Timer(completion), 0.0)
            .duration(0.0)
            .delay(secs)
            .on_complete(completion)
    }

    /// Tween by `delta` from whatever value the property holds at start.
    pub fn by(property: Property, delta: impl Into<TweenValue>) -> Self {
        let delta = delta.into();
        Self {
            goal: Goal::Relative(delta),
            ..Self::to(property, delta)
        }
    }

    /// Start from an explicit value instead of the current one.
    pub fn from(mut self, value: impl Into<TweenValue>) -> Self {
        self.from = Some(value.into());
        self
    }

    pub fn duration(mut self, secs: f32) -> Self {
        self.duration = secs.max(0.0);
        self
    }

    pub fn delay(mut self, secs: f32) -> Self {
        self.delay = secs.max(0.0);
        self
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    pub fn on_complete(mut self, completion: Completion) -> Self {
        self.on_complete = Some(completion);
        self
    }

    pub fn property(&self) -> Property {
        self.property
    }
}

/// Read/write access to the values tweens animate.
///
/// `write` returns `false` when the target no longer exists; the tween is then
/// dropped.
pub trait TweenHost {
    fn read(&self, property: Property) -> Option<TweenValue>;
    fn write(&mut self, property: Property, value: TweenValue) -> bool;
}

#[derive(Debug, Clone)]
struct Tween {
    id: TweenId,
    spec: TweenSpec,
    elapsed: f32,
    resolved: Option<(TweenValue, TweenValue)>,
}

impl Tween {
    fn is_looping(&self) -> bool {
        self.spec.repeat == Repeat::Infinite
    }
}

enum Step {
    Running,
    Finished,
    Dropped,
}

#[derive(Debug, Default)]
pub struct Animator {
    tweens: Vec<Tween>,
    loops: BTreeSet<TweenId>,
    next_id: u64,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `spec`, replacing any tween already writing the same property.
    pub fn start(&mut self, spec: TweenSpec) -> TweenId {
        self.kill_property(spec.property);
        self.next_id += 1;
        let id = TweenId(self.next_id);
        let tween = Tween {
            id,
            spec,
            elapsed: 0.0,
            resolved: None,
        };
        if tween.is_looping() {
            self.loops.insert(id);
        }
        self.tweens.push(tween);
        id
    }

    pub fn kill_property(&mut self, property: Property) -> usize {
        self.kill_where(|tween| tween.spec.property == property)
    }

    /// Cancels every tween writing any property of `target`.
    pub fn kill_tweens_of(&mut self, target: Target) -> usize {
        let killed = self.kill_where(|tween| tween.spec.property.target() == target);
        if killed > 0 {
            log::debug!("Cancelled {} tween(s) on {:?}", killed, target);
        }
        killed
    }

    pub fn kill(&mut self, id: TweenId) -> bool {
        self.kill_where(|tween| tween.id == id) > 0
    }

    fn kill_where(&mut self, predicate: impl Fn(&Tween) -> bool) -> usize {
        let before = self.tweens.len();
        let loops = &mut self.loops;
        self.tweens.retain(|tween| {
            if predicate(tween) {
                loops.remove(&tween.id);
                false
            } else {
                true
            }
        });
        before - self.tweens.len()
    }

    /// Cancels every registered infinite tween.
    pub fn cancel_looping(&mut self) -> usize {
        let loops = std::mem::take(&mut self.loops);
        let before = self.tweens.len();
        self.tweens.retain(|tween| !loops.contains(&tween.id));
        before - self.tweens.len()
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
        self.loops.clear();
    }

    pub fn is_animating(&self, target: Target) -> bool {
        self.tweens
            .iter()
            .any(|tween| tween.spec.property.target() == target)
    }

    pub fn active_on(&self, property: Property) -> usize {
        self.tweens
            .iter()
            .filter(|tween| tween.spec.property == property)
            .count()
    }

    pub fn looping_handles(&self) -> impl Iterator<Item = TweenId> + '_ {
        self.loops.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    /// Advances every tween by `dt` seconds and returns the completions of
    /// the ones that finished, in start order.
    pub fn advance(&mut self, dt: f32, host: &mut dyn TweenHost) -> Vec<Completion> {
        let mut completions = Vec::new();
        let mut finished = Vec::new();
        for tween in &mut self.tweens {
            match step(tween, dt, host) {
                Step::Running => {}
                Step::Finished => {
                    finished.push(tween.id);
                    if let Some(completion) = tween.spec.on_complete {
                        completions.push(completion);
                    }
                }
                Step::Dropped => {
                    log::debug!(
                        "Dropping tween on {:?}: target no longer exists",
                        tween.spec.property
                    );
                    finished.push(tween.id);
                }
            }
        }
        if !finished.is_empty() {
            self.tweens.retain(|tween| !finished.contains(&tween.id));
            for id in finished {
                self.loops.remove(&id);
            }
        }
        completions
    }
}

fn step(tween: &mut Tween, dt: f32, host: &mut dyn TweenHost) -> Step {
    let spec = tween.spec;
    tween.elapsed += dt.max(0.0);
    if tween.elapsed < spec.delay {
        return Step::Running;
    }
    if let Property::Timer(_) = spec.property {
        return if tween.elapsed >= spec.delay + spec.duration {
            Step::Finished
        } else {
            Step::Running
        };
    }

    let (from, to) = match tween.resolved {
        Some(pair) => pair,
        None => {
            let Some(current) = host.read(spec.property) else {
                return Step::Dropped;
            };
            let from = spec.from.unwrap_or(current);
            let to = match spec.goal {
                Goal::Absolute(value) => Some(value),
                Goal::Relative(delta) => from.offset(delta),
            };
            let Some(to) = to else {
                return Step::Dropped;
            };
            tween.resolved = Some((from, to));
            (from, to)
        }
    };

    let local = tween.elapsed - spec.delay;
    let cycles = match spec.repeat {
        Repeat::Count(n) => Some(n as u64 + 1),
        Repeat::Infinite => None,
    };

    let (value, done) = if spec.duration <= 0.0 {
        (final_value(spec, cycles.unwrap_or(1), from, to), cycles.is_some())
    } else {
        let cycle = (local / spec.duration).floor() as u64;
        match cycles {
            Some(total) if cycle >= total => (final_value(spec, total, from, to), true),
            _ => {
                let mut t = (local - cycle as f32 * spec.duration) / spec.duration;
                if spec.yoyo && cycle % 2 == 1 {
                    t = 1.0 - t;
                }
                match from.lerp(to, spec.ease.apply(t)) {
                    Some(value) => (value, false),
                    None => return Step::Dropped,
                }
            }
        }
    };

    if !host.write(spec.property, value) {
        return Step::Dropped;
    }
    if done {
        Step::Finished
    } else {
        Step::Running
    }
}

fn final_value(spec: TweenSpec, cycles: u64, from: TweenValue, to: TweenValue) -> TweenValue {
    if spec.yoyo && cycles % 2 == 0 {
        from
    } else {
        to
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Values;
    use super::*;

    fn light(n: u32) -> Property {
        Property::LightIntensity(LightId(n))
    }

    fn host_with(props: &[(Property, f32)]) -> Values {
        let mut values = Values::default();
        for (p, v) in props {
            values.0.insert(*p, TweenValue::Scalar(*v));
        }
        values
    }

    #[test]
    fn tween_lands_exactly_on_target() {
        let mut host = host_with(&[(light(1), 0.0)]);
        let mut animator = Animator::new();
        animator.start(TweenSpec::to(light(1), 0.8).duration(0.6).ease(Ease::BackOut(1.7)));
        for _ in 0..7 {
            animator.advance(0.1, &mut host);
        }
        assert_eq!(host.scalar(light(1)), 0.8);
        assert!(animator.is_empty());
    }

    #[test]
    fn starting_on_same_property_replaces() {
        let mut host = host_with(&[(light(1), 0.0)]);
        let mut animator = Animator::new();
        animator.start(TweenSpec::to(light(1), 1.0));
        animator.start(TweenSpec::to(light(1), 0.0));
        assert_eq!(animator.active_on(light(1)), 1);
        animator.advance(1.0, &mut host);
        assert_eq!(host.scalar(light(1)), 0.0);
    }

    #[test]
    fn kill_tweens_of_is_scoped_to_target() {
        let mut animator = Animator::new();
        animator.start(TweenSpec::to(light(1), 1.0));
        animator.start(TweenSpec::to(light(2), 1.0));
        animator.start(TweenSpec::to(Property::MaterialOpacity(MeshId(3)), 1.0));
        animator.start(TweenSpec::to(Property::MaterialEmissive(MeshId(3)), 1.0));

        assert_eq!(animator.kill_tweens_of(Target::Material(MeshId(3))), 2);
        assert_eq!(animator.kill_tweens_of(Target::Light(LightId(1))), 1);
        assert!(animator.is_animating(Target::Light(LightId(2))));
        assert_eq!(animator.len(), 1);
    }

    #[test]
    fn relative_tween_offsets_start_value() {
        let prop = Property::MeshPosition(MeshId(1), Axis::Y);
        let mut host = host_with(&[(prop, 2.0)]);
        let mut animator = Animator::new();
        animator.start(TweenSpec::by(prop, 1.5).duration(0.5));
        animator.advance(0.6, &mut host);
        assert_eq!(host.scalar(prop), 3.5);
    }

    #[test]
    fn delay_holds_the_value() {
        let mut host = host_with(&[(light(1), 0.5)]);
        let mut animator = Animator::new();
        animator.start(TweenSpec::to(light(1), 1.2).delay(0.9).duration(0.0));
        animator.advance(0.5, &mut host);
        assert_eq!(host.scalar(light(1)), 0.5);
        animator.advance(0.5, &mut host);
        assert_eq!(host.scalar(light(1)), 1.2);
        assert!(animator.is_empty());
    }

    #[test]
    fn yoyo_repeat_returns_to_start() {
        let mut host = host_with(&[(light(1), 0.0)]);
        let mut animator = Animator::new();
        animator.start(
            TweenSpec::to(light(1), 1.0)
                .duration(0.2)
                .repeat(Repeat::Count(1))
                .yoyo(true),
        );
        animator.advance(0.2, &mut host);
        let mid = host.scalar(light(1));
        assert!(mid > 0.9, "{mid}");
        animator.advance(0.25, &mut host);
        assert_eq!(host.scalar(light(1)), 0.0);
        assert!(animator.is_empty());
    }

    #[test]
    fn infinite_loops_are_registered_and_cancellable() {
        let mut host = host_with(&[(light(1), 0.0), (light(2), 0.0)]);
        let mut animator = Animator::new();
        let looping = animator.start(
            TweenSpec::to(light(1), 1.0)
                .duration(0.5)
                .repeat(Repeat::Infinite)
                .yoyo(true),
        );
        animator.start(TweenSpec::to(light(2), 1.0).duration(100.0));
        for _ in 0..100 {
            animator.advance(0.1, &mut host);
        }
        assert_eq!(animator.looping_handles().collect::<Vec<_>>(), vec![looping]);
        assert_eq!(animator.cancel_looping(), 1);
        assert_eq!(animator.len(), 1);
        assert_eq!(animator.looping_handles().count(), 0);
    }

    #[test]
    fn missing_target_drops_tween() {
        let mut host = host_with(&[]);
        let mut animator = Animator::new();
        animator.start(TweenSpec::to(light(9), 1.0).on_complete(Completion::AssemblyFinished));
        let completions = animator.advance(1.0, &mut host);
        assert!(completions.is_empty());
        assert!(animator.is_empty());
    }

    #[test]
    fn completion_is_reported_once() {
        let mut host = host_with(&[(light(1), 0.0)]);
        let mut animator = Animator::new();
        animator.start(
            TweenSpec::to(light(1), 1.0)
                .duration(0.3)
                .on_complete(Completion::ZoomInSettled),
        );
        assert!(animator.advance(0.2, &mut host).is_empty());
        assert_eq!(
            animator.advance(0.2, &mut host),
            vec![Completion::ZoomInSettled]
        );
        assert!(animator.advance(0.2, &mut host).is_empty());
    }

    #[test]
    fn timer_fires_without_a_host_value() {
        let mut host = host_with(&[]);
        let mut animator = Animator::new();
        animator.start(TweenSpec::after(0.5, Completion::AssemblyFinished));
        assert!(animator.advance(0.3, &mut host).is_empty());
        assert_eq!(animator.kill_tweens_of(Target::MeshScale(MeshId(1))), 0);
        assert_eq!(
            animator.advance(0.3, &mut host),
            vec![Completion::AssemblyFinished]
        );
        assert!(animator.is_empty());
    }

    #[test]
    fn vector_tween_interpolates_componentwise() {
        let mut host = Values::default();
        host.0
            .insert(Property::CameraPosition, TweenValue::Vector(Vec3::ZERO));
        let mut animator = Animator::new();
        animator.start(
            TweenSpec::to(Property::CameraPosition, Vec3::new(2.0, 4.0, 0.0))
                .duration(1.0)
                .ease(Ease::Linear),
        );
        animator.advance(0.5, &mut host);
        let v = host.0[&Property::CameraPosition].as_vector().unwrap();
        assert!((v - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }
}
