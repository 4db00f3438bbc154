use glam::Vec3;

use super::{OrbitControls, PerspectiveCamera};
use crate::anim::{Animator, Completion, Ease, Property, Target, TweenSpec};
use crate::config::ZoomConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomState {
    Normal,
    ZoomingIn,
    Zoomed,
    ZoomingOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestorePoint {
    pub camera_position: Vec3,
    pub orbit_target: Vec3,
}

/// Animated camera moves to and from a focused object.
///
/// Re-entry while a transition is in flight is ignored; the state only
/// settles when the orbit-target tween reports completion.
#[derive(Debug, Clone)]
pub struct CameraZoomController {
    state: ZoomState,
    restore: Option<RestorePoint>,
    offset: Vec3,
    zoom_in_secs: f32,
    zoom_out_secs: f32,
}

impl CameraZoomController {
    pub fn new(config: &ZoomConfig) -> Self {
        Self {
            state: ZoomState::Normal,
            restore: None,
            offset: Vec3::from(config.offset),
            zoom_in_secs: config.zoom_in_secs,
            zoom_out_secs: config.zoom_out_secs,
        }
    }

    pub fn state(&self) -> ZoomState {
        self.state
    }

    pub fn restore_point(&self) -> Option<RestorePoint> {
        self.restore
    }

    pub fn zoom_in(
        &mut self,
        focus: Vec3,
        camera: &PerspectiveCamera,
        controls: &mut OrbitControls,
        animator: &mut Animator,
    ) -> bool {
        if self.state != ZoomState::Normal {
            log::debug!("Zoom-in ignored while {:?}", self.state);
            return false;
        }
        self.restore = Some(RestorePoint {
            camera_position: camera.position,
            orbit_target: controls.target,
        });
        controls.enabled = false;
        controls.halt();

        self.animate(focus + self.offset, focus, self.zoom_in_secs, Completion::ZoomInSettled, animator);
        self.state = ZoomState::ZoomingIn;
        log::debug!("Zooming in on {:?}", focus);
        true
    }

    pub fn zoom_out(&mut self, animator: &mut Animator) -> bool {
        if self.state != ZoomState::Zoomed {
            log::debug!("Zoom-out ignored while {:?}", self.state);
            return false;
        }
        let Some(restore) = self.restore else {
            return false;
        };
        self.animate(
            restore.camera_position,
            restore.orbit_target,
            self.zoom_out_secs,
            Completion::ZoomOutSettled,
            animator,
        );
        self.state = ZoomState::ZoomingOut;
        true
    }

    fn animate(
        &self,
        position: Vec3,
        target: Vec3,
        secs: f32,
        completion: Completion,
        animator: &mut Animator,
    ) {
        animator.kill_tweens_of(Target::Camera);
        animator.kill_tweens_of(Target::OrbitTarget);
        animator.start(
            TweenSpec::to(Property::CameraPosition, position)
                .duration(secs)
                .ease(Ease::Power2InOut),
        );
        animator.start(
            TweenSpec::to(Property::OrbitTarget, target)
                .duration(secs)
                .ease(Ease::Power2InOut)
                .on_complete(completion),
        );
    }

    /// Settles the state machine when a zoom tween finishes. Returns `true`
    /// if the completion belonged to this controller.
    pub fn on_completion(&mut self, completion: Completion, controls: &mut OrbitControls) -> bool {
        match (completion, self.state) {
            (Completion::ZoomInSettled, ZoomState::ZoomingIn) => {
                self.state = ZoomState::Zoomed;
                true
            }
            (Completion::ZoomOutSettled, ZoomState::ZoomingOut) => {
                self.state = ZoomState::Normal;
                self.restore = None;
                controls.enabled = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{TweenHost, TweenValue};
    use crate::config::OrbitConfig;

    struct Rig {
        camera: PerspectiveCamera,
        controls: OrbitControls,
    }

    impl TweenHost for Rig {
        fn read(&self, property: Property) -> Option<TweenValue> {
            match property {
                Property::CameraPosition => Some(self.camera.position.into()),
                Property::OrbitTarget => Some(self.controls.target.into()),
                _ => None,
            }
        }

        fn write(&mut self, property: Property, value: TweenValue) -> bool {
            let Some(v) = value.as_vector() else {
                return false;
            };
            match property {
                Property::CameraPosition => self.camera.position = v,
                Property::OrbitTarget => self.controls.target = v,
                _ => return false,
            }
            self.controls.sync(&mut self.camera);
            true
        }
    }

    fn run(
        zoom: &mut CameraZoomController,
        animator: &mut Animator,
        rig: &mut Rig,
        secs: f32,
    ) {
        let steps = (secs / 0.016).ceil() as usize + 1;
        for _ in 0..steps {
            for completion in animator.advance(0.016, rig) {
                zoom.on_completion(completion, &mut rig.controls);
            }
            rig.controls.update(&mut rig.camera);
        }
    }

    fn rig() -> Rig {
        let camera = PerspectiveCamera::default();
        let controls = OrbitControls::new(&OrbitConfig::default(), camera.look_at);
        Rig { camera, controls }
    }

    #[test]
    fn zoom_round_trip_restores_camera_exactly() {
        let mut rig = rig();
        rig.camera.position = Vec3::new(0.3, 1.7, 4.1);
        rig.controls.target = Vec3::new(0.05, -0.1, 0.0);
        let start_position = rig.camera.position;
        let start_target = rig.controls.target;

        let mut zoom = CameraZoomController::new(&ZoomConfig::default());
        let mut animator = Animator::new();
        let focus = Vec3::new(0.5, -0.6, -2.4);

        assert!(zoom.zoom_in(focus, &rig.camera, &mut rig.controls, &mut animator));
        assert_eq!(zoom.state(), ZoomState::ZoomingIn);
        assert!(!rig.controls.enabled);
        run(&mut zoom, &mut animator, &mut rig, 1.5);
        assert_eq!(zoom.state(), ZoomState::Zoomed);
        assert_eq!(rig.camera.position, focus + Vec3::new(-0.35, 0.0, 2.0));
        assert_eq!(rig.controls.target, focus);

        assert!(zoom.zoom_out(&mut animator));
        run(&mut zoom, &mut animator, &mut rig, 1.2);
        assert_eq!(zoom.state(), ZoomState::Normal);
        assert_eq!(rig.camera.position, start_position);
        assert_eq!(rig.controls.target, start_target);
        assert!(rig.controls.enabled);
    }

    #[test]
    fn reentry_during_flight_is_ignored() {
        let mut rig = rig();
        let mut zoom = CameraZoomController::new(&ZoomConfig::default());
        let mut animator = Animator::new();

        assert!(zoom.zoom_in(Vec3::ZERO, &rig.camera, &mut rig.controls, &mut animator));
        assert!(!zoom.zoom_in(Vec3::ONE, &rig.camera, &mut rig.controls, &mut animator));
        assert!(!zoom.zoom_out(&mut animator));
        assert_eq!(animator.active_on(Property::CameraPosition), 1);

        run(&mut zoom, &mut animator, &mut rig, 1.5);
        assert!(zoom.zoom_out(&mut animator));
        assert!(!zoom.zoom_out(&mut animator));
        assert_eq!(zoom.state(), ZoomState::ZoomingOut);
    }

    #[test]
    fn stray_completion_is_not_ours() {
        let mut controls = OrbitControls::new(&OrbitConfig::default(), Vec3::ZERO);
        let mut zoom = CameraZoomController::new(&ZoomConfig::default());
        assert!(!zoom.on_completion(Completion::ZoomOutSettled, &mut controls));
        assert!(!zoom.on_completion(Completion::AssemblyFinished, &mut controls));
        assert_eq!(zoom.state(), ZoomState::Normal);
    }
}
