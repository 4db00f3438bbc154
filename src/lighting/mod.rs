//! Light rig and the Light/Dark mode state machine.

pub mod fixtures;

use glam::Vec3;

use crate::anim::{Animator, Completion, Ease, Property, Repeat, Target, TweenSpec};
use crate::config::LightingConfig;
use crate::render::Capabilities;
use crate::scene::{
    hex_color, Fog, Light, LightId, LightKind, LightRole, MaterialClass, MeshRole, SceneGraph,
    ShadowSettings, TextureId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingMode {
    Light,
    Dark,
}

/// Ids of the fixed lights created at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: LightId,
    pub hemisphere: LightId,
    pub fill: LightId,
    pub rect_area: Option<LightId>,
    pub main: LightId,
}

fn light(role: LightRole, kind: LightKind, intensity: f32, position: Vec3) -> Light {
    Light {
        id: LightId(0),
        role,
        kind,
        color: [1.0, 1.0, 1.0],
        intensity,
        day_intensity: intensity,
        position,
        target: Vec3::ZERO,
        shadow: None,
    }
}

/// Adds the day lighting rig and the scene-wide look (background, fog,
/// exposure). Every light starts at its day intensity.
pub fn build_rig(scene: &mut SceneGraph, config: &LightingConfig, caps: Capabilities) -> LightRig {
    scene.background = hex_color(config.day_background);
    scene.fog = Some(Fog {
        color: hex_color(config.fog_color),
        near: 8.0,
        far: 40.0,
    });
    scene.exposure = config.day_exposure;

    let ambient = scene.add_light(light(
        LightRole::Ambient,
        LightKind::Ambient,
        config.ambient,
        Vec3::ZERO,
    ));
    let hemisphere = scene.add_light(light(
        LightRole::Hemisphere,
        LightKind::Hemisphere {
            ground_color: hex_color(0x222222),
        },
        config.hemisphere,
        Vec3::new(0.0, 10.0, 0.0),
    ));

    let mut fill = light(
        LightRole::Fill,
        LightKind::Point {
            distance: 30.0,
            decay: 2.0,
        },
        config.fill,
        Vec3::new(0.0, 3.5, 2.0),
    );
    if caps.shadow_maps {
        fill.shadow = Some(ShadowSettings {
            map_size: 512,
            radius: 4.0,
            bias: -0.0005,
            ..ShadowSettings::default()
        });
    }
    let fill = scene.add_light(fill);

    let rect_area = if caps.rect_area_lights {
        Some(scene.add_light(light(
            LightRole::RectArea,
            LightKind::RectArea {
                width: 2.0,
                height: 2.2,
            },
            config.rect_area,
            Vec3::new(0.0, 4.5, 3.0),
        )))
    } else {
        log::warn!("Rect-area lights unsupported; skipping the soft key light");
        None
    };

    let mut main = light(
        LightRole::Main,
        LightKind::Directional,
        config.main,
        Vec3::new(5.0, 10.0, 7.0),
    );
    if caps.shadow_maps {
        main.shadow = Some(ShadowSettings {
            map_size: 1024,
            near: 0.5,
            far: 50.0,
            extent: 10.0,
            ..ShadowSettings::default()
        });
    }
    let main = scene.add_light(main);

    LightRig {
        ambient,
        hemisphere,
        fill,
        rect_area,
        main,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CapturedLook {
    background: [f32; 3],
    environment: Option<TextureId>,
}

#[derive(Debug)]
pub struct LightingModeController {
    mode: LightingMode,
    config: LightingConfig,
    captured: Option<CapturedLook>,
}

impl LightingModeController {
    pub fn new(config: LightingConfig) -> Self {
        Self {
            mode: LightingMode::Light,
            config,
            captured: None,
        }
    }

    pub fn mode(&self) -> LightingMode {
        self.mode
    }

    pub fn toggle(&mut self, scene: &mut SceneGraph, animator: &mut Animator) -> LightingMode {
        match self.mode {
            LightingMode::Light => self.enter_dark(scene, animator),
            LightingMode::Dark => self.enter_light(scene, animator),
        }
        log::info!("Lighting mode: {:?}", self.mode);
        self.mode
    }

    fn enter_dark(&mut self, scene: &mut SceneGraph, animator: &mut Animator) {
        let c = &self.config;
        if self.captured.is_none() {
            self.captured = Some(CapturedLook {
                background: scene.background,
                environment: scene.environment,
            });
        }
        scene.background = hex_color(c.night_background);

        for id in scene.light_ids() {
            let Some(light) = scene.light(id) else {
                continue;
            };
            animator.kill_tweens_of(Target::Light(id));
            let spec = match light.role {
                LightRole::LampSpot(_) => TweenSpec::to(Property::LightIntensity(id), c.lamp_night)
                    .duration(c.lamp_transition_secs)
                    .ease(Ease::Power2Out),
                _ => TweenSpec::to(Property::LightIntensity(id), 0.0).duration(c.transition_secs),
            };
            animator.start(spec);
        }

        for id in scene.mesh_ids() {
            let role = scene.role(id);
            let Some(mesh) = scene.mesh(id) else {
                continue;
            };
            let lit = mesh.material.class != MaterialClass::Basic;
            let env_intensity = mesh.material.env_intensity;
            if lit {
                // Captured on the first transition only.
                if let Some(record) = scene.record_mut(id) {
                    record.original_env_intensity.get_or_insert(env_intensity);
                }
                if let Some(mesh) = scene.mesh_mut(id) {
                    mesh.material.env_intensity = c.night_environment_intensity;
                }
            }

            match role {
                MeshRole::Lamp => {
                    animator.kill_tweens_of(Target::Material(id));
                    if let Some(mesh) = scene.mesh_mut(id) {
                        mesh.material.emissive_intensity = c.lamp_night_emissive;
                    }
                }
                MeshRole::ScreenLarge | MeshRole::ScreenSmall if lit => {
                    animator.kill_tweens_of(Target::Material(id));
                    animator.start(
                        TweenSpec::to(Property::MaterialEmissive(id), c.screen_night_emissive)
                            .duration(c.transition_secs),
                    );
                }
                _ => {}
            }
        }

        let glows: Vec<_> = scene.lamp_fixtures().map(|fixture| fixture.glow).collect();
        for glow in glows {
            animator.kill_tweens_of(Target::Sprite(glow));
            animator.start(
                TweenSpec::to(Property::SpriteOpacity(glow), c.glow_night_opacity)
                    .duration(c.lamp_transition_secs)
                    .ease(Ease::Power2Out),
            );
        }

        animator.kill_tweens_of(Target::Renderer);
        animator.start(TweenSpec::to(Property::Exposure, c.night_exposure).duration(c.transition_secs));
        self.mode = LightingMode::Dark;
    }

    fn enter_light(&mut self, scene: &mut SceneGraph, animator: &mut Animator) {
        let c = &self.config;
        match self.captured {
            Some(captured) => {
                scene.background = captured.background;
                if captured.environment.is_some() {
                    scene.environment = captured.environment;
                }
            }
            None => scene.background = hex_color(c.day_background),
        }

        for id in scene.light_ids() {
            let Some(light) = scene.light(id) else {
                continue;
            };
            let role = light.role;
            let day = light.day_intensity;
            let was_animating = animator.is_animating(Target::Light(id));
            animator.kill_tweens_of(Target::Light(id));
            let spec = match role {
                LightRole::LampSpot(_) => {
                    TweenSpec::to(Property::LightIntensity(id), 0.0).duration(c.transition_secs)
                }
                LightRole::ButtonGlow(_) => {
                    let spec = TweenSpec::to(Property::LightIntensity(id), day)
                        .duration(c.lamp_transition_secs)
                        .ease(Ease::Power2Out);
                    if was_animating {
                        spec.on_complete(Completion::StartButtonPulse(id))
                    } else {
                        spec
                    }
                }
                _ => TweenSpec::to(Property::LightIntensity(id), day).duration(c.transition_secs),
            };
            animator.start(spec);
        }

        for id in scene.mesh_ids() {
            let role = scene.role(id);
            let original_env = scene.record(id).and_then(|record| record.original_env_intensity);
            let Some(mesh) = scene.mesh_mut(id) else {
                continue;
            };
            let lit = mesh.material.class != MaterialClass::Basic;
            if let Some(original) = original_env {
                mesh.material.env_intensity = original;
            }

            match role {
                MeshRole::Lamp => {
                    animator.kill_tweens_of(Target::Material(id));
                    animator.start(
                        TweenSpec::to(Property::MaterialEmissive(id), 0.0).duration(c.transition_secs),
                    );
                }
                MeshRole::ScreenLarge | MeshRole::ScreenSmall if lit => {
                    animator.kill_tweens_of(Target::Material(id));
                    animator.start(
                        TweenSpec::to(Property::MaterialEmissive(id), c.screen_day_emissive)
                            .duration(c.transition_secs),
                    );
                }
                MeshRole::Button => {
                    animator.kill_tweens_of(Target::Material(id));
                    mesh.material.emissive_intensity = 0.5;
                    animator.start(
                        TweenSpec::to(Property::MaterialEmissive(id), 1.2)
                            .delay(0.9)
                            .duration(0.0),
                    );
                }
                _ => {}
            }
        }

        let glows: Vec<_> = scene.lamp_fixtures().map(|fixture| fixture.glow).collect();
        for glow in glows {
            animator.kill_tweens_of(Target::Sprite(glow));
            animator.start(TweenSpec::to(Property::SpriteOpacity(glow), 0.0).duration(c.transition_secs));
        }

        animator.kill_tweens_of(Target::Renderer);
        animator.start(TweenSpec::to(Property::Exposure, c.day_exposure).duration(c.transition_secs));
        self.mode = LightingMode::Light;
    }

    /// Brings content added while Dark (lamp fixtures, fresh materials) in
    /// line with the current mode.
    pub fn reapply(&mut self, scene: &mut SceneGraph, animator: &mut Animator) {
        if self.mode == LightingMode::Dark {
            self.enter_dark(scene, animator);
        }
    }

    /// Starts the idle pulse on a button glow light.
    pub fn on_completion(&self, completion: Completion, animator: &mut Animator) -> bool {
        let Completion::StartButtonPulse(id) = completion else {
            return false;
        };
        if self.mode != LightingMode::Light {
            return true;
        }
        animator.start(
            TweenSpec::to(Property::LightIntensity(id), self.config.button_pulse_peak)
                .duration(1.5)
                .repeat(Repeat::Infinite)
                .yoyo(true)
                .ease(Ease::SineInOut),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_support::add_quad_mesh;
    use crate::scene::MeshId;

    struct Stage {
        scene: SceneGraph,
        animator: Animator,
        lighting: LightingModeController,
        rig: LightRig,
        button_glow: LightId,
        screen: MeshId,
    }

    fn stage() -> Stage {
        let config = LightingConfig::default();
        let mut scene = SceneGraph::new();
        let rig = build_rig(&mut scene, &config, Capabilities::full());
        let screen = add_quad_mesh(&mut scene, "schermoPiccolo", Vec3::ZERO, MeshRole::ScreenSmall);
        let button = add_quad_mesh(&mut scene, "tastoMice", Vec3::X, MeshRole::Button);
        add_quad_mesh(&mut scene, "lampadina", Vec3::Y, MeshRole::Lamp);
        for id in scene.mesh_ids() {
            scene.mesh_mut(id).unwrap().material.env_intensity = 0.5;
        }
        scene.mesh_mut(screen).unwrap().material.emissive_intensity = config.screen_day_emissive;
        let button_glow = scene.add_light(light(
            LightRole::ButtonGlow(button),
            LightKind::Point {
                distance: 1.0,
                decay: 2.0,
            },
            config.button_glow,
            Vec3::X,
        ));
        fixtures::ensure_lamp_fixtures(&mut scene, false, Vec3::Z);
        Stage {
            scene,
            animator: Animator::new(),
            lighting: LightingModeController::new(config),
            rig,
            button_glow,
            screen,
        }
    }

    impl Stage {
        fn run(&mut self, secs: f32) {
            let steps = (secs / 0.05).ceil() as usize + 1;
            for _ in 0..steps {
                for completion in self.animator.advance(0.05, &mut self.scene) {
                    self.lighting.on_completion(completion, &mut self.animator);
                }
            }
        }

        fn intensity(&self, id: LightId) -> f32 {
            self.scene.light(id).unwrap().intensity
        }
    }

    #[test]
    fn rig_respects_capabilities() {
        let mut scene = SceneGraph::new();
        let rig = build_rig(&mut scene, &LightingConfig::default(), Capabilities::minimal());
        assert!(rig.rect_area.is_none());
        assert_eq!(scene.lights().count(), 4);
        assert!(scene.lights().all(|light| light.shadow.is_none()));
        assert_eq!(scene.exposure, 0.8);
    }

    #[test]
    fn dark_then_light_restores_the_day_look() {
        let mut s = stage();
        let day_background = s.scene.background;

        assert_eq!(s.lighting.toggle(&mut s.scene, &mut s.animator), LightingMode::Dark);
        s.run(1.0);
        assert_eq!(s.intensity(s.rig.main), 0.0);
        assert_eq!(s.intensity(s.button_glow), 0.0);
        let fixture = *s.scene.lamp_fixtures().next().unwrap();
        assert_eq!(s.intensity(fixture.spot), 40.0);
        assert_eq!(s.scene.sprite(fixture.glow).unwrap().opacity, 0.9);
        assert_eq!(s.scene.mesh(fixture.lamp).unwrap().material.emissive_intensity, 2.5);
        assert_eq!(s.scene.mesh(s.screen).unwrap().material.emissive_intensity, 5.0);
        assert_eq!(s.scene.mesh(s.screen).unwrap().material.env_intensity, 0.1);
        assert_eq!(s.scene.exposure, 0.5);
        assert_eq!(s.scene.background, hex_color(0x020408));

        assert_eq!(s.lighting.toggle(&mut s.scene, &mut s.animator), LightingMode::Light);
        s.run(1.5);
        assert_eq!(s.intensity(s.rig.ambient), 0.25);
        assert_eq!(s.intensity(s.rig.hemisphere), 0.5);
        assert_eq!(s.intensity(s.rig.fill), 0.6);
        assert_eq!(s.intensity(s.rig.rect_area.unwrap()), 0.5);
        assert_eq!(s.intensity(s.rig.main), 1.0);
        assert_eq!(s.intensity(s.button_glow), 0.8);
        assert_eq!(s.intensity(fixture.spot), 0.0);
        assert_eq!(s.scene.sprite(fixture.glow).unwrap().opacity, 0.0);
        assert_eq!(s.scene.mesh(s.screen).unwrap().material.emissive_intensity, 2.0);
        assert!(s.scene.meshes().all(|mesh| mesh.material.env_intensity == 0.5));
        assert_eq!(s.scene.exposure, 0.8);
        assert_eq!(s.scene.background, day_background);
        assert!(s.animator.is_empty());
    }

    #[test]
    fn rapid_toggles_never_stack_tweens() {
        let mut s = stage();
        s.lighting.toggle(&mut s.scene, &mut s.animator);
        s.run(0.1);
        s.lighting.toggle(&mut s.scene, &mut s.animator);
        s.lighting.toggle(&mut s.scene, &mut s.animator);
        s.lighting.toggle(&mut s.scene, &mut s.animator);

        for id in s.scene.light_ids() {
            assert!(s.animator.active_on(Property::LightIntensity(id)) <= 1);
        }
        assert!(s.animator.active_on(Property::Exposure) <= 1);
        assert_eq!(s.lighting.mode(), LightingMode::Light);

        // The button glow was mid-fade, so it settles into its idle pulse.
        s.run(1.0);
        assert_eq!(s.animator.looping_handles().count(), 1);
        assert!(s.animator.is_animating(Target::Light(s.button_glow)));
    }

    #[test]
    fn environment_is_captured_once() {
        let mut s = stage();
        s.lighting.toggle(&mut s.scene, &mut s.animator);
        s.lighting.toggle(&mut s.scene, &mut s.animator);
        s.lighting.toggle(&mut s.scene, &mut s.animator);
        let record = s.scene.record(s.screen).unwrap();
        assert_eq!(record.original_env_intensity, Some(0.5));
    }
}
