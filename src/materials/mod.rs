//! Name-driven material assignment.
//!
//! Each mesh's material name is lower-cased and tested against an ordered rule
//! table; the first matching rule's properties are layered over a default
//! opaque PBR base that carries the imported maps and colors.

use crate::render::{Capabilities, GraphicsContext};
use crate::scene::{ColorSpace, Material, MaterialClass, Mesh, SceneGraph, Side, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern {
    /// Name contains any of these substrings.
    AnyOf(&'static [&'static str]),
    /// Name equals one of these.
    OneOf(&'static [&'static str]),
}

impl NamePattern {
    pub fn matches(&self, lowered: &str) -> bool {
        match self {
            NamePattern::AnyOf(needles) => needles.iter().any(|n| lowered.contains(n)),
            NamePattern::OneOf(names) => names.iter().any(|n| lowered == *n),
        }
    }
}

/// Overrides a rule applies. `None` leaves the base value alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleProps {
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
    pub clearcoat: Option<f32>,
    pub clearcoat_roughness: Option<f32>,
    pub reflectivity: Option<f32>,
    pub transmission: Option<f32>,
    pub thickness: Option<f32>,
    pub ior: Option<f32>,
    pub opacity: Option<f32>,
    pub transparent: Option<bool>,
    pub side: Option<Side>,
    pub emissive: Option<[f32; 3]>,
    pub emissive_intensity: Option<f32>,
    pub attenuation_color: Option<[f32; 3]>,
    pub attenuation_distance: Option<f32>,
    pub depth_write: Option<bool>,
    pub env_intensity: Option<f32>,
}

impl RuleProps {
    pub const NONE: Self = Self {
        metalness: None,
        roughness: None,
        clearcoat: None,
        clearcoat_roughness: None,
        reflectivity: None,
        transmission: None,
        thickness: None,
        ior: None,
        opacity: None,
        transparent: None,
        side: None,
        emissive: None,
        emissive_intensity: None,
        attenuation_color: None,
        attenuation_distance: None,
        depth_write: None,
        env_intensity: None,
    };

    fn apply(&self, material: &mut Material) {
        fn set<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut material.metalness, self.metalness);
        set(&mut material.roughness, self.roughness);
        set(&mut material.clearcoat, self.clearcoat);
        set(&mut material.clearcoat_roughness, self.clearcoat_roughness);
        set(&mut material.reflectivity, self.reflectivity);
        set(&mut material.transmission, self.transmission);
        set(&mut material.thickness, self.thickness);
        set(&mut material.ior, self.ior);
        set(&mut material.opacity, self.opacity);
        set(&mut material.transparent, self.transparent);
        set(&mut material.side, self.side);
        set(&mut material.emissive, self.emissive);
        set(&mut material.emissive_intensity, self.emissive_intensity);
        set(&mut material.attenuation_color, self.attenuation_color);
        set(&mut material.attenuation_distance, self.attenuation_distance);
        set(&mut material.depth_write, self.depth_write);
        set(&mut material.env_intensity, self.env_intensity);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialRule {
    pub label: &'static str,
    pub pattern: NamePattern,
    pub props: RuleProps,
}

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// Priority order matters: the first match wins.
pub const RULES: &[MaterialRule] = &[
    MaterialRule {
        label: "metal",
        pattern: NamePattern::AnyOf(&["metal", "chrome", "acciaio"]),
        props: RuleProps {
            metalness: Some(0.95),
            roughness: Some(0.18),
            clearcoat: Some(0.1),
            reflectivity: Some(0.9),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "glass",
        pattern: NamePattern::AnyOf(&["glass", "vetro"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.02),
            transmission: Some(0.9),
            opacity: Some(0.98),
            transparent: Some(true),
            clearcoat: Some(0.2),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "screen",
        pattern: NamePattern::AnyOf(&["screen", "schermo", "monitor"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.15),
            emissive: Some(WHITE),
            emissive_intensity: Some(1.0),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "plastic",
        pattern: NamePattern::AnyOf(&["plastic", "plastica", "mouse", "keyboard"]),
        props: RuleProps {
            metalness: Some(0.03),
            roughness: Some(0.45),
            clearcoat: Some(0.05),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "cup",
        pattern: NamePattern::AnyOf(&["tazza"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.0),
            transmission: Some(1.0),
            thickness: Some(5.0),
            ior: Some(2.0),
            opacity: Some(1.0),
            transparent: Some(true),
            side: Some(Side::Front),
            clearcoat: Some(1.0),
            clearcoat_roughness: Some(0.0),
            attenuation_color: Some(WHITE),
            attenuation_distance: Some(10.0),
            depth_write: Some(false),
            env_intensity: Some(2.0),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "ceramic",
        pattern: NamePattern::AnyOf(&["ceramica", "caffe"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.12),
            clearcoat: Some(0.7),
            clearcoat_roughness: Some(0.06),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "wood",
        pattern: NamePattern::AnyOf(&["wood", "tavolo", "legno"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.6),
            reflectivity: Some(0.3),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "headphones",
        pattern: NamePattern::OneOf(&["cuffie", "cuffie3"]),
        props: RuleProps {
            metalness: Some(0.35),
            roughness: Some(0.38),
            clearcoat: Some(0.1),
            reflectivity: Some(0.2),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "headphone pads",
        pattern: NamePattern::OneOf(&["cuffie2"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.9),
            clearcoat: Some(0.0),
            reflectivity: Some(0.0),
            emissive_intensity: Some(0.0),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "blue",
        pattern: NamePattern::AnyOf(&["blu"]),
        props: RuleProps {
            metalness: Some(0.65),
            roughness: Some(0.48),
            clearcoat: Some(0.9),
            reflectivity: Some(0.2),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "mouse",
        pattern: NamePattern::AnyOf(&["mouse"]),
        props: RuleProps {
            metalness: Some(0.03),
            roughness: Some(0.95),
            clearcoat: Some(0.0),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "pen holder",
        pattern: NamePattern::AnyOf(&["portapenne"]),
        props: RuleProps {
            metalness: Some(0.83),
            roughness: Some(0.65),
            ..RuleProps::NONE
        },
    },
    MaterialRule {
        label: "mat",
        pattern: NamePattern::AnyOf(&["tappetino", "tappeto"]),
        props: RuleProps {
            metalness: Some(0.0),
            roughness: Some(0.9),
            clearcoat: Some(0.0),
            ..RuleProps::NONE
        },
    },
];

/// Environment intensity attached to every assigned material.
pub const ENVIRONMENT_INTENSITY: f32 = 0.5;

pub fn match_rule(material_name: &str) -> Option<&'static MaterialRule> {
    let lowered = material_name.to_lowercase();
    RULES.iter().find(|rule| rule.pattern.matches(&lowered))
}

pub struct MaterialAssigner {
    capabilities: Capabilities,
}

impl MaterialAssigner {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// Builds the replacement for `mesh`'s material. The result keeps the old
    /// material id; [`assign_all`](Self::assign_all) gives it a fresh one.
    pub fn assign(&self, mesh: &Mesh, environment: Option<TextureId>) -> Material {
        let old = &mesh.material;
        let mut material = Material {
            class: MaterialClass::Physical,
            color: old.color,
            emissive: old.emissive,
            emissive_intensity: old.emissive_intensity,
            metalness: 0.0,
            roughness: 0.6,
            reflectivity: 0.5,
            opacity: old.opacity,
            transparent: old.transparent,
            side: old.side,
            shadow_side: old.shadow_side,
            alpha_test: old.alpha_test,
            vertex_colors: old.vertex_colors,
            dithering: true,
            maps: old.maps,
            ..Material::standard(old.id, old.name.clone())
        };

        if let Some(rule) = match_rule(&old.name) {
            rule.props.apply(&mut material);
        }

        if let Some(env) = environment {
            material.env_map = Some(env);
            material.env_intensity = ENVIRONMENT_INTENSITY;
        }

        if !material.uses_physical_layers() || !self.capabilities.physical_materials {
            material.strip_physical_layers();
            material.class = MaterialClass::Standard;
        }
        material
    }

    /// Replaces every mesh material in the graph, releasing each old material
    /// through `ctx`. Returns how many meshes were reassigned.
    pub fn assign_all(&self, scene: &mut SceneGraph, ctx: &mut dyn GraphicsContext) -> usize {
        let environment = scene.environment;
        let mut diffuse_maps = Vec::new();
        let mut count = 0;
        for id in scene.mesh_ids() {
            let fresh = scene.alloc_material_id();
            let Some(mesh) = scene.mesh_mut(id) else {
                continue;
            };
            let mut material = self.assign(mesh, environment);
            material.id = fresh;
            ctx.release_material(mesh.material.id);
            diffuse_maps.extend(material.maps.diffuse);
            mesh.material = material;
            count += 1;
        }
        for id in diffuse_maps {
            if let Some(texture) = scene.texture_mut(id) {
                texture.color_space = ColorSpace::Srgb;
            }
        }
        log::info!("Assigned PBR materials to {} meshes", count);
        count
    }
}
