use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialClass {
    Standard,
    Physical,
    /// Unlit.
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Linear,
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Clamp,
    Repeat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// Index into the image list of the loaded glTF document.
    Embedded { image_index: usize },
    File(PathBuf),
    Video(PathBuf),
    Environment(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: TextureId,
    pub label: String,
    pub source: TextureSource,
    pub color_space: ColorSpace,
    pub wrap: Wrap,
    pub repeat: [f32; 2],
    pub offset: [f32; 2],
    pub rotation: f32,
    pub flip_y: bool,
}

impl Texture {
    pub fn new(id: TextureId, label: impl Into<String>, source: TextureSource) -> Self {
        Self {
            id,
            label: label.into(),
            source,
            color_space: ColorSpace::Linear,
            wrap: Wrap::Clamp,
            repeat: [1.0, 1.0],
            offset: [0.0, 0.0],
            rotation: 0.0,
            flip_y: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextureMaps {
    pub diffuse: Option<TextureId>,
    pub normal: Option<TextureId>,
    pub roughness: Option<TextureId>,
    pub metalness: Option<TextureId>,
    pub ambient_occlusion: Option<TextureId>,
    pub emissive: Option<TextureId>,
}

impl TextureMaps {
    pub fn iter(&self) -> impl Iterator<Item = TextureId> {
        [
            self.diffuse,
            self.normal,
            self.roughness,
            self.metalness,
            self.ambient_occlusion,
            self.emissive,
        ]
        .into_iter()
        .flatten()
    }
}

/// Surface description shared by every mesh kind the scene renders.
///
/// Field defaults follow the usual PBR conventions: white base color, fully
/// rough, non-metallic, opaque, front-faced.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub class: MaterialClass,
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub transmission: f32,
    pub thickness: f32,
    pub ior: f32,
    pub reflectivity: f32,
    pub sheen: f32,
    pub iridescence: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub depth_write: bool,
    pub side: Side,
    pub shadow_side: Option<Side>,
    pub env_map: Option<TextureId>,
    pub env_intensity: f32,
    pub attenuation_color: [f32; 3],
    pub attenuation_distance: f32,
    pub alpha_test: f32,
    pub vertex_colors: bool,
    pub dithering: bool,
    pub maps: TextureMaps,
}

impl Material {
    pub fn standard(id: MaterialId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            class: MaterialClass::Standard,
            color: [1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            metalness: 0.0,
            roughness: 1.0,
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            transmission: 0.0,
            thickness: 0.0,
            ior: 1.5,
            reflectivity: 0.5,
            sheen: 0.0,
            iridescence: 0.0,
            opacity: 1.0,
            transparent: false,
            depth_write: true,
            side: Side::Front,
            shadow_side: None,
            env_map: None,
            env_intensity: 1.0,
            attenuation_color: [1.0, 1.0, 1.0],
            attenuation_distance: f32::INFINITY,
            alpha_test: 0.0,
            vertex_colors: false,
            dithering: false,
            maps: TextureMaps::default(),
        }
    }

    pub fn basic(id: MaterialId, name: impl Into<String>, color: [f32; 3]) -> Self {
        Self {
            class: MaterialClass::Basic,
            color,
            ..Self::standard(id, name)
        }
    }

    pub fn is_effectively_transparent(&self) -> bool {
        self.transparent || self.opacity < 0.99
    }

    /// Whether any of the extended physical layers is in use.
    pub fn uses_physical_layers(&self) -> bool {
        self.clearcoat > 0.0 || self.transmission > 0.0 || self.sheen > 0.0 || self.iridescence > 0.0
    }

    pub fn strip_physical_layers(&mut self) {
        self.clearcoat = 0.0;
        self.clearcoat_roughness = 0.0;
        self.transmission = 0.0;
        self.sheen = 0.0;
        self.iridescence = 0.0;
        self.thickness = 0.0;
        self.attenuation_color = [1.0, 1.0, 1.0];
        self.attenuation_distance = f32::INFINITY;
    }

    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.maps.iter().chain(self.env_map)
    }
}

/// `0xRRGGBB` to normalized channels.
pub fn hex_color(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_splits_channels() {
        assert_eq!(hex_color(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(hex_color(0x000000), [0.0, 0.0, 0.0]);
        let c = hex_color(0x113250);
        assert!((c[0] - 17.0 / 255.0).abs() < 1e-6);
        assert!((c[2] - 80.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn transparency_counts_low_opacity() {
        let mut m = Material::standard(MaterialId(1), "m");
        assert!(!m.is_effectively_transparent());
        m.opacity = 0.98;
        assert!(m.is_effectively_transparent());
        m.opacity = 1.0;
        m.transparent = true;
        assert!(m.is_effectively_transparent());
    }

    #[test]
    fn textures_include_env_map() {
        let mut m = Material::standard(MaterialId(1), "m");
        m.maps.diffuse = Some(TextureId(4));
        m.env_map = Some(TextureId(9));
        let ids: Vec<_> = m.textures().collect();
        assert_eq!(ids, vec![TextureId(4), TextureId(9)]);
    }
}
