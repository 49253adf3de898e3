//! Material construction from imported material data

use std::path::{Path, PathBuf};

use crate::scene::{ImportedMaterial, TextureChannel};

pub const DEFINE_NORMALMAP: &str = "RN_NORMALMAP";
pub const DEFINE_SPECULARITY: &str = "RN_SPECULARITY";
pub const DEFINE_SPECMAP: &str = "RN_SPECMAP";

/// Texture referenced by a material, resolved against the model directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    pub path: PathBuf,
    pub channel: TextureChannel,
    /// Sampled without sRGB conversion
    pub linear: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Material {
    pub textures: Vec<TextureRef>,
    pub defines: Vec<String>,
}

impl Material {
    pub fn texture(&self, channel: TextureChannel) -> Option<&TextureRef> {
        self.textures.iter().find(|t| t.channel == channel)
    }

    pub fn has_define(&self, define: &str) -> bool {
        self.defines.iter().any(|d| d == define)
    }

    fn define(&mut self, define: &str) {
        if !self.has_define(define) {
            self.defines.push(define.to_string());
        }
    }
}

/// Resolve a texture URI to `<model_dir>/<file name>`
pub fn resolve_texture(model_dir: &Path, uri: &str, channel: TextureChannel) -> TextureRef {
    // URIs always use forward slashes; take the last component either way
    let file_name = uri.rsplit(['/', '\\']).next().unwrap_or(uri);
    TextureRef {
        path: model_dir.join(file_name),
        channel,
        linear: channel.is_linear(),
    }
}

/// Build the engine material for one imported material.
///
/// The first diffuse, normal and specular texture are attached. With
/// `guess_material` the shader defines for normal and specular maps are set.
pub fn build_material(
    imported: Option<&ImportedMaterial>,
    model_dir: &Path,
    guess_material: bool,
) -> Material {
    let mut material = Material::default();
    let Some(imported) = imported else {
        return material;
    };

    for channel in [
        TextureChannel::Diffuse,
        TextureChannel::Normals,
        TextureChannel::Specular,
    ] {
        let Some(uri) = imported.texture(channel, 0) else {
            continue;
        };
        material
            .textures
            .push(resolve_texture(model_dir, uri, channel));

        if guess_material {
            match channel {
                TextureChannel::Normals => material.define(DEFINE_NORMALMAP),
                TextureChannel::Specular => {
                    material.define(DEFINE_SPECULARITY);
                    material.define(DEFINE_SPECMAP);
                }
                _ => {}
            }
        }
    }

    material
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imported(textures: &[(TextureChannel, &str)]) -> ImportedMaterial {
        ImportedMaterial {
            name: "mat".to_string(),
            textures: textures
                .iter()
                .map(|(c, uri)| (*c, uri.to_string()))
                .collect(),
        }
    }

    #[test]
    fn normal_and_specular_maps_set_defines() {
        let source = imported(&[
            (TextureChannel::Diffuse, "textures/albedo.png"),
            (TextureChannel::Normals, "textures/normal.png"),
            (TextureChannel::Specular, "spec.png"),
        ]);
        let material = build_material(Some(&source), Path::new("models"), true);

        assert_eq!(material.textures.len(), 3);
        assert!(material.has_define(DEFINE_NORMALMAP));
        assert!(material.has_define(DEFINE_SPECULARITY));
        assert!(material.has_define(DEFINE_SPECMAP));

        let diffuse = material.texture(TextureChannel::Diffuse).unwrap();
        assert_eq!(diffuse.path, Path::new("models").join("albedo.png"));
        assert!(!diffuse.linear);
        assert!(material.texture(TextureChannel::Normals).unwrap().linear);
    }

    #[test]
    fn defines_are_skipped_without_guessing() {
        let source = imported(&[(TextureChannel::Normals, "normal.png")]);
        let material = build_material(Some(&source), Path::new("."), false);
        assert_eq!(material.textures.len(), 1);
        assert!(material.defines.is_empty());
    }

    #[test]
    fn only_first_texture_per_channel_is_used() {
        let source = imported(&[
            (TextureChannel::Diffuse, "a.png"),
            (TextureChannel::Diffuse, "b.png"),
            (TextureChannel::Emissive, "glow.png"),
        ]);
        let material = build_material(Some(&source), Path::new("m"), true);
        assert_eq!(material.textures.len(), 1);
        assert_eq!(material.textures[0].path, Path::new("m").join("a.png"));
    }

    #[test]
    fn missing_material_is_empty() {
        assert_eq!(
            build_material(None, Path::new("m"), true),
            Material::default()
        );
    }
}
