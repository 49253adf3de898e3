//! Conversion settings

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::scene::ImportOptions;

fn default_true() -> bool {
    true
}

fn default_smooth_normal_angle() -> f32 {
    20.0
}

/// Options accepted by [`crate::ModelLoader::load`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvertSettings {
    /// Infer shader defines from the textures a material has
    #[serde(default = "default_true", alias = "guessMaterial")]
    pub guess_material: bool,

    /// Have the importer regenerate normals and tangents
    #[serde(default, alias = "recalculateNormals")]
    pub recalculate_normals: bool,

    /// Smoothing threshold in degrees for regenerated normals
    #[serde(default = "default_smooth_normal_angle", alias = "smoothNormalAngle")]
    pub smooth_normal_angle: f32,

    /// Probe for `<name>_lod<N>.<ext>` siblings and load them as LOD stages
    #[serde(default, alias = "autoloadLOD", alias = "autoloadLod")]
    pub autoload_lod: bool,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            guess_material: true,
            recalculate_normals: false,
            smooth_normal_angle: default_smooth_normal_angle(),
            autoload_lod: false,
        }
    }
}

impl ConvertSettings {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            recalculate_normals: self.recalculate_normals,
            smooth_normal_angle: self.smooth_normal_angle,
        }
    }
}

/// Load settings from a TOML file
pub fn load_settings(path: &Path) -> Result<ConvertSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {:?}", path))?;
    let settings: ConvertSettings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings: {:?}", path))?;
    Ok(settings)
}
