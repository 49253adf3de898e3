//! Conversion entry point: imported scene -> engine model
//!
//! Drives mesh packing per LOD stage, builds the skeleton for animated
//! scenes and optionally probes for `<name>_lod<N>.<ext>` siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::animation::convert_animation;
use crate::error::ConvertError;
use crate::material::{build_material, Material};
use crate::mesh::pack_mesh;
use crate::model::{LodStage, MeshGroup, Model, DEFAULT_LOD_FACTORS};
use crate::scene::{GltfImporter, ImportOptions, ImportedScene, SceneImporter};
use crate::settings::ConvertSettings;
use crate::skeleton::{reconstruct_skeleton, Skeleton};

/// Converts files read by a [`SceneImporter`] into [`Model`]s.
///
/// Holds no per-conversion state, so one loader can serve concurrent loads
/// of different files.
#[derive(Debug, Clone, Default)]
pub struct ModelLoader<I> {
    importer: I,
}

impl ModelLoader<GltfImporter> {
    pub fn gltf() -> Self {
        Self::new(GltfImporter)
    }
}

impl<I: SceneImporter> ModelLoader<I> {
    pub fn new(importer: I) -> Self {
        Self { importer }
    }

    pub fn importer(&self) -> &I {
        &self.importer
    }

    /// Whether the importer handles the file's extension
    pub fn supports_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.importer.extensions().iter().any(|e| *e == ext)
    }

    pub fn supports_background_loading(&self) -> bool {
        true
    }

    /// Convert the file at `path`.
    ///
    /// Import or structural failures of the base file fail the load. A
    /// failing LOD file only ends LOD probing.
    pub fn load(&self, path: &Path, settings: &ConvertSettings) -> Result<Model, ConvertError> {
        tracing::info!("Converting {:?}", path);
        let options = settings.import_options();
        let model_dir = path.parent().unwrap_or(Path::new(""));

        let mut scene = self.importer.import(path, &options)?;
        let mut model = Model::new();
        model.add_stage(load_stage(&mut scene, model_dir, 0.0, settings.guess_material)?);

        if !scene.animations.is_empty() {
            model.skeleton = Some(Arc::new(build_skeleton(&scene)?));
        }

        if settings.autoload_lod {
            self.autoload_lods(path, model_dir, &options, settings, &mut model);
        }

        tracing::info!(
            "Converted {:?}: {} stage(s), {} mesh(es) in base stage{}",
            path,
            model.stage_count(),
            model.stages[0].meshes.len(),
            if model.skeleton.is_some() { ", skeletal" } else { "" }
        );

        Ok(model)
    }

    fn autoload_lods(
        &self,
        path: &Path,
        model_dir: &Path,
        options: &ImportOptions,
        settings: &ConvertSettings,
        model: &mut Model,
    ) {
        for (index, &lod_factor) in DEFAULT_LOD_FACTORS.iter().enumerate() {
            let Some(lod_path) = lod_path(path, index + 1) else {
                return;
            };
            let stage = self.importer.import(&lod_path, options).and_then(|mut scene| {
                load_stage(&mut scene, model_dir, lod_factor, settings.guess_material)
            });
            match stage {
                Ok(stage) => {
                    let index = model.add_stage(stage);
                    tracing::info!("Loaded LOD stage {} from {:?}", index, lod_path);
                }
                Err(err) => {
                    tracing::debug!("Stopped LOD probing at {:?}: {}", lod_path, err);
                    return;
                }
            }
        }
    }
}

/// `<dir>/<stem>_lod<stage>.<ext>` for the file at `path`
pub fn lod_path(path: &Path, stage: usize) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_lod{}.{}", stem, stage, ext),
        None => format!("{}_lod{}", stem, stage),
    };
    Some(path.with_file_name(name))
}

/// Pack every mesh of `scene` into one LOD stage.
///
/// Bone indices continue across the stage's meshes so they match the flat
/// bone list built from the same scene.
pub fn load_stage(
    scene: &mut ImportedScene,
    model_dir: &Path,
    lod_factor: f32,
    guess_material: bool,
) -> Result<LodStage, ConvertError> {
    let materials: Vec<Arc<Material>> = scene
        .materials
        .iter()
        .map(|m| Arc::new(build_material(Some(m), model_dir, guess_material)))
        .collect();
    let fallback = Arc::new(Material::default());

    let mut stage = LodStage::new(lod_factor);
    let mut bone_index_offset = 0u32;
    for imported in &mut scene.meshes {
        let mesh = pack_mesh(imported, bone_index_offset)?;
        bone_index_offset += imported.bones.len() as u32;

        let material = imported
            .material
            .and_then(|index| materials.get(index))
            .unwrap_or(&fallback);
        stage.meshes.push(MeshGroup {
            mesh: Arc::new(mesh),
            material: Arc::clone(material),
        });
    }

    Ok(stage)
}

/// Reconstruct the skeleton of `scene` and attach its animations
pub fn build_skeleton(scene: &ImportedScene) -> Result<Skeleton, ConvertError> {
    let (mut skeleton, bone_nodes) = reconstruct_skeleton(scene)?;

    for imported in &scene.animations {
        let Some(animation) = convert_animation(scene, &bone_nodes, imported) else {
            continue;
        };
        if !skeleton.insert_animation(animation) {
            tracing::warn!(
                "Duplicate animation name '{}', keeping the first one",
                imported.name
            );
        }
    }

    tracing::debug!(
        "Skeleton: {} bones, {} animations",
        skeleton.bones().len(),
        skeleton.animations().len()
    );

    Ok(skeleton)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lod_path_keeps_directory_and_extension() {
        assert_eq!(
            lod_path(Path::new("assets/robot.gltf"), 1),
            Some(PathBuf::from("assets/robot_lod1.gltf"))
        );
        assert_eq!(
            lod_path(Path::new("robot"), 3),
            Some(PathBuf::from("robot_lod3"))
        );
    }

    #[test]
    fn supports_gltf_extensions_case_insensitively() {
        let loader = ModelLoader::gltf();
        assert!(loader.supports_file(Path::new("a.GLTF")));
        assert!(loader.supports_file(Path::new("a.glb")));
        assert!(!loader.supports_file(Path::new("a.obj")));
        assert!(!loader.supports_file(Path::new("noext")));
        assert!(loader.supports_background_loading());
    }
}
