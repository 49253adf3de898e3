//! nether-import - scene to engine model converter
//!
//! Converts glTF/GLB scenes and reports what the engine would receive:
//! packed meshes per LOD stage, the reconstructed skeleton and animations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use nether_import::{
    build_skeleton, load_settings, ConvertSettings, GltfImporter, ModelLoader, SceneImporter,
    Skeleton,
};

#[derive(Parser)]
#[command(name = "nether-import")]
#[command(about = "Scene to engine model converter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a model and print a per-stage summary
    Model {
        /// Input glTF/GLB file
        input: PathBuf,

        /// TOML file with conversion settings
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Do not infer shader defines from textures
        #[arg(long)]
        no_guess_material: bool,

        /// Regenerate normals and tangents
        #[arg(long)]
        recalculate_normals: bool,

        /// Smoothing angle in degrees for regenerated normals
        #[arg(long)]
        smooth_angle: Option<f32>,

        /// Load `<name>_lod<N>.<ext>` siblings as LOD stages
        #[arg(long)]
        autoload_lod: bool,
    },

    /// Print the reconstructed bone hierarchy
    Skeleton {
        /// Input glTF/GLB file
        input: PathBuf,
    },

    /// List converted animations
    Animations {
        /// Input glTF/GLB file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Model {
            input,
            settings,
            no_guess_material,
            recalculate_normals,
            smooth_angle,
            autoload_lod,
        } => {
            let mut settings = match settings {
                Some(path) => load_settings(&path)?,
                None => ConvertSettings::default(),
            };
            if no_guess_material {
                settings.guess_material = false;
            }
            if recalculate_normals {
                settings.recalculate_normals = true;
            }
            if let Some(angle) = smooth_angle {
                settings.smooth_normal_angle = angle;
            }
            if autoload_lod {
                settings.autoload_lod = true;
            }
            convert_model(&input, &settings)?;
        }

        Commands::Skeleton { input } => {
            let skeleton = import_skeleton(&input)?;
            for root in skeleton.roots() {
                print_bone(&skeleton, root, 0);
            }
        }

        Commands::Animations { input } => {
            let skeleton = import_skeleton(&input)?;
            let mut animations: Vec<_> = skeleton.animations().values().collect();
            animations.sort_by(|a, b| a.name().cmp(b.name()));

            tracing::info!("Animations in {:?}:", input);
            for animation in animations {
                tracing::info!(
                    "  '{}': duration {:.3}, length {:.3}, {} bones",
                    animation.name(),
                    animation.duration(),
                    animation.length(),
                    animation.animated_bone_count()
                );
            }
        }
    }

    Ok(())
}

fn convert_model(input: &Path, settings: &ConvertSettings) -> Result<()> {
    let loader = ModelLoader::gltf();
    if !loader.supports_file(input) {
        anyhow::bail!("Unsupported model format: {:?}", input);
    }
    let model = loader
        .load(input, settings)
        .with_context(|| format!("Failed to convert {:?}", input))?;

    for (index, stage) in model.stages.iter().enumerate() {
        tracing::info!(
            "Stage {} (factor {}): {} meshes, {} vertices",
            index,
            stage.lod_factor,
            stage.meshes.len(),
            stage.vertex_count()
        );
        for group in &stage.meshes {
            let features: Vec<_> = group
                .mesh
                .attribute_streams()
                .map(|s| format!("{:?}", s.feature()))
                .collect();
            tracing::info!(
                "  {} vertices, {} indices [{}], {} textures, defines {:?}",
                group.mesh.vertex_count(),
                group.mesh.index_count(),
                features.join(", "),
                group.material.textures.len(),
                group.material.defines
            );
        }
    }
    if let Some(skeleton) = model.skeleton() {
        tracing::info!(
            "Skeleton: {} bones, {} animations",
            skeleton.bones().len(),
            skeleton.animations().len()
        );
    }

    Ok(())
}

fn import_skeleton(input: &Path) -> Result<Skeleton> {
    let scene = GltfImporter
        .import(input, &ConvertSettings::default().import_options())
        .with_context(|| format!("Failed to import {:?}", input))?;
    let skeleton = build_skeleton(&scene)
        .with_context(|| format!("Failed to build skeleton for {:?}", input))?;
    Ok(skeleton)
}

fn print_bone(skeleton: &Skeleton, index: usize, depth: usize) {
    let Some(bone) = skeleton.bone(index) else {
        return;
    };
    tracing::info!("{}[{}] {}", "  ".repeat(depth), index, bone.name);
    for &child in &bone.children {
        print_bone(skeleton, child, depth + 1);
    }
}
