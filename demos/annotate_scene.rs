//! Scene Annotation Example
//!
//! Loads a scene snapshot, moves its objects across a number of frames and
//! writes the BOP annotation files for the whole run, one uncertainty sidecar
//! per object and frame, and an overlay of the first frame's boxes.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --example annotate_scene -- \
//!   --scene samples/scene_snapshot.json \
//!   --frames 5 \
//!   --output output/annotate_scene \
//!   --uncertainty
//! ```

use clap::Parser;
use image::{Rgb, RgbImage};
use log::{info, warn};
use scene_annotator::config::{PipelineOptions, TestCase, UncertaintyMode};
use scene_annotator::dataset::{label_for, OutputLayout, UncertaintySidecar};
use scene_annotator::scene::SceneProvider;
use scene_annotator::{geometry, util, ClassIndex, SceneAnnotations, SceneSnapshot};
use std::path::{Path, PathBuf};

/// BOP annotation tool for exported scene snapshots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the scene snapshot JSON
    #[arg(short = 's', long)]
    scene: PathBuf,

    /// Number of frames to annotate
    #[arg(short = 'n', long, default_value_t = 5)]
    frames: usize,

    /// Sideways shift applied to every object per frame
    #[arg(long, default_value_t = 0.05)]
    step: f64,

    /// Output directory
    #[arg(short = 'o', long, default_value = "output/annotate_scene")]
    output: PathBuf,

    /// Label the sidecars with the fuzzy uncertainty of the focal length
    #[arg(short = 'u', long)]
    uncertainty: bool,

    /// Image to draw the first frame's boxes on (defaults to a black canvas)
    #[arg(long)]
    background: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let mut scene = SceneSnapshot::load_from_json(&cli.scene.to_string_lossy())?;
    let names = scene.object_names();
    let classes = ClassIndex::from_names(&names);
    info!("Loaded {} objects from {:?}", names.len(), cli.scene);

    let options = PipelineOptions::with_uncertainty(if cli.uncertainty {
        UncertaintyMode::Fuzzy
    } else {
        UncertaintyMode::Off
    });
    let layout = OutputLayout::new(&cli.output, "scene_");

    let mut annotations = SceneAnnotations::new();
    for frame in 0..cli.frames {
        if frame == 0 {
            save_overlay(&scene, &names, cli.background.as_deref(), &cli.output)?;
        }

        annotations.record(frame, &names, &classes, &scene)?;

        let focal_length = scene.camera_intrinsics_raw().focal_length;
        let label = label_for(&options, TestCase::NormalDistance, focal_length)?;
        for name in &names {
            let image_path = layout.image_path(TestCase::NormalDistance, name, frame);
            UncertaintySidecar::new(&image_path, name, focal_length, label, names.len())
                .save(&layout.sidecar_path(TestCase::NormalDistance, name, frame))?;
        }

        for name in &names {
            let object = scene.object_mut(name)?;
            object.object_to_world[(0, 3)] += cli.step;
        }
    }

    annotations.write_to_dir(&cli.output)?;

    println!("Annotated {} frames", annotations.frame_count());
    for (index, frame) in annotations.scene_gt_info.iter() {
        let visible = frame.iter().filter(|r| r.is_some()).count();
        println!("  frame {index}: {visible}/{} objects visible", frame.len());
    }
    println!("Output: {}", cli.output.display());

    Ok(())
}

fn save_overlay(
    scene: &SceneSnapshot,
    names: &[String],
    background: Option<&Path>,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolution = scene.render_target().resolution();
    let mut img = match background {
        Some(path) => util::load_image(path)?,
        None => RgbImage::new(resolution.width, resolution.height),
    };

    let colors = [Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 128, 255])];
    for (name, color) in names.iter().zip(colors.iter().cycle()) {
        let bbox = geometry::project_and_clip(
            &scene.mesh_vertices_local(name)?,
            &scene.object_to_world(name)?,
            &scene.camera_to_world(),
            &scene.camera_view_frame(),
        )?;
        match bbox {
            Some(bbox) => util::draw_normalized_bbox(&mut img, &bbox, *color, 2)?,
            None => warn!("Object '{}' is not visible in the first frame", name),
        }
    }

    util::ensure_dir(output)?;
    let path = output.join("frame_000000_boxes.png");
    img.save(&path)?;
    info!("Saved box overlay to {}", path.display());
    Ok(())
}
