//! Scene Annotator Library
//!
//! Ground-truth labels for synthetic rendered datasets. This library provides:
//! - Projection of object meshes to normalized 2D bounding boxes
//! - Camera intrinsic (K) and extrinsic matrices from host camera settings
//! - Object-to-camera poses
//! - Per-frame aggregation into BOP-style `scene_camera.json`,
//!   `scene_gt.json` and `scene_gt_info.json`
//! - Fuzzy (Mamdani) uncertainty labels from the focal length or light energy
//!
//! All computations read from a [`scene::SceneProvider`]; the host application
//! that renders the frames is never modified.

pub mod annotation;
pub mod camera;
pub mod config;
pub mod dataset;
pub mod fuzzy;
pub mod geometry;
pub mod scene;
pub mod util;

// Re-export commonly used types
pub use annotation::{
    annotate_frame, AnnotationError, AnnotationRecord, ClassIndex, FrameAnnotation,
    PoseAnnotation, SceneAnnotations, SceneCameraRecord,
};
pub use camera::{CameraError, CameraIntrinsicsRaw, CameraState, Intrinsics, RenderTarget, SensorFit};
pub use config::{ConfigError, PipelineOptions, Requirements, TestCase, UncertaintyMode};
pub use fuzzy::{estimate_uncertainty, FuzzyError, UncertaintyDomain, UncertaintyEstimator};
pub use geometry::{project_and_clip, GeometryError, NormalizedBBox, ViewFrame};
pub use scene::{SceneError, SceneProvider, SceneSnapshot};
